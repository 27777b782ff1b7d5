//! Registry of the dashboard tables the search flow is allowed to touch.
//!
//! Each entry lists the text columns that are matched against search terms.
//! The planner only ever sees the tables registered here, and any table a
//! model names outside of this list is dropped before a query is issued.

use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub columns: &'static [&'static str],
}

#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tables: Vec<TableSchema>,
}

impl SchemaRegistry {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// Searchable columns for `name`, or `None` for an unregistered table.
    pub fn columns(&self, name: &str) -> Option<&'static [&'static str]> {
        self.table(name).map(|t| t.columns)
    }

    pub fn table_names(&self) -> Vec<&'static str> {
        self.tables.iter().map(|t| t.name).collect()
    }

    /// Plain-text schema description embedded in the planner prompt.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            let _ = writeln!(
                out,
                "- {}: {} (columns: {})",
                table.name,
                table.description,
                table.columns.join(", ")
            );
        }
        out
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(vec![
            TableSchema {
                name: "call_records",
                description: "inbound and outbound patient calls handled by the call center",
                columns: &["patient_name", "phone_number", "notes", "call_type"],
            },
            TableSchema {
                name: "ambulance_bookings",
                description: "ambulance pickups booked for patients",
                columns: &[
                    "patient_name",
                    "phone_number",
                    "pickup_location",
                    "destination",
                    "status",
                ],
            },
            TableSchema {
                name: "whatsapp_messages",
                description: "WhatsApp conversations with patients and partners",
                columns: &["contact_name", "phone_number", "message", "direction"],
            },
            TableSchema {
                name: "businesses",
                description: "partner clinics, labs, pharmacies and vendors",
                columns: &["name", "category", "address", "phone"],
            },
            TableSchema {
                name: "social_media_accounts",
                description: "hospital social media handles",
                columns: &["platform", "account_name", "handle"],
            },
            TableSchema {
                name: "social_media_posts",
                description: "published and scheduled social media posts",
                columns: &["platform", "account_name", "content"],
            },
            TableSchema {
                name: "prompts",
                description: "internal prompt library used by staff",
                columns: &["title", "content", "category"],
            },
            TableSchema {
                name: "reports",
                description: "uploaded operational reports and their analysis status",
                columns: &["title", "report_type", "file_path", "analysis_status"],
            },
            TableSchema {
                name: "telecom_services",
                description: "phone lines, IVR numbers and telecom contracts",
                columns: &["provider", "service_type", "phone_number", "notes"],
            },
            TableSchema {
                name: "domains",
                description: "domain name portfolio",
                columns: &["domain_name", "registrar", "status"],
            },
            TableSchema {
                name: "projects",
                description: "internal projects and their metadata",
                columns: &["name", "description", "status", "owner"],
            },
            TableSchema {
                name: "doctors",
                description: "doctor directory",
                columns: &["name", "specialty", "phone_number", "department"],
            },
            TableSchema {
                name: "appointments",
                description: "scheduled patient appointments",
                columns: &["patient_name", "doctor_name", "department", "status"],
            },
        ])
    }
}
