use std::fmt;
use std::str::FromStr;

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which tables to read and which terms to look for, as chosen by the planner.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchPlan {
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub search_terms: Vec<String>,
    #[serde(default)]
    pub intent: String,
}

/// Rows one table returned for a plan. Only built for tables with at least one row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub table: String,
    pub data: Vec<Value>,
    pub count: usize,
}

impl SearchResult {
    pub fn new(table: String, data: Vec<Value>) -> SearchResult {
        SearchResult {
            count: data.len(),
            table,
            data,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub intent: String,
    pub results: Vec<SearchResult>,
    pub summary: String,
    pub total_results: usize,
}

impl SearchResponse {
    pub fn new(query: String, intent: String, results: Vec<SearchResult>, summary: String) -> Self {
        let total_results = results.iter().map(|r| r.count).sum();
        SearchResponse {
            query,
            intent,
            results,
            summary,
            total_results,
        }
    }
}

/// Store-agnostic description of one table read: a row matches when any of
/// `columns` contains any of `terms`, ignoring case. Terms are literal text.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilter {
    pub columns: Vec<String>,
    pub terms: Vec<String>,
    pub limit: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// Statuses an analysis run may start from.
    pub fn startable() -> [AnalysisStatus; 2] {
        [AnalysisStatus::Pending, AnalysisStatus::Failed]
    }

    pub fn can_transition_to(&self, next: AnalysisStatus) -> bool {
        use AnalysisStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Failed, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    RaftaarAmbulance,
    CallCenter,
    Whatsapp,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::RaftaarAmbulance => "raftaar_ambulance",
            ReportType::CallCenter => "call_center",
            ReportType::Whatsapp => "whatsapp",
        }
    }

    /// Table the extracted rows are written to.
    pub fn destination_table(&self) -> &'static str {
        match self {
            ReportType::RaftaarAmbulance => "ambulance_bookings",
            ReportType::CallCenter => "call_records",
            ReportType::Whatsapp => "whatsapp_messages",
        }
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "raftaar_ambulance" => Ok(ReportType::RaftaarAmbulance),
            "call_center" => Ok(ReportType::CallCenter),
            "whatsapp" => Ok(ReportType::Whatsapp),
            other => Err(format!("unknown report type: {other}")),
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded report as stored in the `reports` table.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Report {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub title: String,
    pub file_path: String,
    pub report_type: String,
    pub analysis_status: AnalysisStatus,
    #[serde(default)]
    pub analysis_error: Option<String>,
}

impl Report {
    pub fn new(title: String, file_path: String, report_type: ReportType) -> Report {
        Report {
            id: ObjectId::new(),
            title,
            file_path,
            report_type: report_type.as_str().to_string(),
            analysis_status: AnalysisStatus::Pending,
            analysis_error: None,
        }
    }
}
