//! Turns an uploaded operations report into rows of a dashboard table.
//!
//! The report file is pulled from object storage, handed to the language
//! model with an extraction prompt specific to the report type, and the
//! extracted records are written to that type's destination table. The
//! report row tracks progress through `analysis_status`.

use anyhow::{Context, Result};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::data_models::{AnalysisStatus, ReportType};
use crate::db::RecordStore;
use crate::llm::{ChatRequest, LanguageModel, extract_json};
use crate::storage::ObjectStore;

/// Report text beyond this many characters is not sent to the model.
const MAX_REPORT_CHARS: usize = 120_000;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReportAnalysisRequest {
    pub report_id: String,
    #[serde(default)]
    pub file_path: String,
    pub report_type: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportAnalysisOutcome {
    pub report_id: String,
    pub report_type: ReportType,
    pub table: String,
    pub inserted: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid report id: {0}")]
    InvalidReportId(String),
    #[error("unknown report type: {0}")]
    UnknownReportType(String),
    #[error("report {0} not found")]
    NotFound(String),
    #[error("report {id} is {from}, cannot move to {to}")]
    InvalidTransition {
        id: String,
        from: AnalysisStatus,
        to: AnalysisStatus,
    },
    #[error("report analysis failed: {0:#}")]
    Analysis(anyhow::Error),
    #[error("report store error: {0:#}")]
    Store(anyhow::Error),
}

// Model output tends to mix strings and numbers for phone numbers and durations.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let whole = |f: f64| (f.is_finite() && f >= 0.0).then(|| f.round() as u64);
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole))
        }
        _ => None,
    })
}

#[derive(Deserialize, Debug, Default)]
struct AmbulanceExtraction {
    #[serde(default)]
    bookings: Vec<ExtractedBooking>,
}

#[derive(Deserialize, Debug)]
struct ExtractedBooking {
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pickup: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    drop: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    status: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct CallExtraction {
    #[serde(default)]
    calls: Vec<ExtractedCall>,
}

#[derive(Deserialize, Debug)]
struct ExtractedCall {
    #[serde(default, deserialize_with = "lenient_string")]
    patient_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    call_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    duration_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
struct WhatsappExtraction {
    #[serde(default)]
    messages: Vec<ExtractedMessage>,
}

#[derive(Deserialize, Debug)]
struct ExtractedMessage {
    #[serde(default, deserialize_with = "lenient_string")]
    contact_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    message: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    direction: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    sent_at: Option<String>,
}

fn extraction_prompt(report_type: ReportType) -> &'static str {
    match report_type {
        ReportType::RaftaarAmbulance => {
            r#"You extract ambulance bookings from a Raftaar ambulance service report.
Return ONLY a JSON object:
{"bookings": [{"name": "patient name", "phone": "contact number", "pickup": "pickup location", "drop": "destination", "date": "YYYY-MM-DD or null", "status": "booking status or null"}]}
Include every booking in the report. Use null for fields the report does not contain."#
        }
        ReportType::CallCenter => {
            r#"You extract patient calls from a hospital call center report.
Return ONLY a JSON object:
{"calls": [{"patient_name": "name", "phone": "number", "call_type": "inbound|outbound|missed", "notes": "short summary", "duration_seconds": 120}]}
Include every call in the report. Use null for fields the report does not contain."#
        }
        ReportType::Whatsapp => {
            r#"You extract WhatsApp messages from an exported chat report.
Return ONLY a JSON object:
{"messages": [{"contact_name": "name", "phone": "number", "message": "text", "direction": "incoming|outgoing", "sent_at": "timestamp or null"}]}
Include every message in the report. Use null for fields the report does not contain."#
        }
    }
}

/// Map the model's JSON reply to rows of `report_type`'s destination table.
pub fn rows_from_extraction(report_type: ReportType, raw: &str, report_id: &str) -> Result<Vec<Value>> {
    let json = extract_json(raw)?;
    let rows = match report_type {
        ReportType::RaftaarAmbulance => {
            let parsed: AmbulanceExtraction =
                serde_json::from_str(json).context("Extraction is not a bookings object")?;
            parsed
                .bookings
                .into_iter()
                .map(|b| {
                    json!({
                        "patient_name": b.name,
                        "phone_number": b.phone,
                        "pickup_location": b.pickup,
                        "destination": b.drop,
                        "booking_date": b.date,
                        "status": b.status.unwrap_or_else(|| "completed".to_string()),
                        "source_report_id": report_id,
                    })
                })
                .collect()
        }
        ReportType::CallCenter => {
            let parsed: CallExtraction =
                serde_json::from_str(json).context("Extraction is not a calls object")?;
            parsed
                .calls
                .into_iter()
                .map(|c| {
                    json!({
                        "patient_name": c.patient_name,
                        "phone_number": c.phone,
                        "call_type": c.call_type,
                        "notes": c.notes,
                        "duration_seconds": c.duration_seconds,
                        "source_report_id": report_id,
                    })
                })
                .collect()
        }
        ReportType::Whatsapp => {
            let parsed: WhatsappExtraction =
                serde_json::from_str(json).context("Extraction is not a messages object")?;
            parsed
                .messages
                .into_iter()
                .map(|m| {
                    json!({
                        "contact_name": m.contact_name,
                        "phone_number": m.phone,
                        "message": m.message,
                        "direction": m.direction,
                        "sent_at": m.sent_at,
                        "source_report_id": report_id,
                    })
                })
                .collect()
        }
    };
    Ok(rows)
}

pub struct ReportAnalyzer {
    store: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    llm: Arc<dyn LanguageModel>,
}

impl ReportAnalyzer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            store,
            objects,
            llm,
        }
    }

    pub async fn analyze(
        &self,
        request: &ReportAnalysisRequest,
    ) -> Result<ReportAnalysisOutcome, ReportError> {
        let id = ObjectId::parse_str(request.report_id.trim())
            .map_err(|_| ReportError::InvalidReportId(request.report_id.clone()))?;
        let report_type: ReportType = request
            .report_type
            .parse()
            .map_err(|_| ReportError::UnknownReportType(request.report_type.clone()))?;

        let report = self
            .store
            .find_report(&id)
            .await
            .map_err(ReportError::Store)?
            .ok_or_else(|| ReportError::NotFound(id.to_hex()))?;

        if !report
            .analysis_status
            .can_transition_to(AnalysisStatus::Processing)
        {
            return Err(ReportError::InvalidTransition {
                id: id.to_hex(),
                from: report.analysis_status,
                to: AnalysisStatus::Processing,
            });
        }

        let file_path = if request.file_path.trim().is_empty() {
            report.file_path.as_str()
        } else {
            request.file_path.trim()
        };

        let started = self
            .store
            .begin_processing(&id)
            .await
            .map_err(ReportError::Store)?;
        if !started {
            let current = self
                .store
                .find_report(&id)
                .await
                .map_err(ReportError::Store)?
                .ok_or_else(|| ReportError::NotFound(id.to_hex()))?;
            return Err(ReportError::InvalidTransition {
                id: id.to_hex(),
                from: current.analysis_status,
                to: AnalysisStatus::Processing,
            });
        }
        tracing::info!(report_id = %id, %report_type, file_path, "analyzing report");

        match self.extract_and_store(&id, file_path, report_type).await {
            Ok(inserted) => {
                self.store
                    .set_report_status(&id, AnalysisStatus::Completed, None)
                    .await
                    .map_err(ReportError::Store)?;
                tracing::info!(report_id = %id, inserted, "report analysis completed");
                Ok(ReportAnalysisOutcome {
                    report_id: id.to_hex(),
                    report_type,
                    table: report_type.destination_table().to_string(),
                    inserted,
                })
            }
            Err(e) => {
                let message = format!("{e:#}");
                tracing::error!(report_id = %id, "report analysis failed: {}", message);
                if let Err(status_err) = self
                    .store
                    .set_report_status(&id, AnalysisStatus::Failed, Some(&message))
                    .await
                {
                    tracing::error!(report_id = %id, "could not mark report failed: {:#}", status_err);
                }
                Err(ReportError::Analysis(e))
            }
        }
    }

    async fn extract_and_store(
        &self,
        id: &ObjectId,
        file_path: &str,
        report_type: ReportType,
    ) -> Result<usize> {
        let bytes = self.objects.fetch(file_path).await?;
        let text: String = String::from_utf8_lossy(&bytes)
            .chars()
            .take(MAX_REPORT_CHARS)
            .collect();
        if text.trim().is_empty() {
            anyhow::bail!("report file {file_path} is empty");
        }

        let reply = self
            .llm
            .complete(ChatRequest::json(extraction_prompt(report_type), text))
            .await
            .context("Report extraction request failed")?;

        let rows = rows_from_extraction(report_type, &reply, &id.to_hex())?;
        if rows.is_empty() {
            tracing::warn!(report_id = %id, "no records extracted from report");
            return Ok(0);
        }
        self.store
            .insert_rows(report_type.destination_table(), rows)
            .await
    }
}
