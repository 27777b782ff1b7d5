#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use clinic_ops::api::AppState;
use clinic_ops::data_models::{AnalysisStatus, Report, SearchFilter};
use clinic_ops::db::RecordStore;
use clinic_ops::llm::{ChatRequest, LanguageModel};
use clinic_ops::query_engine::QueryEngine;
use clinic_ops::report_analysis::ReportAnalyzer;
use clinic_ops::schema::SchemaRegistry;
use clinic_ops::storage::ObjectStore;
use clinic_ops::voice::{AudioClip, SpeechService};

/// In-memory tables with the same matching rule as the MongoDB filter:
/// any column contains any term, ignoring case, terms taken literally.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    reports: Mutex<HashMap<ObjectId, Report>>,
    failing_tables: Mutex<HashSet<String>>,
    pub status_log: Mutex<Vec<(ObjectId, AnalysisStatus, Option<String>)>>,
    pub searched_tables: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn fail_table(&self, table: &str) {
        self.failing_tables.lock().unwrap().insert(table.to_string());
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn add_report(&self, report: Report) {
        self.reports.lock().unwrap().insert(report.id, report);
    }

    pub fn report(&self, id: &ObjectId) -> Option<Report> {
        self.reports.lock().unwrap().get(id).cloned()
    }

    pub fn statuses(&self, id: &ObjectId) -> Vec<AnalysisStatus> {
        self.status_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(rid, _, _)| rid == id)
            .map(|(_, status, _)| *status)
            .collect()
    }

    fn matches(row: &Value, filter: &SearchFilter) -> bool {
        filter.columns.iter().any(|column| {
            let Some(text) = row.get(column).and_then(Value::as_str) else {
                return false;
            };
            let text = text.to_lowercase();
            filter
                .terms
                .iter()
                .any(|term| text.contains(&term.to_lowercase()))
        })
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn search(&self, table: &str, filter: &SearchFilter) -> Result<Vec<Value>> {
        self.searched_tables.lock().unwrap().push(table.to_string());
        if self.failing_tables.lock().unwrap().contains(table) {
            return Err(anyhow!("relation \"{table}\" does not exist"));
        }
        Ok(self
            .rows(table)
            .into_iter()
            .filter(|row| Self::matches(row, filter))
            .take(filter.limit as usize)
            .collect())
    }

    async fn insert_rows(&self, table: &str, rows: Vec<Value>) -> Result<usize> {
        let count = rows.len();
        self.seed(table, rows);
        Ok(count)
    }

    async fn find_report(&self, id: &ObjectId) -> Result<Option<Report>> {
        // Yield like a networked store so concurrent callers interleave.
        tokio::task::yield_now().await;
        Ok(self.report(id))
    }

    async fn begin_processing(&self, id: &ObjectId) -> Result<bool> {
        tokio::task::yield_now().await;
        let mut reports = self.reports.lock().unwrap();
        let Some(report) = reports.get_mut(id) else {
            return Ok(false);
        };
        if !AnalysisStatus::startable().contains(&report.analysis_status) {
            return Ok(false);
        }
        report.analysis_status = AnalysisStatus::Processing;
        report.analysis_error = None;
        self.status_log
            .lock()
            .unwrap()
            .push((*id, AnalysisStatus::Processing, None));
        Ok(true)
    }

    async fn set_report_status(
        &self,
        id: &ObjectId,
        status: AnalysisStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let mut reports = self.reports.lock().unwrap();
        let report = reports
            .get_mut(id)
            .ok_or_else(|| anyhow!("report {id} not found"))?;
        report.analysis_status = status;
        report.analysis_error = error.map(str::to_string);
        self.status_log
            .lock()
            .unwrap()
            .push((*id, status, error.map(str::to_string)));
        Ok(())
    }
}

/// Replies with queued answers in order; errors once the queue runs dry.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push_error(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("LLM API returned 503 Service Unavailable")),
        }
    }
}

#[derive(Default)]
pub struct MemoryObjects {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjects {
    pub fn with_file(path: &str, contents: &str) -> Arc<Self> {
        let objects = Self::default();
        objects
            .files
            .lock()
            .unwrap()
            .insert(path.to_string(), contents.as_bytes().to_vec());
        Arc::new(objects)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("FileNotFound: {path}"))
    }
}

pub struct FakeSpeech;

#[async_trait]
impl SpeechService for FakeSpeech {
    async fn transcribe(&self, clip: AudioClip) -> Result<String> {
        Ok(format!("find patient Rajesh ({} bytes)", clip.bytes.len()))
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }
}

pub fn query_engine(store: Arc<MemoryStore>, llm: Arc<ScriptedLlm>) -> QueryEngine {
    QueryEngine::new(store, llm, SchemaRegistry::default(), 10)
}

pub fn app_state(
    store: Arc<MemoryStore>,
    objects: Arc<MemoryObjects>,
    llm: Arc<ScriptedLlm>,
) -> AppState {
    AppState {
        query_engine: Arc::new(QueryEngine::new(
            store.clone(),
            llm.clone(),
            SchemaRegistry::default(),
            10,
        )),
        report_analyzer: Arc::new(ReportAnalyzer::new(store, objects, llm)),
        speech: Arc::new(FakeSpeech),
    }
}
