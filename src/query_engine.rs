use std::sync::Arc;
use std::time::Instant;

use crate::data_models::SearchResponse;
use crate::db::RecordStore;
use crate::llm::LanguageModel;
use crate::planner::QueryPlanner;
use crate::schema::SchemaRegistry;
use crate::searcher::FanOutSearcher;
use crate::summarizer::Summarizer;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Query cannot be empty")]
    EmptyQuery,
    #[error("query planning failed: {0:#}")]
    Planning(anyhow::Error),
    #[error("summarizing results failed: {0:#}")]
    Summarizing(anyhow::Error),
}

/// Plan → fan-out → summarize. Each call starts from scratch; nothing is cached.
pub struct QueryEngine {
    planner: QueryPlanner,
    searcher: FanOutSearcher,
    summarizer: Summarizer,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        llm: Arc<dyn LanguageModel>,
        registry: SchemaRegistry,
        row_limit: i64,
    ) -> Self {
        let registry = Arc::new(registry);
        Self {
            planner: QueryPlanner::new(llm.clone(), registry.clone()),
            searcher: FanOutSearcher::new(store, registry, row_limit),
            summarizer: Summarizer::new(llm),
        }
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }

    pub async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let start = Instant::now();

        let plan = self
            .planner
            .plan(query)
            .await
            .map_err(SearchError::Planning)?;
        tracing::info!(
            intent = %plan.intent,
            tables = ?plan.tables,
            terms = ?plan.search_terms,
            "planned search"
        );

        let results = self.searcher.search(&plan).await;

        let summary = self
            .summarizer
            .summarize(query, &results)
            .await
            .map_err(SearchError::Summarizing)?;

        let response = SearchResponse::new(query.to_string(), plan.intent, results, summary);
        tracing::info!(
            tables = response.results.len(),
            total_results = response.total_results,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search finished"
        );
        Ok(response)
    }
}
