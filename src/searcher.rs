use futures::future::join_all;
use std::sync::Arc;

use crate::data_models::{SearchFilter, SearchPlan, SearchResult};
use crate::db::RecordStore;
use crate::schema::SchemaRegistry;

/// Runs one filtered read per planned table and keeps the tables that returned rows.
pub struct FanOutSearcher {
    store: Arc<dyn RecordStore>,
    registry: Arc<SchemaRegistry>,
    row_limit: i64,
}

impl FanOutSearcher {
    pub fn new(store: Arc<dyn RecordStore>, registry: Arc<SchemaRegistry>, row_limit: i64) -> Self {
        Self {
            store,
            registry,
            row_limit,
        }
    }

    pub fn filter_for(&self, table: &str, terms: &[String]) -> Option<SearchFilter> {
        let columns = self.registry.columns(table)?;
        Some(SearchFilter {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            terms: terms.to_vec(),
            limit: self.row_limit,
        })
    }

    async fn search_table(&self, table: &str, terms: &[String]) -> Option<SearchResult> {
        let Some(filter) = self.filter_for(table, terms) else {
            tracing::warn!(table, "no searchable columns registered, skipping");
            return None;
        };

        match self.store.search(table, &filter).await {
            Ok(rows) if rows.is_empty() => None,
            Ok(rows) => {
                tracing::debug!(table, rows = rows.len(), "table matched");
                Some(SearchResult::new(table.to_string(), rows))
            }
            Err(e) => {
                tracing::error!(table, "table search failed: {:#}", e);
                None
            }
        }
    }

    /// Never fails: a table that errors or matches nothing is left out.
    /// Results follow the order of `plan.tables`.
    pub async fn search(&self, plan: &SearchPlan) -> Vec<SearchResult> {
        let searches = plan
            .tables
            .iter()
            .map(|table| self.search_table(table, &plan.search_terms));

        join_all(searches).await.into_iter().flatten().collect()
    }
}
