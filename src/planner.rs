use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;

use crate::data_models::SearchPlan;
use crate::llm::{ChatRequest, LanguageModel, extract_json};
use crate::schema::SchemaRegistry;

/// Turns a free-text question into a [`SearchPlan`] with one model call.
pub struct QueryPlanner {
    llm: Arc<dyn LanguageModel>,
    registry: Arc<SchemaRegistry>,
}

impl QueryPlanner {
    pub fn new(llm: Arc<dyn LanguageModel>, registry: Arc<SchemaRegistry>) -> Self {
        Self { llm, registry }
    }

    fn system_prompt(&self) -> String {
        format!(
            r#"You translate questions from hospital operations staff into a database search plan.

Available tables:
{}
Return ONLY a JSON object of the form:
{{"tables": ["call_records"], "searchTerms": ["Rajesh"], "intent": "find calls from patient Rajesh"}}

Rules:
- "tables" must only contain names from this list: {}
- "searchTerms" are short keywords or names to look for in text columns; leave out filler words
- "intent" is one sentence describing what the user wants"#,
            self.registry.describe(),
            self.registry.table_names().join(", ")
        )
    }

    pub async fn plan(&self, query: &str) -> Result<SearchPlan> {
        let reply = self
            .llm
            .complete(ChatRequest::json(self.system_prompt(), query))
            .await
            .context("Query planner request failed")?;

        let raw: SearchPlan = serde_json::from_str(extract_json(&reply)?)
            .context("Query planner returned an unparseable plan")?;

        Ok(self.validate(query, raw))
    }

    /// Keep only registered tables (first occurrence wins) and clean up terms.
    /// An empty term list falls back to the query itself.
    pub fn validate(&self, query: &str, plan: SearchPlan) -> SearchPlan {
        let mut seen = HashSet::new();
        let tables = plan
            .tables
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| {
                if !self.registry.contains(t) {
                    tracing::warn!(table = %t, "planner named an unknown table, skipping");
                    return false;
                }
                seen.insert(t.clone())
            })
            .collect();

        let mut seen = HashSet::new();
        let mut search_terms: Vec<String> = plan
            .search_terms
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
            .collect();
        if search_terms.is_empty() {
            search_terms.push(query.trim().to_string());
        }

        SearchPlan {
            tables,
            search_terms,
            intent: plan.intent.trim().to_string(),
        }
    }
}
