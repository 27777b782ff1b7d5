use anyhow::{Context, Result};
use std::sync::Arc;

use crate::data_models::SearchResult;
use crate::llm::{ChatRequest, LanguageModel};

const SUMMARY_PROMPT: &str = "You are an assistant for hospital operations staff. \
Given a staff question and the database rows found for it, write one short paragraph \
that answers the question from the rows. Mention names, phone numbers, dates and counts \
when they matter. Do not invent records that are not in the data.";

const FOLLOW_UP_PROMPT: &str = "You are a voice assistant for hospital operations staff. \
Answer the staff member's question in two or three spoken-style sentences, using only \
the search context provided. If the context does not contain the answer, say so.";

pub struct Summarizer {
    llm: Arc<dyn LanguageModel>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub fn empty_summary(query: &str) -> String {
        format!("No matching records were found for \"{}\".", query.trim())
    }

    /// Natural-language synopsis of `results`. No model call when there is nothing to summarize.
    pub async fn summarize(&self, query: &str, results: &[SearchResult]) -> Result<String> {
        if results.is_empty() {
            return Ok(Self::empty_summary(query));
        }

        let data = serde_json::to_string(results).context("Failed to serialize search results")?;
        let user = format!("Question: {query}\n\nSearch results (JSON):\n{data}");

        let summary = self
            .llm
            .complete(ChatRequest::text(SUMMARY_PROMPT, user))
            .await
            .context("Summarizer request failed")?;

        Ok(summary.trim().to_string())
    }

    /// Answer a follow-up question grounded in an earlier search response.
    pub async fn follow_up(&self, question: &str, context: &str) -> Result<String> {
        let user = format!("Search context:\n{context}\n\nQuestion: {question}");
        let reply = self
            .llm
            .complete(ChatRequest::text(FOLLOW_UP_PROMPT, user))
            .await
            .context("Follow-up request failed")?;
        Ok(reply.trim().to_string())
    }
}
