pub mod api;
pub mod config;
pub mod data_models;
pub mod db;
pub mod error;
pub mod llm;
pub mod planner;
pub mod query_engine;
pub mod report_analysis;
pub mod schema;
pub mod searcher;
pub mod storage;
pub mod summarizer;
pub mod voice;
