use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use crate::query_engine::QueryEngine;
use crate::report_analysis::ReportAnalyzer;
use crate::voice::SpeechService;

pub mod handlers;
pub mod models;

/// Browser voice recordings can be larger than axum's default body limit.
const MAX_AUDIO_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub query_engine: Arc<QueryEngine>,
    pub report_analyzer: Arc<ReportAnalyzer>,
    pub speech: Arc<dyn SpeechService>,
}

pub fn create_router(state: AppState, static_dir: &str) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // API routes
        .route("/api/health", get(handlers::health_handler))
        .route("/api/search", post(handlers::search_handler))
        .route("/api/reports/analyze", post(handlers::analyze_report_handler))
        .route(
            "/api/voice/transcribe",
            post(handlers::transcribe_handler).layer(DefaultBodyLimit::max(MAX_AUDIO_UPLOAD_BYTES)),
        )
        .route("/api/voice/speak", post(handlers::speak_handler))
        .route("/api/chat", post(handlers::chat_handler))
        .with_state(state)
        // Static file serving for the UI
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
}
