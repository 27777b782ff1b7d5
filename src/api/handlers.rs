use axum::{
    Json,
    extract::{Multipart, State, rejection::JsonRejection},
    http::header,
    response::IntoResponse,
};

use crate::error::ApiError;
use crate::voice::AudioClip;

use super::AppState;
use super::models::{
    ChatRequest, ChatResponse, HealthResponse, ReportAnalysisOutcome, ReportAnalysisRequest,
    SearchRequest, SearchResponse, SpeakRequest, TranscriptionResponse,
};

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn search_handler(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) = payload?;
    let response = state.query_engine.search(&request.query).await?;
    Ok(Json(response))
}

pub async fn analyze_report_handler(
    State(state): State<AppState>,
    payload: Result<Json<ReportAnalysisRequest>, JsonRejection>,
) -> Result<Json<ReportAnalysisOutcome>, ApiError> {
    let Json(request) = payload?;
    let outcome = state.report_analyzer.analyze(&request).await?;
    Ok(Json(outcome))
}

pub async fn transcribe_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {e}")))?
    {
        if field.name() != Some("audio") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("recording.webm").to_string();
        let content_type = field.content_type().unwrap_or("audio/webm").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {e}")))?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("Audio recording is empty".to_string()));
        }

        let text = state
            .speech
            .transcribe(AudioClip {
                bytes: bytes.to_vec(),
                file_name,
                content_type,
            })
            .await?;
        return Ok(Json(TranscriptionResponse { text }));
    }

    Err(ApiError::BadRequest("Missing \"audio\" field".to_string()))
}

pub async fn speak_handler(
    State(state): State<AppState>,
    payload: Result<Json<SpeakRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Text cannot be empty".to_string()));
    }
    let audio = state.speech.synthesize(request.text.trim()).await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}

pub async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".to_string()));
    }
    let reply = state
        .query_engine
        .summarizer()
        .follow_up(request.message.trim(), &request.context)
        .await?;
    Ok(Json(ChatResponse { reply }))
}
