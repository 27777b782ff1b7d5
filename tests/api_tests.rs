use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use clinic_ops::api::create_router;
use clinic_ops::data_models::{AnalysisStatus, Report, ReportType};

mod common;
use common::*;

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn router(store: Arc<MemoryStore>, objects: Arc<MemoryObjects>, llm: Arc<ScriptedLlm>) -> axum::Router {
    create_router(app_state(store, objects, llm), "static")
}

#[tokio::test]
async fn test_health_is_ok() {
    let app = router(MemoryStore::new(), Arc::new(MemoryObjects::default()), ScriptedLlm::new(vec![]));
    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_search_returns_camel_case_response() {
    let store = MemoryStore::new();
    store.seed(
        "call_records",
        vec![json!({ "patient_name": "Rajesh Kumar", "phone_number": "9810012345" })],
    );
    let llm = ScriptedLlm::new(vec![
        r#"{"tables": ["call_records"], "searchTerms": ["Rajesh"], "intent": "find patient"}"#,
        "Rajesh Kumar is in the call log.",
    ]);
    let app = router(store, Arc::new(MemoryObjects::default()), llm);

    let response = app
        .oneshot(json_request("/api/search", json!({ "query": "find patient Rajesh" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["query"], "find patient Rajesh");
    assert_eq!(body["intent"], "find patient");
    assert_eq!(body["totalResults"], 1);
    assert_eq!(body["results"][0]["table"], "call_records");
    assert_eq!(body["results"][0]["count"], 1);
    assert_eq!(body["summary"], "Rajesh Kumar is in the call log.");
}

#[tokio::test]
async fn test_search_with_empty_query_is_bad_request() {
    let llm = ScriptedLlm::new(vec![]);
    let app = router(MemoryStore::new(), Arc::new(MemoryObjects::default()), llm.clone());

    let response = app
        .oneshot(json_request("/api/search", json!({ "query": "  " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_malformed_bodies_are_json_bad_requests() {
    let cases = vec![
        ("/api/search", "{}".to_string()),
        ("/api/search", "{\"query\": ".to_string()),
        ("/api/reports/analyze", json!({ "reportId": "abc" }).to_string()),
        ("/api/chat", "not json".to_string()),
        ("/api/voice/speak", json!({ "words": "hello" }).to_string()),
    ];

    for (uri, body) in cases {
        let llm = ScriptedLlm::new(vec![]);
        let app = router(MemoryStore::new(), Arc::new(MemoryObjects::default()), llm.clone());
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.clone()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri} {body}");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let error = body_json(response).await;
        assert_eq!(error["error"]["code"], "BAD_REQUEST", "{uri} {body}");
        assert!(!error["error"]["message"].as_str().unwrap().is_empty());
        assert_eq!(llm.calls(), 0);
    }
}

#[tokio::test]
async fn test_missing_content_type_is_a_json_bad_request() {
    let app = router(MemoryStore::new(), Arc::new(MemoryObjects::default()), ScriptedLlm::new(vec![]));
    let request = Request::builder()
        .method("POST")
        .uri("/api/search")
        .body(Body::from(json!({ "query": "Rajesh" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_planner_failure_is_a_generic_500() {
    let llm = ScriptedLlm::new(vec!["not json at all"]);
    let app = router(MemoryStore::new(), Arc::new(MemoryObjects::default()), llm);

    let response = app
        .oneshot(json_request("/api/search", json!({ "query": "anything" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UPSTREAM_FAILED");
    assert!(!body["error"]["message"].as_str().unwrap().contains("not json"));
}

#[tokio::test]
async fn test_analyze_report_end_to_end() {
    let store = MemoryStore::new();
    let report = Report::new(
        "Raftaar".to_string(),
        "raftaar.csv".to_string(),
        ReportType::RaftaarAmbulance,
    );
    store.add_report(report.clone());
    let objects = MemoryObjects::with_file("raftaar.csv", "A,123,X,Y");
    let llm = ScriptedLlm::new(vec![
        r#"{"bookings": [{"name": "A", "phone": "123", "pickup": "X", "drop": "Y"}]}"#,
    ]);
    let app = router(store.clone(), objects, llm);

    let response = app
        .oneshot(json_request(
            "/api/reports/analyze",
            json!({ "reportId": report.id.to_hex(), "filePath": "raftaar.csv", "reportType": "raftaar_ambulance" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["inserted"], 1);
    assert_eq!(body["table"], "ambulance_bookings");
    assert_eq!(body["reportType"], "raftaar_ambulance");
    assert_eq!(
        store.report(&report.id).unwrap().analysis_status,
        AnalysisStatus::Completed
    );
}

#[tokio::test]
async fn test_analyze_report_error_statuses() {
    let store = MemoryStore::new();
    let mut done = Report::new("Done".to_string(), "d.csv".to_string(), ReportType::Whatsapp);
    done.analysis_status = AnalysisStatus::Completed;
    store.add_report(done.clone());
    let objects = Arc::new(MemoryObjects::default());

    let cases = vec![
        (
            json!({ "reportId": "xyz", "reportType": "whatsapp" }),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({ "reportId": done.id.to_hex(), "reportType": "fax" }),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({ "reportId": mongodb::bson::oid::ObjectId::new().to_hex(), "reportType": "whatsapp" }),
            StatusCode::NOT_FOUND,
        ),
        (
            json!({ "reportId": done.id.to_hex(), "reportType": "whatsapp" }),
            StatusCode::CONFLICT,
        ),
    ];

    for (payload, expected) in cases {
        let app = router(store.clone(), objects.clone(), ScriptedLlm::new(vec![]));
        let response = app
            .oneshot(json_request("/api/reports/analyze", payload.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "payload {payload}");
    }
}

#[tokio::test]
async fn test_chat_answers_from_context() {
    let llm = ScriptedLlm::new(vec!["Rajesh called about OPD timings."]);
    let app = router(MemoryStore::new(), Arc::new(MemoryObjects::default()), llm.clone());

    let response = app
        .oneshot(json_request(
            "/api/chat",
            json!({ "message": "why did Rajesh call?", "context": "Rajesh Kumar asked about OPD timings." }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["reply"],
        "Rajesh called about OPD timings."
    );
    let requests = llm.requests.lock().unwrap();
    assert!(requests[0].user.contains("Rajesh Kumar asked about OPD timings."));
}

#[tokio::test]
async fn test_speak_returns_audio() {
    let app = router(MemoryStore::new(), Arc::new(MemoryObjects::default()), ScriptedLlm::new(vec![]));

    let response = app
        .oneshot(json_request("/api/voice/speak", json!({ "text": "hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"hello");
}

#[tokio::test]
async fn test_transcribe_reads_the_audio_field() {
    let app = router(MemoryStore::new(), Arc::new(MemoryObjects::default()), ScriptedLlm::new(vec![]));

    let boundary = "XBOUNDARYX";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"audio\"; filename=\"clip.webm\"\r\n\
         Content-Type: audio/webm\r\n\r\n\
         abcd\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/voice/transcribe")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["text"],
        "find patient Rajesh (4 bytes)"
    );
}
