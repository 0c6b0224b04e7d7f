mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use common::{test_config, EchoLlm, KeywordEmbedder, THREE_CHUNKS};
use docqa_rag::server::{build_router, state::AppState};
use docqa_rag::DocumentIndex;

const BOUNDARY: &str = "docqa-test-boundary";

fn app(dir: &TempDir) -> Router {
    let config = test_config(dir.path());
    let index = Arc::new(DocumentIndex::open(&config).unwrap());
    let state = AppState::from_parts(
        config,
        index,
        Arc::new(KeywordEmbedder),
        Arc::new(EchoLlm::default()),
    )
    .unwrap();
    build_router(state)
}

fn multipart_upload(filename: &str, contents: &str, options: Option<Value>) -> Request<Body> {
    let mut body = String::new();
    if let Some(options) = options {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"options\"\r\n\r\n{options}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n{contents}\r\n--{BOUNDARY}--\r\n"
    ));

    Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_upload_ask_list_delete() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = send(&app, multipart_upload("a.txt", THREE_CHUNKS, None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["filename"], "a.txt");
    assert_eq!(body["chunks"], 3);
    assert_eq!(body["total_chunks"], 3);

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/ask", json!({"question": "Which apple?", "k": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sources"], json!(["cherry apple xxxxxxx", "apple apple apple xx"]));
    assert_eq!(body["source_details"][0]["document"], "a.txt");

    let (status, body) = send(&app, empty_request(Method::GET, "/api/files")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_files"], 1);
    assert_eq!(body["files"][0]["filename"], "a.txt");
    assert_eq!(body["files"][0]["chunks"], 3);

    let (status, body) = send(&app, empty_request(Method::DELETE, "/api/files/a.txt")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["chunks_deleted"], 3);
    assert_eq!(body["remaining_chunks"], 0);

    let (status, body) = send(&app, empty_request(Method::DELETE, "/api/files/a.txt")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found");

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/ask", json!({"question": "Which apple?"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "empty_index");
    assert_eq!(body["error"]["retryable"], false);
}

#[tokio::test]
async fn test_delete_by_untrimmed_name() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = send(&app, multipart_upload("a.txt ", "apple", None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["filename"], "a.txt");

    let (status, body) = send(&app, empty_request(Method::DELETE, "/api/files/a.txt%20")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["filename"], "a.txt");
    assert_eq!(body["chunks_deleted"], 1);
}

#[tokio::test]
async fn test_upload_rejections() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = send(&app, multipart_upload("image.png", "not text", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_parameters");

    let (status, body) = send(&app, multipart_upload("blank.txt", "   \n  ", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "empty_document");

    let bad_options = json!({"chunk_size": 10, "chunk_overlap": 10});
    let (status, _) = send(&app, multipart_upload("a.txt", "apple", Some(bad_options))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, empty_request(Method::GET, "/api/status")).await;
    assert_eq!(body["documents_in_db"], 0);
}

#[tokio::test]
async fn test_upload_options_override_chunking() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let options = json!({"chunk_size": 100, "chunk_overlap": 0});
    let (status, body) = send(&app, multipart_upload("a.md", THREE_CHUNKS, Some(options))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["chunks"], 1);
}

#[tokio::test]
async fn test_status_and_clear() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    send(&app, multipart_upload("a.txt", THREE_CHUNKS, None)).await;
    send(&app, multipart_upload("b.txt", "banana", None)).await;

    let (status, body) = send(&app, empty_request(Method::GET, "/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents_in_db"], 4);
    assert_eq!(body["files"], 2);
    assert_eq!(body["embedding_dimension"], 4);
    assert_eq!(body["delete_policy"], "rebuild");

    let (status, body) = send(&app, empty_request(Method::DELETE, "/api/clear")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files_deleted"], 2);
    assert_eq!(body["chunks_cleared"], 4);

    let (_, body) = send(&app, empty_request(Method::GET, "/api/files")).await;
    assert_eq!(body["total_files"], 0);
}

#[tokio::test]
async fn test_ask_validation_and_health() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    send(&app, multipart_upload("a.txt", THREE_CHUNKS, None)).await;

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/ask", json!({"question": "apple", "k": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_parameters");

    let response = app
        .clone()
        .oneshot(empty_request(Method::GET, "/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(empty_request(Method::GET, "/ready"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
