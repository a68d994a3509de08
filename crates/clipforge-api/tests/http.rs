//! HTTP surface tests against an in-memory state (no FFmpeg, no
//! dispatcher: submitted jobs stay PENDING unless cancelled).

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tower::ServiceExt;

use clipforge_api::{create_router, ApiConfig, AppState, PRINCIPAL_HEADER};
use clipforge_blob::{BlobConfig, BlobStore, DeliveryConfig, DeliveryUrlSigner};
use clipforge_queue::{EventBus, JobAssignment, Scheduler, SchedulerConfig};
use clipforge_store::{Store, StoreConfig};

const CHUNK: usize = 64 * 1024;

struct TestApp {
    _dir: TempDir,
    router: Router,
    // Kept alive so the scheduler's channel stays open.
    _assignments: tokio::sync::mpsc::Receiver<JobAssignment>,
}

async fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let blobs = BlobStore::open(BlobConfig {
        root: dir.path().join("blobs"),
    })
    .await
    .unwrap();
    let store = Store::open(StoreConfig {
        root: dir.path().join("store"),
    })
    .await
    .unwrap();
    let events = EventBus::new(128);
    let (scheduler, assignments) = Scheduler::new(
        SchedulerConfig {
            tick_interval: Duration::from_millis(50),
            ..SchedulerConfig::default()
        },
        store.clone(),
        blobs.clone(),
        events.clone(),
    );

    let config = ApiConfig {
        max_upload_bytes: 10 * 1024 * 1024,
        upload_chunk_bytes: CHUNK as u32,
        upload_staging_dir: dir.path().join("uploads"),
        rate_limit_rps: 1000,
        rate_limit_burst: 1000,
        ..ApiConfig::default()
    };

    let signer = DeliveryUrlSigner::new(DeliveryConfig {
        signing_secret: "test-secret".to_string(),
        base_url: "http://localhost:8000".to_string(),
        playback_expiry: Duration::from_secs(900),
        download_expiry: Duration::from_secs(300),
    });

    let state = AppState::new(config, blobs, store, events, Arc::clone(&scheduler), signer);
    TestApp {
        _dir: dir,
        router: create_router(state, None),
        _assignments: assignments,
    }
}

fn authed(request: axum::http::request::Builder) -> axum::http::request::Builder {
    request.header(PRINCIPAL_HEADER, "user-1")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn post_json(app: &TestApp, uri: &str, principal: &str, body: Value) -> axum::response::Response {
    app.router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(PRINCIPAL_HEADER, principal)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get(app: &TestApp, uri: &str, principal: &str) -> axum::response::Response {
    app.router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(PRINCIPAL_HEADER, principal)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Multipart body for one chunk upload.
fn chunk_body(boundary: &str, index: u32, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\ncontent-disposition: form-data; name=\"chunk_number\"\r\n\r\n{index}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\ncontent-disposition: form-data; name=\"chunk\"; filename=\"chunk.bin\"\r\ncontent-type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

async fn send_chunk(
    app: &TestApp,
    upload_id: &str,
    index: u32,
    bytes: &[u8],
) -> axum::response::Response {
    let boundary = "clipforge-test-boundary";
    app.router
        .clone()
        .oneshot(
            authed(Request::builder().method("POST").uri(format!("/upload/chunk/{upload_id}")))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(chunk_body(boundary, index, bytes)))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// A fake "video" payload: mp4 magic up front so sniffing accepts it.
fn video_payload(total: usize) -> Vec<u8> {
    let mut data = vec![0, 0, 0, 24];
    data.extend_from_slice(b"ftypisom");
    data.extend_from_slice(b"isomiso2avc1mp41");
    while data.len() < total {
        data.push((data.len() % 251) as u8);
    }
    data.truncate(total);
    data
}

async fn init_upload(app: &TestApp, size: usize) -> String {
    let response = post_json(
        app,
        "/upload/init",
        "user-1",
        json!({"filename": "talk.mp4", "size": size, "content_type": "video/mp4"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["chunk_size"], CHUNK as u64);
    body["upload_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn requests_without_principal_are_unauthenticated() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/jobs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_needs_no_principal() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn oversize_init_is_rejected_and_creates_nothing() {
    let app = test_app().await;
    let response = post_json(
        &app,
        "/upload/init",
        "user-1",
        json!({"filename": "big.mp4", "size": 10 * 1024 * 1024 + 1, "content_type": "video/mp4"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "oversize");

    // No session exists, chunk writes 404.
    let response = send_chunk(&app, "no-such-upload", 0, &[0u8; CHUNK]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn boundary_size_is_accepted() {
    let app = test_app().await;
    let response = post_json(
        &app,
        "/upload/init",
        "user-1",
        json!({"filename": "big.mp4", "size": 10 * 1024 * 1024, "content_type": "video/mp4"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn wrong_extension_is_rejected() {
    let app = test_app().await;
    let response = post_json(
        &app,
        "/upload/init",
        "user-1",
        json!({"filename": "notes.txt", "size": 1024, "content_type": "video/mp4"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn chunked_upload_roundtrip_matches_digest() {
    let app = test_app().await;
    let data = video_payload(4 * CHUNK);
    let upload_id = init_upload(&app, data.len()).await;

    // Send chunks out of order; every index lands.
    for index in [2u32, 0, 3, 1] {
        let start = index as usize * CHUNK;
        let response = send_chunk(&app, &upload_id, index, &data[start..start + CHUNK]).await;
        assert_eq!(response.status(), StatusCode::OK, "chunk {index}");
    }

    let response = post_json(
        &app,
        &format!("/upload/complete/{upload_id}"),
        "user-1",
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let expected_digest = format!("{:x}", Sha256::digest(&data));
    assert_eq!(body["blob_id"], expected_digest.as_str());
    assert_eq!(body["size"], data.len() as u64);
    assert_eq!(body["content_type"], "video/mp4");

    // The session is gone after completion.
    let response = get(&app, &format!("/upload/{upload_id}"), "user-1").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_chunk_is_noop_and_conflict_on_mismatch() {
    let app = test_app().await;
    let data = video_payload(4 * CHUNK);
    let upload_id = init_upload(&app, data.len()).await;

    for index in 0..4u32 {
        let start = index as usize * CHUNK;
        send_chunk(&app, &upload_id, index, &data[start..start + CHUNK]).await;
    }

    // Identical resend of chunk 2: no-op success.
    let response = send_chunk(&app, &upload_id, 2, &data[2 * CHUNK..3 * CHUNK]).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Mismatched length on an accepted index: conflict.
    let response = send_chunk(&app, &upload_id, 2, &data[..CHUNK / 2]).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "conflict");

    // Conflict did not break the session; complete still succeeds.
    let response = post_json(
        &app,
        &format!("/upload/complete/{upload_id}"),
        "user-1",
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn incomplete_upload_cannot_complete() {
    let app = test_app().await;
    let data = video_payload(4 * CHUNK);
    let upload_id = init_upload(&app, data.len()).await;
    send_chunk(&app, &upload_id, 0, &data[..CHUNK]).await;

    let response = post_json(
        &app,
        &format!("/upload/complete/{upload_id}"),
        "user-1",
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "incomplete");

    // Status endpoint reports what is missing.
    let response = get(&app, &format!("/upload/{upload_id}"), "user-1").await;
    let body = body_json(response).await;
    assert_eq!(body["received_chunks"], 1);
    assert_eq!(body["missing_indices"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn out_of_range_chunk_is_rejected() {
    let app = test_app().await;
    let upload_id = init_upload(&app, 2 * CHUNK).await;
    let response = send_chunk(&app, &upload_id, 7, &[1u8; CHUNK]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_video_content_is_rejected_at_complete() {
    let app = test_app().await;
    let mut data = vec![b'P', b'K', 3, 4]; // zip magic
    data.resize(CHUNK, 7);
    let upload_id = init_upload(&app, data.len()).await;
    send_chunk(&app, &upload_id, 0, &data).await;

    let response = post_json(
        &app,
        &format!("/upload/complete/{upload_id}"),
        "user-1",
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn upload_sessions_are_principal_scoped() {
    let app = test_app().await;
    let upload_id = init_upload(&app, 2 * CHUNK).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/upload/{upload_id}"))
                .header(PRINCIPAL_HEADER, "user-2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

async fn assembled_blob(app: &TestApp) -> String {
    let data = video_payload(2 * CHUNK);
    let upload_id = init_upload(app, data.len()).await;
    for index in 0..2u32 {
        let start = index as usize * CHUNK;
        send_chunk(app, &upload_id, index, &data[start..start + CHUNK]).await;
    }
    let response = post_json(
        app,
        &format!("/upload/complete/{upload_id}"),
        "user-1",
        json!({}),
    )
    .await;
    body_json(response).await["blob_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn job_lifecycle_submit_status_cancel() {
    let app = test_app().await;
    let blob_id = assembled_blob(&app).await;

    let response = post_json(
        &app,
        "/jobs",
        "user-1",
        json!({"blob_id": blob_id, "options": {"aspect_ratio": "9:16", "add_captions": true}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let job_id = body_json(response).await["job_id"].as_str().unwrap().to_string();

    // Snapshot: PENDING, queued progress.
    let response = get(&app, &format!("/jobs/{job_id}"), "user-1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["progress"]["percent"], 0);
    assert_eq!(body["options"]["aspect_ratio"], "9:16");

    // Listing sees it; another principal does not.
    let response = get(&app, "/jobs", "user-1").await;
    let body = body_json(response).await;
    assert_eq!(body["jobs"].as_array().unwrap().len(), 1);
    let response = get(&app, "/jobs", "user-2").await;
    let body = body_json(response).await;
    assert!(body["jobs"].as_array().unwrap().is_empty());

    // Cancel is 204 and idempotent.
    let response = post_json(&app, &format!("/jobs/{job_id}/cancel"), "user-1", json!({})).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = post_json(&app, &format!("/jobs/{job_id}/cancel"), "user-1", json!({})).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get(&app, &format!("/jobs/{job_id}"), "user-1").await;
    let body = body_json(response).await;
    assert_eq!(body["status"], "CANCELLED");
}

#[tokio::test]
async fn submit_with_unknown_blob_is_not_found() {
    let app = test_app().await;
    let response = post_json(
        &app,
        "/jobs",
        "user-1",
        json!({"blob_id": "ab".repeat(32), "options": {}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submit_with_malformed_blob_id_is_invalid() {
    let app = test_app().await;
    let response = post_json(&app, "/jobs", "user-1", json!({"blob_id": "not-a-digest"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "invalid-parameters");
}

#[tokio::test]
async fn jobs_are_principal_scoped() {
    let app = test_app().await;
    let blob_id = assembled_blob(&app).await;
    let response = post_json(&app, "/jobs", "user-1", json!({"blob_id": blob_id})).await;
    let job_id = body_json(response).await["job_id"].as_str().unwrap().to_string();

    let response = get(&app, &format!("/jobs/{job_id}"), "user-2").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = post_json(&app, &format!("/jobs/{job_id}/cancel"), "user-2", json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn artifacts_list_is_empty_before_completion() {
    let app = test_app().await;
    let blob_id = assembled_blob(&app).await;
    let response = post_json(&app, "/jobs", "user-1", json!({"blob_id": blob_id})).await;
    let job_id = body_json(response).await["job_id"].as_str().unwrap().to_string();

    let response = get(&app, &format!("/jobs/{job_id}/artifacts"), "user-1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["artifacts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn transcript_is_404_until_transcribed() {
    let app = test_app().await;
    let blob_id = assembled_blob(&app).await;
    let response = post_json(&app, "/jobs", "user-1", json!({"blob_id": blob_id})).await;
    let job_id = body_json(response).await["job_id"].as_str().unwrap().to_string();

    let response = get(&app, &format!("/jobs/{job_id}/transcript"), "user-1").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
