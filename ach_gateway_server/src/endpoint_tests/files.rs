use actix_web::http::StatusCode;
use serde_json::Value;

use super::helpers::{post_request, start_controller};

#[actix_web::test]
async fn flush_routes_report_the_cycle() {
    let _ = env_logger::try_init();
    let (handle, _worker, _storage) = start_controller().await;
    for path in ["/files/flush/incoming", "/files/flush/outgoing", "/files/flush"] {
        let (status, body) = post_request(path, handle.clone()).await.expect("Request failed");
        assert_eq!(status, StatusCode::OK, "{path}: {body}");
        let report: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(report["errors"], 0);
        assert_eq!(report["files_uploaded"], Value::Array(vec![]));
        assert_eq!(report["transfers_merged"], 0);
    }
}

#[actix_web::test]
async fn flush_after_shutdown_is_unavailable() {
    let _ = env_logger::try_init();
    let (handle, worker, _storage) = start_controller().await;
    handle.shutdown();
    worker.await.unwrap();
    let (status, body) = post_request("/files/flush", handle).await.expect("Request failed");
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, r#"{"error":"The file transfer controller is not running"}"#);
}

#[actix_web::test]
async fn unknown_routes_are_not_found() {
    let (handle, _worker, _storage) = start_controller().await;
    let (status, _) = post_request("/files/flush/sideways", handle).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
}
