// tests/metrics.rs
#![cfg(feature = "strict-metrics")]

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use tower::ServiceExt;

use stock_buzz::metrics::Metrics;
use stock_buzz::record::Record;
use stock_buzz::store::merge_at;

#[tokio::test]
async fn metrics_endpoint_exposes_store_series() {
    let metrics = Metrics::init().expect("install recorder");

    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("stocks.jsonl");
    std::fs::write(&path, "not json\n").unwrap();
    merge_at(&path, vec![Record::new("a", "AAPL")], Utc::now()).unwrap();
    merge_at(&path, vec![Record::new("a", "AAPL")], Utc::now()).unwrap();

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap(); // 1 MiB
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "store_merge_new_total 1",
        "store_merge_skipped_total 1",
        "store_corrupt_lines_total 1",
    ] {
        assert!(text.contains(needle), "missing `{needle}` in:\n{text}");
    }
}
