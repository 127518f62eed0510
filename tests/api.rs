use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use std::sync::Arc;
use stock_aggregator::config::AGGREGATED_KEY;
use stock_aggregator::models::{AggregatedProduct, Availability};
use stock_aggregator::{api, BlobStore, LookupService};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

fn entry(source: &str, quantity: u64) -> Availability {
    Availability {
        name: "Widget".to_string(),
        quantity,
        price_net: BigDecimal::from(10),
        price_gross: BigDecimal::from(12),
        vat_rate: BigDecimal::from(0),
        source: source.to_string(),
    }
}

fn app(with_data: bool) -> (TempDir, Router) {
    let dir = tempdir().unwrap();
    let store = BlobStore::new(dir.path());
    if with_data {
        let products = vec![
            AggregatedProduct {
                identifier: "A".to_string(),
                available_on: vec![entry("apilo", 1), entry("molos", 2)],
            },
            AggregatedProduct {
                identifier: "D".to_string(),
                available_on: vec![entry("action", 3)],
            },
        ];
        store.write_json(AGGREGATED_KEY, &products).unwrap();
    }
    let router = api::router(Arc::new(LookupService::new(store)));
    (dir, router)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn single_lookup_returns_product() {
    let (_dir, app) = app(true);
    let (status, body) = send(app, get("/productByEan?ean=A")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identifier"], "A");
    assert_eq!(body["availableOn"].as_array().unwrap().len(), 2);
    assert_eq!(body["availableOn"][1]["source"], "molos");
    assert_eq!(body["availableOn"][0]["vat"], 0.0);
}

#[tokio::test]
async fn single_lookup_of_unknown_ean_is_empty_not_error() {
    let (_dir, app) = app(true);
    let (status, body) = send(app, get("/productByEan?ean=0000000000000")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"identifier": "0000000000000", "availableOn": []}));
}

#[tokio::test]
async fn single_lookup_requires_ean() {
    let (_dir, app) = app(true);
    let (status, body) = send(app, get("/productByEan")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("EAN"));
}

#[tokio::test]
async fn batch_lookup_returns_matches_and_total() {
    let (_dir, app) = app(true);
    let (status, body) = send(app, post_json("/productsByEan", json!({"eans": ["A", "B", "C"]}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let products = body["products"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["identifier"], "A");
}

#[tokio::test]
async fn batch_lookup_rejects_malformed_body() {
    let (_dir, app) = app(true);
    let (status, _) = send(app, post_json("/productsByEan", json!({"eans": "A"}))).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn lookups_report_missing_data() {
    let (_dir, app) = app(false);
    let (status, body) = send(app.clone(), get("/productByEan?ean=A")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    let (status, _) = send(app, post_json("/productsByEan", json!({"eans": ["A"]}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health() {
    let (_dir, app) = app(false);
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
