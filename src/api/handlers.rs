use crate::error::StockError;
use crate::service::LookupService;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 单个查询参数: ?ean=...
#[derive(Debug, Deserialize)]
pub struct EanQuery {
    pub ean: Option<String>,
}

/// 批量查询请求体: EAN 列表
#[derive(Debug, Deserialize)]
pub struct BatchLookupRequest {
    pub eans: Vec<String>,
}

/// 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error: message.into(),
    };
    (status, Json(body)).into_response()
}

fn lookup_failure(e: StockError) -> Response {
    match e {
        StockError::DataUnavailable => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Failed to load stock data or no stock data available.",
        ),
        other => {
            tracing::error!("Error processing request: {}", other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
        }
    }
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 按 EAN 查询单个商品, 未找到时返回空 availableOn
pub async fn product_by_ean(
    State(service): State<Arc<LookupService>>,
    Query(query): Query<EanQuery>,
) -> Response {
    let Some(ean) = query.ean.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid request. Please provide an EAN number as a query parameter.",
        );
    };

    let result = tokio::task::spawn_blocking(move || service.find(&ean)).await;
    match result {
        Ok(Ok(product)) => (StatusCode::OK, Json(product)).into_response(),
        Ok(Err(e)) => lookup_failure(e),
        Err(e) => {
            tracing::error!("Lookup task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
        }
    }
}

/// 按 EAN 列表批量查询, 只返回找到的商品
pub async fn products_by_ean(
    State(service): State<Arc<LookupService>>,
    Json(req): Json<BatchLookupRequest>,
) -> Response {
    let result = tokio::task::spawn_blocking(move || service.find_many(&req.eans)).await;
    match result {
        Ok(Ok(batch)) => (StatusCode::OK, Json(batch)).into_response(),
        Ok(Err(e)) => lookup_failure(e),
        Err(e) => {
            tracing::error!("Lookup task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
        }
    }
}
