pub mod handlers;

pub use handlers::{health_check, product_by_ean, products_by_ean};

use crate::service::LookupService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// 查询接口路由
pub fn router(service: Arc<LookupService>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/productByEan", get(product_by_ean))
        .route("/productsByEan", post(products_by_ean))
        .with_state(service)
}
