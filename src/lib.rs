pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod parsers;
pub mod service;
pub mod store;

pub use config::AppConfig;
pub use error::{Result, StockError};
pub use service::{aggregate, LookupService, StockPipeline};
pub use store::BlobStore;
