use thiserror::Error;

/// 库内统一错误类型
#[derive(Error, Debug)]
pub enum StockError {
    #[error("malformed {field} value: {raw:?}")]
    MalformedValue { field: &'static str, raw: String },

    #[error("row #{row} rejected: {message}")]
    RowRejected { row: usize, message: String },

    #[error("record has no identifier")]
    MissingIdentifier,

    #[error("source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("column '{0}' not found in header")]
    MissingColumn(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("aggregated stock data is not available")]
    DataUnavailable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("config error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("failed to replace file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl StockError {
    pub fn malformed(field: &'static str, raw: impl Into<String>) -> Self {
        Self::MalformedValue {
            field,
            raw: raw.into(),
        }
    }

    pub fn unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StockError>;
