pub mod csv_feed;
pub mod json_feed;
pub mod numeric;
pub mod xml_feed;

pub use csv_feed::CsvFeedParser;
pub use json_feed::{JsonBatch, JsonFeedParser};
pub use xml_feed::XmlFeedParser;

use crate::config::{FeedFormat, FieldNames, SourceConfig};
use crate::error::{Result, StockError};
use crate::models::{IssueKind, ParseReport, StockRecord};

/// 数据源解析器: 原始数据 -> 标准化记录序列
///
/// 行级问题记录在 `ParseReport` 中并继续处理; 只有整个数据源
/// 无法解析 (如文档结构错误) 时才返回 `Err`。
pub trait FeedParser: Send + Sync {
    fn source(&self) -> &str;

    fn parse(&self, raw: &[u8]) -> Result<ParseOutcome>;
}

/// 单个数据源的解析结果
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub source: String,
    pub records: Vec<StockRecord>,
    pub report: ParseReport,
    /// 数据源自带的数据时间 (仅供参考)
    pub as_of: Option<String>,
}

impl ParseOutcome {
    pub fn new(source: &str, sample_limit: usize) -> Self {
        Self {
            source: source.to_string(),
            records: Vec::new(),
            report: ParseReport::new(sample_limit),
            as_of: None,
        }
    }

    /// 校验后输出; 不合格的记录计入诊断并丢弃
    pub fn emit(&mut self, row: usize, record: StockRecord) {
        match record.check() {
            Ok(()) => {
                self.records.push(record);
                self.report.records_emitted += 1;
            }
            Err(StockError::MissingIdentifier) => {
                let name = if record.name.is_empty() { "<unnamed>" } else { record.name.as_str() };
                self.report
                    .record(row, IssueKind::MissingIdentifier, format!("no identifier for '{name}'"));
            }
            Err(e) => self.report.record(row, IssueKind::InvalidValue, e.to_string()),
        }
    }
}

/// 标准字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Identifier,
    Name,
    Quantity,
    PriceNet,
    PriceGross,
    Vat,
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::Identifier => "identifier",
            Field::Name => "name",
            Field::Quantity => "quantity",
            Field::PriceNet => "price_net",
            Field::PriceGross => "price_gross",
            Field::Vat => "vat",
        }
    }
}

impl FieldNames {
    pub fn key(&self, field: Field) -> Option<&str> {
        let key = match field {
            Field::Identifier => Some(self.identifier.as_str()),
            Field::Name => Some(self.name.as_str()),
            Field::Quantity => Some(self.quantity.as_str()),
            Field::PriceNet => self.price_net.as_deref(),
            Field::PriceGross => self.price_gross.as_deref(),
            Field::Vat => self.vat.as_deref(),
        };
        key.map(str::trim).filter(|k| !k.is_empty())
    }

    /// 构造解析器时校验字段映射, 缺失即配置错误
    pub fn require(&self, source: &str, field: Field) -> Result<String> {
        self.key(field).map(str::to_string).ok_or_else(|| {
            StockError::Config(format!(
                "source '{source}' has no mapping for field '{}'",
                field.label()
            ))
        })
    }
}

/// 按配置构造对应格式的解析器
pub fn build_parser(source: &SourceConfig, sample_limit: usize) -> Result<Box<dyn FeedParser>> {
    if source.name.trim().is_empty() {
        return Err(StockError::Config("source name must not be empty".to_string()));
    }
    let parser: Box<dyn FeedParser> = match source.format {
        FeedFormat::Csv => Box::new(CsvFeedParser::new(&source.name, &source.fields, sample_limit)?),
        FeedFormat::Xml => Box::new(XmlFeedParser::new(
            &source.name,
            &source.fields,
            source.root_tag.as_deref().unwrap_or("products"),
            source.item_tag.as_deref().unwrap_or("product"),
            sample_limit,
        )?),
        FeedFormat::Json => Box::new(JsonFeedParser::new(&source.name, &source.fields, sample_limit)?),
    };
    Ok(parser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn builds_every_default_source() {
        let config = AppConfig::default();
        for source in &config.sources {
            let parser = build_parser(source, 5).unwrap();
            assert_eq!(parser.source(), source.name);
        }
    }

    #[test]
    fn missing_mapping_fails_at_construction() {
        let mut source = AppConfig::default().sources[1].clone();
        source.fields.price_gross = Some("  ".to_string());
        let err = build_parser(&source, 5).err().unwrap();
        assert!(matches!(err, StockError::Config(msg) if msg.contains("price_gross")));
    }
}
