use bigdecimal::{BigDecimal, Zero};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;

use super::numeric::{cent, derive_gross, derive_vat, parse_price, parse_quantity, parse_vat_percent};
use super::{FeedParser, Field, ParseOutcome};
use crate::config::FieldNames;
use crate::error::{Result, StockError};
use crate::models::{IssueKind, StockRecord};

/// 分页接口返回的一批数据 (分页拉取由外部完成)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonBatch {
    pub products: Vec<Value>,
    #[serde(default)]
    pub total_count: Option<u64>,
}

/// 落盘的原始数据可能是多批、单批或已展开的条目数组
enum JsonFeed {
    Batches(Vec<JsonBatch>),
    Batch(JsonBatch),
    Items(Vec<Value>),
}

fn is_batch(value: &Value) -> bool {
    value.get("products").is_some() || value.get("totalCount").is_some()
}

impl JsonFeed {
    /// 数组中只要有一个元素像批次, 就要求所有元素都是合法批次
    fn decode(source: &str, raw: &[u8]) -> Result<Self> {
        match serde_json::from_slice::<Value>(raw)? {
            Value::Array(items) if items.iter().any(is_batch) => {
                let batches = items
                    .into_iter()
                    .map(serde_json::from_value)
                    .collect::<std::result::Result<Vec<JsonBatch>, _>>()?;
                Ok(Self::Batches(batches))
            }
            Value::Array(items) => Ok(Self::Items(items)),
            batch @ Value::Object(_) => Ok(Self::Batch(serde_json::from_value(batch)?)),
            other => Err(StockError::unavailable(
                source,
                format!("expected an array or a batch object, found {other}"),
            )),
        }
    }
}

/// 分页 JSON 数据源: 字段直接改名, 只做类型转换
pub struct JsonFeedParser {
    source: String,
    identifier: String,
    name: String,
    quantity: String,
    price_net: String,
    price_gross: String,
    vat: String,
    sample_limit: usize,
}

fn number_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn json_decimal(field: &'static str, value: Option<&Value>) -> Result<BigDecimal> {
    match value {
        Some(Value::Number(n)) => {
            BigDecimal::from_str(&n.to_string()).map_err(|_| StockError::malformed(field, n.to_string()))
        }
        Some(Value::String(s)) => parse_price(s),
        other => Err(StockError::malformed(field, other.map(Value::to_string).unwrap_or_default())),
    }
}

fn json_quantity(value: Option<&Value>) -> Result<u64> {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64).map(|f| f as u64))
            .ok_or_else(|| StockError::malformed("quantity", n.to_string())),
        Some(Value::String(s)) => parse_quantity(s),
        other => Err(StockError::malformed("quantity", other.map(Value::to_string).unwrap_or_default())),
    }
}

impl JsonFeedParser {
    pub fn new(source: &str, fields: &FieldNames, sample_limit: usize) -> Result<Self> {
        Ok(Self {
            source: source.to_string(),
            identifier: fields.require(source, Field::Identifier)?,
            name: fields.require(source, Field::Name)?,
            quantity: fields.require(source, Field::Quantity)?,
            price_net: fields.require(source, Field::PriceNet)?,
            price_gross: fields.require(source, Field::PriceGross)?,
            vat: fields.require(source, Field::Vat)?,
            sample_limit,
        })
    }

    /// 解析已解码的批次
    pub fn parse_batches(&self, batches: &[JsonBatch]) -> ParseOutcome {
        let mut outcome = ParseOutcome::new(&self.source, self.sample_limit);
        if let Some(expected) = batches.first().and_then(|b| b.total_count) {
            let received: usize = batches.iter().map(|b| b.products.len()).sum();
            if received as u64 != expected {
                tracing::warn!(source = %self.source, "Received {} of {} products announced by the API", received, expected);
            }
        }
        for item in batches.iter().flat_map(|b| b.products.iter()) {
            self.push_item(&mut outcome, item);
        }
        outcome
    }

    fn parse_items(&self, items: &[Value]) -> ParseOutcome {
        let mut outcome = ParseOutcome::new(&self.source, self.sample_limit);
        for item in items {
            self.push_item(&mut outcome, item);
        }
        outcome
    }

    fn push_item(&self, outcome: &mut ParseOutcome, item: &Value) {
        outcome.report.items_read += 1;
        let row = outcome.report.items_read;
        let Some(fields) = item.as_object() else {
            outcome
                .report
                .record(row, IssueKind::InvalidValue, format!("item is not an object: {item}"));
            return;
        };
        match self.convert(outcome, row, fields) {
            Ok(record) => outcome.emit(row, record),
            Err(e) => outcome.report.record(row, IssueKind::InvalidValue, e.to_string()),
        }
    }

    fn stated_vat(value: Option<&Value>) -> Result<BigDecimal> {
        match value.and_then(number_text) {
            Some(text) => parse_vat_percent(&text),
            None => Err(StockError::malformed("vat", value.map(Value::to_string).unwrap_or_default())),
        }
    }

    fn convert(&self, outcome: &mut ParseOutcome, row: usize, fields: &Map<String, Value>) -> Result<StockRecord> {
        // 标识可能为 null 或数字
        let identifier = match fields.get(&self.identifier) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let name = fields
            .get(&self.name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let quantity = json_quantity(fields.get(&self.quantity))?;
        let price_net = json_decimal("priceNet", fields.get(&self.price_net))?;
        let price_gross = json_decimal("priceGross", fields.get(&self.price_gross))?;
        let stated = Self::stated_vat(fields.get(&self.vat));

        // 有净价时税率由净价/含税价推导, 声明的税率只用于核对
        let vat_rate = if price_net.is_zero() {
            stated.unwrap_or_else(|e| {
                outcome.report.record(row, IssueKind::VatDefaulted, format!("{e}, using 0"));
                BigDecimal::zero()
            })
        } else {
            if let Ok(stated) = stated {
                let expected = derive_gross(&price_net, &stated);
                if (&expected - &price_gross).abs() > cent() {
                    outcome.report.record(
                        row,
                        IssueKind::VatMismatch,
                        format!(
                            "'{identifier}': stated vat {stated} implies gross {expected}, feed says {price_gross}"
                        ),
                    );
                }
            }
            derive_vat(&price_net, &price_gross)
        };

        Ok(StockRecord {
            identifier,
            name,
            quantity,
            price_net,
            price_gross,
            vat_rate,
            source: self.source.clone(),
        })
    }
}

impl FeedParser for JsonFeedParser {
    fn source(&self) -> &str {
        &self.source
    }

    fn parse(&self, raw: &[u8]) -> Result<ParseOutcome> {
        let outcome = match JsonFeed::decode(&self.source, raw)? {
            JsonFeed::Batches(batches) => self.parse_batches(&batches),
            JsonFeed::Batch(batch) => self.parse_batches(std::slice::from_ref(&batch)),
            JsonFeed::Items(items) => self.parse_items(&items),
        };
        Ok(outcome)
    }
}
