use bigdecimal::{BigDecimal, One, Zero};
use chrono::{DateTime, NaiveDateTime};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

use super::numeric::{derive_gross, parse_price, parse_quantity, parse_vat_percent};
use super::{FeedParser, Field, ParseOutcome};
use crate::config::FieldNames;
use crate::error::{Result, StockError};
use crate::models::{IssueKind, StockRecord};

/// XML 数据源: 根集合节点下重复的条目节点, 字段按标签名读取。
/// 该格式不提供含税价, 含税价总是由净价和税率推导。
pub struct XmlFeedParser {
    source: String,
    root_tag: String,
    item_tag: String,
    identifier: String,
    name: String,
    price_net: String,
    quantity: String,
    vat: String,
    sample_limit: usize,
}

fn local_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// 根节点 date 属性: 先按 RFC 3339, 再按常见的 "YYYY-MM-DD HH:MM:SS"
fn describe_as_of(raw: &str) -> String {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.to_rfc3339();
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return ts.format("%Y-%m-%dT%H:%M:%S").to_string();
    }
    raw.to_string()
}

/// 税率必须落在 [0, 1], 否则与无法解析同样处理
fn in_range_vat(raw: &str) -> Result<BigDecimal> {
    let rate = parse_vat_percent(raw)?;
    if rate < BigDecimal::zero() || rate > BigDecimal::one() {
        return Err(StockError::malformed("vat", raw));
    }
    Ok(rate)
}

impl XmlFeedParser {
    pub fn new(
        source: &str,
        fields: &FieldNames,
        root_tag: &str,
        item_tag: &str,
        sample_limit: usize,
    ) -> Result<Self> {
        if root_tag.trim().is_empty() || item_tag.trim().is_empty() {
            return Err(StockError::Config(format!(
                "source '{source}' needs non-empty root and item tags"
            )));
        }
        Ok(Self {
            source: source.to_string(),
            root_tag: root_tag.trim().to_string(),
            item_tag: item_tag.trim().to_string(),
            identifier: fields.require(source, Field::Identifier)?,
            name: fields.require(source, Field::Name)?,
            price_net: fields.require(source, Field::PriceNet)?,
            quantity: fields.require(source, Field::Quantity)?,
            vat: fields.require(source, Field::Vat)?,
            sample_limit,
        })
    }

    /// 缺失或为空的标签视为缺省值
    fn text<'a>(item: &'a HashMap<String, String>, tag: &str) -> Option<&'a str> {
        item.get(tag).map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    /// 数值字段缺失时为 0; 存在但无法解析时也按 0 处理并记录诊断
    fn number<T: Zero>(
        outcome: &mut ParseOutcome,
        row: usize,
        raw: Option<&str>,
        parse: impl Fn(&str) -> Result<T>,
    ) -> T {
        match raw.map(parse) {
            None => T::zero(),
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                outcome
                    .report
                    .record(row, IssueKind::ValueDefaulted, format!("{e}, using 0"));
                T::zero()
            }
        }
    }

    fn convert(&self, outcome: &mut ParseOutcome, row: usize, item: &HashMap<String, String>) -> StockRecord {
        let price_net: BigDecimal =
            Self::number(outcome, row, Self::text(item, &self.price_net), parse_price);
        let quantity: u64 = Self::number(outcome, row, Self::text(item, &self.quantity), parse_quantity);
        let vat_rate = match Self::text(item, &self.vat) {
            None => BigDecimal::zero(),
            Some(raw) => in_range_vat(raw).unwrap_or_else(|e| {
                outcome.report.record(row, IssueKind::VatDefaulted, format!("{e}, using 0"));
                BigDecimal::zero()
            }),
        };

        StockRecord {
            identifier: Self::text(item, &self.identifier).unwrap_or_default().to_string(),
            name: Self::text(item, &self.name).unwrap_or_default().to_string(),
            quantity,
            price_gross: derive_gross(&price_net, &vat_rate),
            price_net,
            vat_rate,
            source: self.source.clone(),
        }
    }
}

impl FeedParser for XmlFeedParser {
    fn source(&self) -> &str {
        &self.source
    }

    fn parse(&self, raw: &[u8]) -> Result<ParseOutcome> {
        let text = std::str::from_utf8(raw).map_err(|e| StockError::unavailable(&self.source, e))?;
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut outcome = ParseOutcome::new(&self.source, self.sample_limit);
        let mut depth = 0usize;
        let mut seen_root = false;
        let mut item: Option<HashMap<String, String>> = None;
        let mut field: Option<String> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let tag = local_name(&e);
                    match depth {
                        0 => {
                            if tag != self.root_tag {
                                return Err(StockError::unavailable(
                                    &self.source,
                                    format!("expected root <{}>, found <{tag}>", self.root_tag),
                                ));
                            }
                            seen_root = true;
                            for attr in e.attributes() {
                                let attr = attr.map_err(quick_xml::Error::from)?;
                                if attr.key.local_name().as_ref() == b"date" {
                                    let as_of = describe_as_of(&attr.unescape_value()?);
                                    tracing::info!(source = %self.source, "XML data last updated at: {}", as_of);
                                    outcome.as_of = Some(as_of);
                                }
                            }
                        }
                        1 if tag == self.item_tag => item = Some(HashMap::new()),
                        2 if item.is_some() => field = Some(tag),
                        _ => {}
                    }
                    depth += 1;
                }
                Event::Empty(e) => {
                    // <product/> 没有标识, 直接计入丢弃
                    if depth == 1 && local_name(&e) == self.item_tag {
                        outcome.report.items_read += 1;
                        let row = outcome.report.items_read;
                        outcome
                            .report
                            .record(row, IssueKind::MissingIdentifier, "empty item element");
                    } else if depth == 0 && local_name(&e) == self.root_tag {
                        seen_root = true;
                    }
                }
                Event::Text(t) => {
                    if let (Some(values), Some(tag)) = (item.as_mut(), field.as_ref()) {
                        values.entry(tag.clone()).or_default().push_str(&t.unescape()?);
                    }
                }
                Event::CData(c) => {
                    if let (Some(values), Some(tag)) = (item.as_mut(), field.as_ref()) {
                        values
                            .entry(tag.clone())
                            .or_default()
                            .push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    match depth {
                        2 => field = None,
                        1 => {
                            if let Some(values) = item.take() {
                                outcome.report.items_read += 1;
                                let row = outcome.report.items_read;
                                let record = self.convert(&mut outcome, row, &values);
                                outcome.emit(row, record);
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(StockError::unavailable(
                &self.source,
                format!("no <{}> root element", self.root_tag),
            ));
        }
        if outcome.report.items_read == 0 {
            tracing::warn!(source = %self.source, "No <{}> elements found in XML", self.item_tag);
        }
        Ok(outcome)
    }
}
