use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use super::numeric::{derive_vat, parse_price, parse_quantity};
use super::{FeedParser, Field, ParseOutcome};
use crate::config::FieldNames;
use crate::error::{Result, StockError};
use crate::models::{IssueKind, StockRecord};

/// 表头规范化: 小写, 空白替换为下划线, 去掉变音符号
pub fn normalize_header(raw: &str) -> String {
    let lowered = raw.trim().trim_start_matches('\u{feff}').to_lowercase();
    let underscored = lowered.split_whitespace().collect::<Vec<_>>().join("_");
    underscored.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// 逗号分隔、带引号、单行表头的文本数据源
pub struct CsvFeedParser {
    source: String,
    identifier: String,
    name: String,
    price_net: String,
    price_gross: String,
    quantity: String,
    sample_limit: usize,
}

/// 表头解析后的列位置
struct Columns {
    width: usize,
    identifier: usize,
    name: usize,
    price_net: usize,
    price_gross: usize,
    quantity: usize,
}

impl CsvFeedParser {
    pub fn new(source: &str, fields: &FieldNames, sample_limit: usize) -> Result<Self> {
        let column = |field| fields.require(source, field).map(|key| normalize_header(&key));
        Ok(Self {
            source: source.to_string(),
            identifier: column(Field::Identifier)?,
            name: column(Field::Name)?,
            price_net: column(Field::PriceNet)?,
            price_gross: column(Field::PriceGross)?,
            quantity: column(Field::Quantity)?,
            sample_limit,
        })
    }

    fn resolve_columns(&self, header: &StringRecord) -> Result<Columns> {
        let index: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(i, h)| (normalize_header(h), i))
            .collect();
        let position = |key: &str| {
            index
                .get(key)
                .copied()
                .ok_or_else(|| StockError::MissingColumn(key.to_string()))
        };

        Ok(Columns {
            width: header.len(),
            identifier: position(&self.identifier)?,
            name: position(&self.name)?,
            price_net: position(&self.price_net)?,
            price_gross: position(&self.price_gross)?,
            quantity: position(&self.quantity)?,
        })
    }

    fn convert(&self, columns: &Columns, row: &StringRecord) -> Result<StockRecord> {
        let cell = |i: usize| row.get(i).unwrap_or_default();
        let price_net = parse_price(cell(columns.price_net))?;
        let price_gross = parse_price(cell(columns.price_gross))?;
        Ok(StockRecord {
            identifier: cell(columns.identifier).to_string(),
            name: cell(columns.name).to_string(),
            quantity: parse_quantity(cell(columns.quantity))?,
            vat_rate: derive_vat(&price_net, &price_gross),
            price_net,
            price_gross,
            source: self.source.clone(),
        })
    }
}

fn is_blank(row: &StringRecord) -> bool {
    row.iter().all(|field| field.trim().is_empty())
}

impl FeedParser for CsvFeedParser {
    fn source(&self) -> &str {
        &self.source
    }

    fn parse(&self, raw: &[u8]) -> Result<ParseOutcome> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(raw);
        let mut rows = reader.records();

        let header = match rows.next() {
            Some(header) => header?,
            None => return Err(StockError::unavailable(&self.source, "empty file, no header row")),
        };
        let columns = self.resolve_columns(&header)?;

        let mut outcome = ParseOutcome::new(&self.source, self.sample_limit);
        for (index, result) in rows.enumerate() {
            // 文件行号 (表头为第 1 行)
            let fallback_line = index + 2;
            let row = match result {
                Ok(row) => row,
                // 行内容无法解码 (如非法 UTF-8), 列数无从判断
                Err(e) => {
                    let line = e.position().map_or(fallback_line, |p| p.line() as usize);
                    outcome.report.items_read += 1;
                    outcome.report.record(line, IssueKind::InvalidValue, e.to_string());
                    continue;
                }
            };
            if is_blank(&row) {
                continue;
            }
            let line = row.position().map_or(fallback_line, |p| p.line() as usize);
            outcome.report.items_read += 1;

            if row.len() != columns.width {
                let rejected = StockError::RowRejected {
                    row: line,
                    message: format!("invalid column count: {}, expected: {}", row.len(), columns.width),
                };
                outcome.report.record(line, IssueKind::ColumnCount, rejected.to_string());
                continue;
            }

            match self.convert(&columns, &row) {
                Ok(record) => outcome.emit(line, record),
                Err(e) => outcome.report.record(line, IssueKind::InvalidValue, e.to_string()),
            }
        }

        Ok(outcome)
    }
}
