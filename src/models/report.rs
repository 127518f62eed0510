use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 行级问题分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// 列数与表头不一致
    ColumnCount,
    /// 价格/数量等字段无法解析或越界
    InvalidValue,
    /// 缺少商品标识, 无法关联
    MissingIdentifier,
    /// 数值字段无法解析, 按 0 处理 (记录保留)
    ValueDefaulted,
    /// 税率字符串无法解析, 按 0 处理
    VatDefaulted,
    /// 声明的税率与该条目自身的净价/含税价不一致
    VatMismatch,
}

/// 单条诊断信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    pub row: usize,
    pub kind: IssueKind,
    pub message: String,
}

/// 单个数据源的解析诊断: 各类计数 + 前 N 条样例
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseReport {
    pub items_read: usize,
    pub records_emitted: usize,
    pub malformed_rows: usize,
    pub invalid_values: usize,
    pub missing_identifiers: usize,
    pub values_defaulted: usize,
    pub vat_defaulted: usize,
    pub vat_mismatches: usize,
    pub samples: Vec<RowIssue>,
    #[serde(skip)]
    sample_limit: usize,
}

impl ParseReport {
    pub fn new(sample_limit: usize) -> Self {
        Self {
            sample_limit,
            ..Self::default()
        }
    }

    pub fn record(&mut self, row: usize, kind: IssueKind, message: impl Into<String>) {
        match kind {
            IssueKind::ColumnCount => self.malformed_rows += 1,
            IssueKind::InvalidValue => self.invalid_values += 1,
            IssueKind::MissingIdentifier => self.missing_identifiers += 1,
            IssueKind::ValueDefaulted => self.values_defaulted += 1,
            IssueKind::VatDefaulted => self.vat_defaulted += 1,
            IssueKind::VatMismatch => self.vat_mismatches += 1,
        }
        if self.samples.len() < self.sample_limit {
            self.samples.push(RowIssue {
                row,
                kind,
                message: message.into(),
            });
        }
    }

    /// 被丢弃的条目数 (按默认值处理的诊断不丢弃记录)
    pub fn dropped(&self) -> usize {
        self.malformed_rows + self.invalid_values + self.missing_identifiers
    }

    pub fn issue_count(&self) -> usize {
        self.dropped() + self.values_defaulted + self.vat_defaulted + self.vat_mismatches
    }

    /// 输出汇总日志
    pub fn log(&self, source: &str) {
        tracing::info!(
            source,
            items = self.items_read,
            emitted = self.records_emitted,
            "Converted {} of {} items to common format",
            self.records_emitted,
            self.items_read
        );
        if self.issue_count() == 0 {
            return;
        }
        tracing::warn!(
            source,
            malformed_rows = self.malformed_rows,
            invalid_values = self.invalid_values,
            missing_identifiers = self.missing_identifiers,
            values_defaulted = self.values_defaulted,
            vat_defaulted = self.vat_defaulted,
            vat_mismatches = self.vat_mismatches,
            "Found problems in source data"
        );
        for issue in &self.samples {
            tracing::warn!(source, "  - Row #{} ({:?}): {}", issue.row, issue.kind, issue.message);
        }
    }
}

/// 单个数据源在一次运行中的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub source: String,
    pub records: usize,
    /// 整个数据源不可用时的原因
    pub failure: Option<String>,
    /// XML 根节点上的数据时间 (仅供参考)
    pub as_of: Option<String>,
    pub report: ParseReport,
}

/// 一次流水线运行的汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub sources: Vec<SourceSummary>,
    pub total_records: usize,
    pub products: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_issue_but_keeps_only_first_samples() {
        let mut report = ParseReport::new(2);
        report.record(2, IssueKind::ColumnCount, "bad columns");
        report.record(3, IssueKind::InvalidValue, "bad price");
        report.record(4, IssueKind::InvalidValue, "bad quantity");
        report.record(5, IssueKind::VatDefaulted, "vat 'abc'");

        assert_eq!(report.malformed_rows, 1);
        assert_eq!(report.invalid_values, 2);
        assert_eq!(report.vat_defaulted, 1);
        assert_eq!(report.dropped(), 3);
        assert_eq!(report.issue_count(), 4);
        assert_eq!(report.samples.len(), 2);
        assert_eq!(report.samples[1].row, 3);
    }
}
