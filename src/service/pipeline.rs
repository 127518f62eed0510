use chrono::Utc;
use rayon::prelude::*;
use std::path::PathBuf;

use crate::config::{AppConfig, SourceConfig, AGGREGATED_KEY, RUN_REPORT_KEY};
use crate::error::{Result, StockError};
use crate::models::{AggregatedProduct, ParseReport, RunReport, SourceSummary, StockRecord};
use crate::parsers::{build_parser, FeedParser, ParseOutcome};
use crate::service::aggregator::aggregate;
use crate::store::BlobStore;

/// 一个已配置的数据源: 原始数据键 + 对应解析器
pub struct FeedSource {
    config: SourceConfig,
    parser: Box<dyn FeedParser>,
}

impl FeedSource {
    pub fn new(config: SourceConfig, sample_limit: usize) -> Result<Self> {
        let parser = build_parser(&config, sample_limit)?;
        Ok(Self { config, parser })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }
}

/// 单个数据源的运行结果
struct SourceRun {
    records: Vec<StockRecord>,
    summary: SourceSummary,
}

/// 一次完整运行的结果
#[derive(Debug)]
pub struct PipelineRun {
    pub products: Vec<AggregatedProduct>,
    pub report: RunReport,
}

/// 标准化 + 聚合流水线
///
/// 各数据源并行解析 (rayon), 全部完成后按配置顺序聚合。
/// 单个数据源失败只会让该数据源的结果为空, 不影响其他数据源。
pub struct StockPipeline {
    store: BlobStore,
    sources: Vec<FeedSource>,
}

impl StockPipeline {
    pub fn new(store: BlobStore, sources: Vec<FeedSource>) -> Self {
        Self { store, sources }
    }

    /// 按配置构造; 字段映射错误在这里即报错
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut names = std::collections::HashSet::new();
        let mut sources = Vec::with_capacity(config.sources.len());
        for source in &config.sources {
            if !names.insert(source.name.as_str()) {
                return Err(StockError::Config(format!("duplicate source name '{}'", source.name)));
            }
            sources.push(FeedSource::new(source.clone(), config.pipeline.sample_limit)?);
        }
        Ok(Self::new(BlobStore::new(&config.storage.data_dir), sources))
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }

    /// 把外部拉取到的原始数据放到该数据源的原始数据键下
    pub fn import(&self, name: &str, raw: &[u8]) -> Result<PathBuf> {
        let source = self
            .sources
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| StockError::Config(format!("unknown source '{name}'")))?;
        let path = self.store.write_bytes(&source.config.raw_key, raw)?;
        tracing::info!(source = name, bytes = raw.len(), "Imported raw data to: {}", path.display());
        Ok(path)
    }

    fn load_and_parse(&self, source: &FeedSource) -> Result<ParseOutcome> {
        let raw = self
            .store
            .read_bytes(&source.config.raw_key)?
            .ok_or_else(|| StockError::unavailable(source.name(), format!("{} not found", source.config.raw_key)))?;
        tracing::info!(source = source.name(), bytes = raw.len(), "Started parsing {} data", source.name());
        source.parser.parse(&raw)
    }

    /// 解析单个数据源并写出其标准化结果; 任何失败都转为空序列
    fn run_source(&self, source: &FeedSource) -> SourceRun {
        let (records, report, as_of, failure) = match self.load_and_parse(source) {
            Ok(outcome) => {
                outcome.report.log(source.name());
                (outcome.records, outcome.report, outcome.as_of, None)
            }
            Err(e) => {
                tracing::error!(source = source.name(), "Error while parsing {} data: {}", source.name(), e);
                (Vec::new(), ParseReport::default(), None, Some(e.to_string()))
            }
        };

        let failure = match self.store.write_json(&source.config.processed_key(), &records) {
            Ok(path) => {
                tracing::info!(source = source.name(), "Successfully saved data to: {}", path.display());
                failure
            }
            Err(e) => {
                tracing::error!(source = source.name(), "Failed to save processed data: {}", e);
                failure.or_else(|| Some(e.to_string()))
            }
        };

        SourceRun {
            summary: SourceSummary {
                source: source.name().to_string(),
                records: records.len(),
                failure,
                as_of,
                report,
            },
            records,
        }
    }

    /// 执行一次完整运行: 解析 -> 写出各源结果 -> 聚合 -> 写出聚合结果与报告
    pub fn run(&self) -> Result<PipelineRun> {
        tracing::info!("Started aggregating data from {} warehouses", self.sources.len());

        // par_iter + collect 保持数据源顺序
        let runs: Vec<SourceRun> = self.sources.par_iter().map(|s| self.run_source(s)).collect();

        let mut summaries = Vec::with_capacity(runs.len());
        let mut batches = Vec::with_capacity(runs.len());
        for run in runs {
            summaries.push(run.summary);
            batches.push(run.records);
        }
        let total_records: usize = batches.iter().map(Vec::len).sum();
        let products = aggregate(batches);

        tracing::info!("Summary:");
        for summary in &summaries {
            tracing::info!("  - Products from {}: {}", summary.source, summary.records);
        }
        tracing::info!("  - Total: {} records, {} distinct products", total_records, products.len());

        let path = self.store.write_json(AGGREGATED_KEY, &products)?;
        tracing::info!("Successfully saved data to: {}", path.display());

        let report = RunReport {
            generated_at: Utc::now(),
            sources: summaries,
            total_records,
            products: products.len(),
        };
        self.store.write_json(RUN_REPORT_KEY, &report)?;

        Ok(PipelineRun { products, report })
    }
}
