use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    /// 数据源, 顺序即聚合顺序
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 每个数据源保留的诊断样例条数
    pub sample_limit: usize,
}

/// 数据源格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    Csv,
    Xml,
    Json,
}

/// 标准字段 -> 数据源字段名 (CSV 列名 / XML 标签 / JSON 键)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldNames {
    pub identifier: String,
    pub name: String,
    pub quantity: String,
    #[serde(default)]
    pub price_net: Option<String>,
    #[serde(default)]
    pub price_gross: Option<String>,
    #[serde(default)]
    pub vat: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub format: FeedFormat,
    /// 原始数据在存储中的键 (相对 data_dir)
    pub raw_key: String,
    pub fields: FieldNames,
    /// XML 根节点名
    #[serde(default)]
    pub root_tag: Option<String>,
    /// XML 条目节点名
    #[serde(default)]
    pub item_tag: Option<String>,
}

impl SourceConfig {
    /// 标准化结果在存储中的键
    pub fn processed_key(&self) -> String {
        format!("processed/{}-processed.json", self.name)
    }
}

/// 聚合结果在存储中的键
pub const AGGREGATED_KEY: &str = "processed/all-stocks.json";
/// 运行报告在存储中的键
pub const RUN_REPORT_KEY: &str = "processed/run-report.json";

fn owned(s: &str) -> Option<String> {
    Some(s.to_string())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("data"),
            },
            pipeline: PipelineConfig { sample_limit: 10 },
            sources: vec![
                SourceConfig {
                    name: "apilo".to_string(),
                    format: FeedFormat::Json,
                    raw_key: "warehouses/apilo/apilo-stock.json".to_string(),
                    fields: FieldNames {
                        identifier: "ean".to_string(),
                        name: "name".to_string(),
                        quantity: "quantity".to_string(),
                        price_net: owned("priceWithoutTax"),
                        price_gross: owned("priceWithTax"),
                        vat: owned("tax"),
                    },
                    root_tag: None,
                    item_tag: None,
                },
                SourceConfig {
                    name: "action".to_string(),
                    format: FeedFormat::Csv,
                    raw_key: "warehouses/action/action-stock.csv".to_string(),
                    fields: FieldNames {
                        identifier: "ean".to_string(),
                        name: "nazwa_produktu".to_string(),
                        quantity: "stan_mag".to_string(),
                        price_net: owned("cena_netto_pln"),
                        price_gross: owned("cena_brutto_pln"),
                        vat: None,
                    },
                    root_tag: None,
                    item_tag: None,
                },
                SourceConfig {
                    name: "molos".to_string(),
                    format: FeedFormat::Xml,
                    raw_key: "warehouses/molos/molos-stock.xml".to_string(),
                    fields: FieldNames {
                        identifier: "ean".to_string(),
                        name: "name".to_string(),
                        quantity: "store".to_string(),
                        price_net: owned("price_net"),
                        price_gross: None,
                        vat: owned("vat"),
                    },
                    root_tag: owned("products"),
                    item_tag: owned("product"),
                },
            ],
        }
    }
}

impl AppConfig {
    /// 加载配置: 内置默认值 -> 可选 TOML 文件 -> STOCK_ 前缀环境变量
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default())?;
        let file = path.unwrap_or_else(|| Path::new("stock.toml"));

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from(file).required(path.is_some()))
            .add_source(
                Environment::with_prefix("STOCK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_list_sources_in_aggregation_order() {
        let config = AppConfig::default();
        let names: Vec<_> = config.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["apilo", "action", "molos"]);
        assert_eq!(config.sources[1].processed_key(), "processed/action-processed.json");
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
host = "0.0.0.0"
port = 9000

[pipeline]
sample_limit = 3
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server_addr(), "0.0.0.0:9000");
        assert_eq!(config.pipeline.sample_limit, 3);
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[2].item_tag.as_deref(), Some("product"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/stock.toml"))).is_err());
    }
}
