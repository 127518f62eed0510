use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::config::AGGREGATED_KEY;
use crate::error::{Result, StockError};
use crate::models::{AggregatedProduct, BatchLookup};
use crate::store::{BlobStore, BlobVersion};

/// 聚合结果的只读索引
#[derive(Debug, Default)]
pub struct StockIndex {
    products: Vec<AggregatedProduct>,
    positions: HashMap<String, usize>,
}

impl StockIndex {
    pub fn new(products: Vec<AggregatedProduct>) -> Self {
        let mut positions = HashMap::with_capacity(products.len());
        for (i, product) in products.iter().enumerate() {
            positions.entry(product.identifier.clone()).or_insert(i);
        }
        Self { products, positions }
    }

    /// 精确查询; 未找到时返回空的 available_on, 而不是错误
    pub fn find(&self, identifier: &str) -> AggregatedProduct {
        self.positions
            .get(identifier)
            .map(|&i| self.products[i].clone())
            .unwrap_or_else(|| AggregatedProduct::empty(identifier))
    }

    /// 批量查询; 未匹配的标识直接省略, 结果保持聚合顺序
    pub fn find_many<S: AsRef<str>>(&self, identifiers: &[S]) -> BatchLookup {
        let wanted: HashSet<&str> = identifiers.iter().map(|s| s.as_ref()).collect();
        let products: Vec<AggregatedProduct> = self
            .products
            .iter()
            .filter(|p| wanted.contains(p.identifier.as_str()))
            .cloned()
            .collect();
        BatchLookup {
            total: products.len(),
            products,
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// 查询服务: 从存储加载聚合结果, 文件版本变化后自动重新加载
pub struct LookupService {
    store: BlobStore,
    cache: RwLock<Option<(BlobVersion, Arc<StockIndex>)>>,
}

impl LookupService {
    pub fn new(store: BlobStore) -> Self {
        Self {
            store,
            cache: RwLock::new(None),
        }
    }

    /// 当前索引; 聚合文件不存在时返回 DataUnavailable
    pub fn index(&self) -> Result<Arc<StockIndex>> {
        let Some(version) = self.store.version(AGGREGATED_KEY)? else {
            return Err(StockError::DataUnavailable);
        };

        if let Ok(guard) = self.cache.read() {
            if let Some((loaded, index)) = guard.as_ref() {
                if *loaded == version {
                    return Ok(Arc::clone(index));
                }
            }
        }

        let products: Vec<AggregatedProduct> = self
            .store
            .read_json(AGGREGATED_KEY)?
            .ok_or(StockError::DataUnavailable)?;
        let index = Arc::new(StockIndex::new(products));
        tracing::info!("Loaded {} aggregated products from {}", index.len(), AGGREGATED_KEY);

        if let Ok(mut guard) = self.cache.write() {
            *guard = Some((version, Arc::clone(&index)));
        }
        Ok(index)
    }

    pub fn find(&self, identifier: &str) -> Result<AggregatedProduct> {
        let index = self.index()?;
        let product = index.find(identifier);
        if product.available_on.is_empty() {
            tracing::info!("Product with EAN {} not found", identifier);
        } else {
            tracing::info!(
                "Found product with EAN {} in: {} warehouses",
                identifier,
                product.available_on.len()
            );
        }
        Ok(product)
    }

    pub fn find_many<S: AsRef<str>>(&self, identifiers: &[S]) -> Result<BatchLookup> {
        let result = self.index()?.find_many(identifiers);
        tracing::info!(
            "Found {} products matching {} EAN numbers",
            result.total,
            identifiers.len()
        );
        Ok(result)
    }
}
