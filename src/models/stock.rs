use bigdecimal::{BigDecimal, One, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StockError};

/// 标准化库存记录 (每个数据源、每个商品一条)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub identifier: String,
    pub name: String,
    pub quantity: u64,
    #[serde(with = "decimal_number")]
    pub price_net: BigDecimal,
    #[serde(with = "decimal_number")]
    pub price_gross: BigDecimal,
    #[serde(rename = "vat", with = "decimal_number")]
    pub vat_rate: BigDecimal,
    pub source: String,
}

impl StockRecord {
    /// 输出前的统一校验: 标识非空, 价格非负, 税率在 [0, 1]
    pub fn check(&self) -> Result<()> {
        if self.identifier.trim().is_empty() {
            return Err(StockError::MissingIdentifier);
        }
        if self.price_net < BigDecimal::zero() {
            return Err(StockError::malformed("priceNet", self.price_net.to_string()));
        }
        if self.price_gross < BigDecimal::zero() {
            return Err(StockError::malformed("priceGross", self.price_gross.to_string()));
        }
        if self.vat_rate < BigDecimal::zero() || self.vat_rate > BigDecimal::one() {
            return Err(StockError::malformed("vat", self.vat_rate.to_string()));
        }
        Ok(())
    }

    /// 拆分为 (标识, 可用性条目)
    pub fn into_availability(self) -> (String, Availability) {
        let availability = Availability {
            name: self.name,
            quantity: self.quantity,
            price_net: self.price_net,
            price_gross: self.price_gross,
            vat_rate: self.vat_rate,
            source: self.source,
        };
        (self.identifier, availability)
    }
}

/// 某数据源上的可用性 (不含标识, 标识由父级承载)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub name: String,
    pub quantity: u64,
    #[serde(with = "decimal_number")]
    pub price_net: BigDecimal,
    #[serde(with = "decimal_number")]
    pub price_gross: BigDecimal,
    #[serde(rename = "vat", with = "decimal_number")]
    pub vat_rate: BigDecimal,
    pub source: String,
}

/// 按标识聚合后的商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedProduct {
    pub identifier: String,
    pub available_on: Vec<Availability>,
}

impl AggregatedProduct {
    /// 未找到时返回的空记录
    pub fn empty(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            available_on: Vec::new(),
        }
    }
}

/// 批量查询结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchLookup {
    pub products: Vec<AggregatedProduct>,
    pub total: usize,
}

/// JSON 中价格以数字形式出现, 内部保持 BigDecimal
pub(crate) mod decimal_number {
    use bigdecimal::{BigDecimal, ToPrimitive};
    use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serializer};

    use crate::parsers::numeric::decimal_from_f64;

    pub fn serialize<S: Serializer>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
        let number = value
            .to_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| S::Error::custom(format!("decimal {value} is not representable")))?;
        serializer.serialize_f64(number)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigDecimal, D::Error> {
        let number = f64::deserialize(deserializer)?;
        decimal_from_f64(number).map_err(D::Error::custom)
    }
}
