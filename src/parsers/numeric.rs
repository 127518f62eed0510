//! 价格/数量/税率的区域格式解析
//!
//! 供应商数据中的数值是字符串, 可能带空格 (含不换行空格)、逗号小数点、
//! 千分位点等。这里统一转换为 BigDecimal / u64。

use bigdecimal::{BigDecimal, One, RoundingMode, Zero};
use std::str::FromStr;

use crate::error::{Result, StockError};

fn strip_whitespace(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// 0.01, 价格比较的容差
pub fn cent() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

/// 四舍五入到 2 位小数
pub fn round2(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<BigDecimal> {
    let mut clean = strip_whitespace(raw);
    // 含逗号时逗号为小数点, 点视为千分位
    if clean.contains(',') {
        clean = clean.replace('.', "").replace(',', ".");
    }
    if clean.is_empty()
        || clean.matches('.').count() > 1
        || !clean.bytes().all(|b| b.is_ascii_digit() || b == b'.' || b == b'-' || b == b'+')
    {
        return Err(StockError::malformed(field, raw));
    }
    BigDecimal::from_str(&clean).map_err(|_| StockError::malformed(field, raw))
}

/// 解析价格: "12,50" 与 "12.50" 都得到 12.5, 负数视为非法
pub fn parse_price(raw: &str) -> Result<BigDecimal> {
    let price = parse_decimal("price", raw)?;
    if price < BigDecimal::zero() {
        return Err(StockError::malformed("price", raw));
    }
    Ok(price)
}

/// 解析数量: 去空格后必须是非负整数
pub fn parse_quantity(raw: &str) -> Result<u64> {
    strip_whitespace(raw)
        .parse::<u64>()
        .map_err(|_| StockError::malformed("quantity", raw))
}

/// 由净价与含税价推导税率, 净价为 0 时税率为 0
pub fn derive_vat(net: &BigDecimal, gross: &BigDecimal) -> BigDecimal {
    if net.is_zero() {
        return BigDecimal::zero();
    }
    round2(&((gross - net) / net))
}

/// 由净价与税率推导含税价
pub fn derive_gross(net: &BigDecimal, vat: &BigDecimal) -> BigDecimal {
    round2(&(net * (BigDecimal::one() + vat)))
}

/// 解析百分比税率 ("23%" -> 0.23); 调用方决定解析失败时如何处理
pub fn parse_vat_percent(raw: &str) -> Result<BigDecimal> {
    let clean = strip_whitespace(raw);
    let number = clean.strip_suffix('%').unwrap_or(&clean);
    let percent = parse_decimal("vat", number).map_err(|_| StockError::malformed("vat", raw))?;
    Ok(percent / BigDecimal::from(100))
}

/// f64 转 BigDecimal, 使用最短十进制表示 (12.3 而非 12.2999...)
pub fn decimal_from_f64(value: f64) -> Result<BigDecimal> {
    if !value.is_finite() {
        return Err(StockError::malformed("number", value.to_string()));
    }
    BigDecimal::from_str(&value.to_string()).map_err(|_| StockError::malformed("number", value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn comma_and_dot_separators_agree() {
        assert_eq!(parse_price("12,50").unwrap(), dec("12.5"));
        assert_eq!(parse_price("12.50").unwrap(), dec("12.5"));
        assert_eq!(parse_price(" 1 234,99 ").unwrap(), dec("1234.99"));
        assert_eq!(parse_price("1\u{a0}234,99").unwrap(), dec("1234.99"));
        assert_eq!(parse_price("1.234,56").unwrap(), dec("1234.56"));
    }

    #[test]
    fn price_rejects_garbage_and_negatives() {
        for raw in ["", "abc", "12,5,0", "-1.00", "NaN", "inf", "1e5x"] {
            let err = parse_price(raw).unwrap_err();
            assert!(
                matches!(err, StockError::MalformedValue { field: "price", .. }),
                "{raw:?} -> {err}"
            );
        }
    }

    #[test]
    fn quantity_parsing() {
        assert_eq!(parse_quantity(" 15 ").unwrap(), 15);
        assert_eq!(parse_quantity("1 000").unwrap(), 1000);
        assert!(parse_quantity("-3").is_err());
        assert!(parse_quantity("2.5").is_err());
        assert!(parse_quantity("").is_err());
    }

    #[test]
    fn vat_is_derived_from_prices() {
        for (net, gross, rate) in [
            ("10.00", "12.30", "0.23"),
            ("100", "108", "0.08"),
            ("4.99", "5.24", "0.05"),
            ("19.99", "24.59", "0.23"),
        ] {
            let (net, gross) = (dec(net), dec(gross));
            let vat = derive_vat(&net, &gross);
            assert_eq!(vat, dec(rate));
            let rebuilt = &net * (BigDecimal::one() + &vat);
            assert!((rebuilt - &gross).abs() <= dec("0.01"));
        }
    }

    #[test]
    fn vat_is_zero_when_net_is_zero() {
        assert_eq!(derive_vat(&dec("0"), &dec("12.30")), BigDecimal::zero());
        assert_eq!(derive_vat(&dec("0.00"), &dec("0")), BigDecimal::zero());
    }

    #[test]
    fn gross_is_rounded_to_cents() {
        assert_eq!(derive_gross(&dec("9.00"), &dec("0.20")), dec("10.80"));
        assert_eq!(derive_gross(&dec("3.33"), &dec("0.23")), dec("4.10"));
    }

    #[test]
    fn vat_percent_strings() {
        assert_eq!(parse_vat_percent("23%").unwrap(), dec("0.23"));
        assert_eq!(parse_vat_percent("8").unwrap(), dec("0.08"));
        assert_eq!(parse_vat_percent("5,5 %").unwrap(), dec("0.055"));
        assert!(parse_vat_percent("zw").is_err());
        assert!(parse_vat_percent("").is_err());
    }

    #[test]
    fn floats_keep_their_short_form() {
        assert_eq!(decimal_from_f64(12.3).unwrap(), dec("12.3"));
        assert_eq!(decimal_from_f64(0.1 + 0.2).unwrap(), dec("0.30000000000000004"));
        assert!(decimal_from_f64(f64::NAN).is_err());
    }
}
