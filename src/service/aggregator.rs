use indexmap::IndexMap;

use crate::models::{AggregatedProduct, Availability, StockRecord};

/// 按标识聚合所有数据源的记录。
///
/// 遍历顺序为 数据源顺序 -> 源内记录顺序; 输出按标识首次出现的顺序排列,
/// `available_on` 按数据源处理顺序排列。同一数据源的重复标识不去重。
/// 空标识的记录被跳过。
pub fn aggregate<I, S>(batches: I) -> Vec<AggregatedProduct>
where
    I: IntoIterator<Item = S>,
    S: IntoIterator<Item = StockRecord>,
{
    let mut grouped: IndexMap<String, Vec<Availability>> = IndexMap::new();

    for record in batches.into_iter().flatten() {
        if record.identifier.trim().is_empty() {
            continue;
        }
        let (identifier, availability) = record.into_availability();
        grouped.entry(identifier).or_default().push(availability);
    }

    grouped
        .into_iter()
        .map(|(identifier, available_on)| AggregatedProduct {
            identifier,
            available_on,
        })
        .collect()
}
