pub mod report;
pub mod stock;

pub use report::{IssueKind, ParseReport, RowIssue, RunReport, SourceSummary};
pub use stock::{AggregatedProduct, Availability, BatchLookup, StockRecord};
