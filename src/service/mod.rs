pub mod aggregator;
pub mod lookup;
pub mod pipeline;

pub use aggregator::aggregate;
pub use lookup::{LookupService, StockIndex};
pub use pipeline::{FeedSource, PipelineRun, StockPipeline};
