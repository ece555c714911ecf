pub mod pipeline_config;
pub mod source_config;

pub use pipeline_config::{OutputConfig, OutputFormat, PipelineSettings};
pub use source_config::{PaginationConfig, SourceConfig, StrategyConfig};
