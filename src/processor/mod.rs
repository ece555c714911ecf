pub mod dataset_assembler;
pub mod field_extractor;
pub mod gazetteer;
pub mod quality_scorer;
pub mod rule_normalizer;
pub mod source_adapter;

pub use dataset_assembler::{AssembledDataset, DatasetAssembler, DatasetSummary, PriceBandLabel};
pub use gazetteer::Gazetteer;
pub use quality_scorer::{PriceBand, QualityScorer, ScoringPolicy};
pub use rule_normalizer::RuleNormalizer;
pub use source_adapter::{PageHarvest, PageRequest, SourceAdapter};
