use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::PipelineSettings;
use crate::error::ConfigurationError;
use crate::fetcher::{ProgressHandle, ScrapeOrchestrator, ScrapeRequest, Transport};
use crate::models::{RawRecord, RunReport};
use crate::processor::dataset_assembler::{AssembledDataset, DatasetAssembler};
use crate::processor::quality_scorer::{QualityScorer, ScoringPolicy};
use crate::processor::rule_normalizer::RuleNormalizer;

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub dataset: AssembledDataset,
    pub report: RunReport,
}

/// Scrape, normalize, score and assemble in one call.
pub struct Pipeline {
    orchestrator: ScrapeOrchestrator,
    normalizer: RuleNormalizer,
    scorer: QualityScorer,
    assembler: DatasetAssembler,
}

impl Pipeline {
    pub fn new(orchestrator: ScrapeOrchestrator, scoring: ScoringPolicy) -> Self {
        Self {
            orchestrator,
            normalizer: RuleNormalizer::new(),
            assembler: DatasetAssembler::new(scoring.usd_to_inr),
            scorer: QualityScorer::new(scoring),
        }
    }

    /// Builds the orchestrator with adapter overrides applied.
    pub fn from_settings(
        settings: &PipelineSettings,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigurationError> {
        let mut orchestrator = ScrapeOrchestrator::new(
            transport,
            settings.fetch.clone(),
            settings.orchestrator.clone(),
        )?;
        for adapter in settings.load_adapters()? {
            orchestrator = orchestrator.with_adapter(adapter);
        }

        Ok(Self::new(orchestrator, settings.scoring.clone()))
    }

    pub fn progress(&self) -> ProgressHandle {
        self.orchestrator.progress()
    }

    pub async fn run(
        &self,
        request: &ScrapeRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput, ConfigurationError> {
        let output = self.orchestrator.run(request, cancel).await?;
        let dataset = self.process(&output.records);

        Ok(PipelineOutput {
            dataset,
            report: output.report,
        })
    }

    /// The synchronous half: raw records in, assembled dataset out.
    pub fn process(&self, raw: &[RawRecord]) -> AssembledDataset {
        let canonical = self.normalizer.normalize_all(raw);
        info!("Normalized {} raw records", canonical.len());

        let scored = self.scorer.score_all(canonical);
        self.assembler.assemble(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetcher::{FetchPolicyConfig, FetchRequest, FetchResponse, OrchestratorConfig};
    use crate::models::{CategoryId, DeductionKind, Provenance, RunStatus, SourceId};
    use async_trait::async_trait;

    const EXPORTERS_PAGE: &str = r#"
        <html><body><div class="search-result">
          <div class="classified">
            <div class="prd-name"><a href="/product/helmet-1.htm">ISI Marked Industrial Safety Helmet</a></div>
            <div class="prd-price">Rs 350 / Piece</div>
            <div class="com-name">Sai Safety Suppliers Pvt. Ltd.</div>
            <div class="com-location">Vadodara, Gujarat</div>
          </div>
          <div class="classified">
            <div class="prd-name"><a href="/product/helmet-2.htm">ISI Marked Industrial Safety Helmet</a></div>
            <div class="prd-price">Rs 340 / Piece</div>
            <div class="com-name">Sai Safety Suppliers</div>
          </div>
          <div class="classified">
            <div class="prd-name"><a href="/product/gloves.htm">Gloves</a></div>
            <div class="prd-price">Ask Price</div>
          </div>
        </div></body></html>"#;

    struct FixedTransport;

    #[async_trait]
    impl Transport for FixedTransport {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
            if request.url.contains("exportersindia.com") {
                Ok(FetchResponse {
                    url: request.url.clone(),
                    status: 200,
                    body: EXPORTERS_PAGE.to_string(),
                })
            } else {
                Err(FetchError::HttpStatus(403))
            }
        }
    }

    fn pipeline(synthetic_fallback: bool) -> Pipeline {
        let settings = PipelineSettings {
            fetch: FetchPolicyConfig {
                min_delay_ms: 0,
                max_delay_ms: 0,
                backoff_base_ms: 0,
                ..FetchPolicyConfig::default()
            },
            orchestrator: OrchestratorConfig {
                synthetic_fallback,
                ..OrchestratorConfig::default()
            },
            ..PipelineSettings::default()
        };
        Pipeline::from_settings(&settings, Arc::new(FixedTransport)).unwrap()
    }

    fn request(sources: &[&str]) -> ScrapeRequest {
        ScrapeRequest {
            sources: sources.iter().map(|s| s.to_string()).collect(),
            categories: vec!["safety equipment".to_string()],
            target_per_category: 10,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_dedups_and_scores() {
        let pipeline = pipeline(false);
        let output = pipeline
            .run(&request(&["exportersindia"]), &CancellationToken::new())
            .await
            .unwrap();

        let records = &output.dataset.records;
        assert_eq!(records.len(), 2);
        assert_eq!(output.dataset.summary.duplicates_removed, 1);

        let helmet = &records[0];
        assert_eq!(helmet.record.title, "ISI Marked Industrial Safety Helmet");
        assert_eq!(helmet.record.company.as_deref(), Some("Sai Safety Suppliers"));
        assert_eq!(helmet.score, 100);
        assert_eq!(
            helmet.record.listing_url.as_deref(),
            Some("https://www.exportersindia.com/product/helmet-1.htm")
        );

        let gloves = &records[1];
        assert!(gloves.has_deduction(DeductionKind::ShortTitle));
        assert!(gloves.has_deduction(DeductionKind::MissingPrice));
        assert!(gloves.score <= 55);

        assert_eq!(output.report.status, RunStatus::Completed);
        assert_eq!(pipeline.progress().records_collected(), 3);
    }

    #[tokio::test]
    async fn test_blocked_source_is_reported_and_backfilled() {
        let output = pipeline(true)
            .run(&request(&["alibaba", "exportersindia"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.report.synthetic_sources(), vec![SourceId::Alibaba]);
        assert_eq!(output.report.sources[&SourceId::Alibaba].pairs_failed, 1);

        let summary = &output.dataset.summary;
        assert_eq!(summary.per_source[&SourceId::ExportersIndia], 2);
        assert!(summary.synthetic_records > 0);
        assert!(output
            .dataset
            .records
            .iter()
            .filter(|r| r.record.source == SourceId::Alibaba)
            .all(|r| r.record.provenance == Provenance::Synthetic));
        assert!(output
            .dataset
            .records
            .iter()
            .all(|r| r.record.category == CategoryId::SafetyEquipment));
    }

    #[tokio::test]
    async fn test_configuration_error_surfaces() {
        let result = pipeline(true)
            .run(&request(&["indiamart"]), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ConfigurationError::UnknownSource(_))));
    }
}
