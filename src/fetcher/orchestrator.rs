use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ConfigurationError;
use crate::fetcher::fetch_policy::{FetchPolicy, FetchPolicyConfig};
use crate::fetcher::synthetic::{SampleGenerator, TemplateSampleGenerator};
use crate::fetcher::transport::{FetchRequest, Transport};
use crate::models::{
    CategoryId, FetchAttempt, FetchOutcome, RawRecord, RecoverableError, RecoverableErrorKind,
    RunReport, SourceId, SourceTally,
};
use crate::processor::source_adapter::{PageRequest, PageShape, SourceAdapter};

/// Run-level scraping settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_pages_per_pair: u32,
    pub parallel_sources: bool,
    pub synthetic_fallback: bool,
    pub synthetic_seed: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_pages_per_pair: 5,
            parallel_sources: false,
            synthetic_fallback: true,
            synthetic_seed: 42,
        }
    }
}

/// What the caller asks for, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub sources: Vec<String>,
    pub categories: Vec<String>,
    pub target_per_category: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub sources: Vec<SourceId>,
    pub categories: Vec<CategoryId>,
    pub target_per_category: usize,
}

impl ScrapeRequest {
    /// Resolves identifiers, dropping repeats but keeping first-seen order.
    pub fn validate(&self) -> Result<ValidatedRequest, ConfigurationError> {
        if self.sources.is_empty() {
            return Err(ConfigurationError::MalformedRequest("no sources requested".to_string()));
        }
        if self.categories.is_empty() {
            return Err(ConfigurationError::MalformedRequest(
                "no categories requested".to_string(),
            ));
        }
        if self.target_per_category == 0 {
            return Err(ConfigurationError::MalformedRequest(
                "target_per_category must be at least 1".to_string(),
            ));
        }

        let mut sources = Vec::new();
        for name in &self.sources {
            let source: SourceId = name.parse()?;
            if !sources.contains(&source) {
                sources.push(source);
            }
        }

        let mut categories = Vec::new();
        for name in &self.categories {
            let category: CategoryId = name.parse()?;
            if !categories.contains(&category) {
                categories.push(category);
            }
        }

        Ok(ValidatedRequest {
            sources,
            categories,
            target_per_category: self.target_per_category,
        })
    }
}

/// Pollable count of records collected so far in the current run.
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle(Arc<AtomicUsize>);

impl ProgressHandle {
    pub fn records_collected(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, count: usize) {
        self.0.fetch_add(count, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeOutput {
    pub records: Vec<RawRecord>,
    pub report: RunReport,
}

/// Per-source accumulator. Each source task owns one; they are merged into
/// the run report only after every task has finished.
struct SourceRun {
    source: SourceId,
    records: Vec<RawRecord>,
    tally: SourceTally,
    errors: Vec<RecoverableError>,
}

impl SourceRun {
    fn new(source: SourceId) -> Self {
        Self {
            source,
            records: Vec::new(),
            tally: SourceTally::default(),
            errors: Vec::new(),
        }
    }
}

enum PairOutcome {
    Completed,
    Failed(RecoverableError),
    Cancelled,
}

enum PageFetch {
    Page(PageShape),
    Failed {
        kind: RecoverableErrorKind,
        attempts: u32,
        last_outcome: FetchOutcome,
    },
    Cancelled,
}

pub struct ScrapeOrchestrator {
    transport: Arc<dyn Transport>,
    adapters: BTreeMap<SourceId, SourceAdapter>,
    fetch_config: FetchPolicyConfig,
    config: OrchestratorConfig,
    generator: Arc<dyn SampleGenerator>,
    progress: ProgressHandle,
}

impl ScrapeOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        fetch_config: FetchPolicyConfig,
        config: OrchestratorConfig,
    ) -> Result<Self, ConfigurationError> {
        let mut adapters = BTreeMap::new();
        for source in SourceId::ALL {
            adapters.insert(source, SourceAdapter::builtin(source)?);
        }

        Ok(Self {
            transport,
            adapters,
            fetch_config,
            generator: Arc::new(TemplateSampleGenerator::new(config.synthetic_seed)),
            config,
            progress: ProgressHandle::default(),
        })
    }

    /// Replace the built-in adapter for the adapter's source.
    pub fn with_adapter(mut self, adapter: SourceAdapter) -> Self {
        self.adapters.insert(adapter.source(), adapter);
        self
    }

    pub fn with_sample_generator(mut self, generator: Arc<dyn SampleGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// Scrapes every requested (source, category) pair. Only a bad request
    /// is an error; page and pair failures end up in the report.
    pub async fn run(
        &self,
        request: &ScrapeRequest,
        cancel: &CancellationToken,
    ) -> Result<ScrapeOutput, ConfigurationError> {
        let request = request.validate()?;
        for source in &request.sources {
            if !self.adapters.contains_key(source) {
                return Err(ConfigurationError::UnknownSource(source.to_string()));
            }
        }

        self.progress.reset();
        let mut report = RunReport::start();

        info!(
            "🚀 Scrape run {}: {} source(s) x {} categor(ies), target {} per pair",
            report.run_id,
            request.sources.len(),
            request.categories.len(),
            request.target_per_category
        );

        let runs = if self.config.parallel_sources {
            join_all(
                request
                    .sources
                    .iter()
                    .map(|source| self.scrape_source(*source, &request, cancel)),
            )
            .await
        } else {
            let mut runs = Vec::with_capacity(request.sources.len());
            for source in &request.sources {
                runs.push(self.scrape_source(*source, &request, cancel).await);
            }
            runs
        };

        let cancelled = cancel.is_cancelled();
        let mut records = Vec::new();

        for mut run in runs {
            if run.records.is_empty() && self.config.synthetic_fallback && !cancelled {
                let samples = self.synthetic_samples(run.source, &request);
                warn!(
                    "⚠️ {} produced no usable records, substituting {} synthetic samples",
                    run.source,
                    samples.len()
                );
                self.progress.add(samples.len());
                run.tally.synthetic = true;
                run.tally.synthetic_records = samples.len();
                run.records = samples;
            }

            records.append(&mut run.records);
            report.merge_source(run.source, run.tally, run.errors);
        }

        report.finish(cancelled);

        info!(
            "✅ Scrape run {} {:?} in {} ms: {} records, {} failed pair(s)",
            report.run_id,
            report.status,
            report.elapsed_ms,
            records.len(),
            report.pairs_failed()
        );

        Ok(ScrapeOutput { records, report })
    }

    fn synthetic_samples(&self, source: SourceId, request: &ValidatedRequest) -> Vec<RawRecord> {
        request
            .categories
            .iter()
            .flat_map(|category| {
                self.generator
                    .generate(source, *category, request.target_per_category)
            })
            .collect()
    }

    async fn scrape_source(
        &self,
        source: SourceId,
        request: &ValidatedRequest,
        cancel: &CancellationToken,
    ) -> SourceRun {
        let mut run = SourceRun::new(source);
        let Some(adapter) = self.adapters.get(&source) else {
            return run;
        };
        let policy = FetchPolicy::new(self.fetch_config.clone());

        info!("=== Scraping source: {} ===", source.display_name());

        for category in &request.categories {
            if cancel.is_cancelled() {
                run.tally.pairs_cancelled += 1;
                continue;
            }

            run.tally.pairs_attempted += 1;
            match self
                .scrape_pair(adapter, &policy, *category, request.target_per_category, cancel, &mut run)
                .await
            {
                PairOutcome::Completed => run.tally.pairs_succeeded += 1,
                PairOutcome::Failed(error) => {
                    warn!(
                        "❌ {} / {} failed after {} attempt(s): {:?} ({})",
                        source, category, error.attempts, error.kind, error.last_outcome
                    );
                    run.tally.pairs_failed += 1;
                    run.errors.push(error);
                }
                PairOutcome::Cancelled => {
                    info!("{} / {} cancelled", source, category);
                    run.tally.pairs_cancelled += 1;
                }
            }
        }

        run
    }

    async fn scrape_pair(
        &self,
        adapter: &SourceAdapter,
        policy: &FetchPolicy,
        category: CategoryId,
        target: usize,
        cancel: &CancellationToken,
        run: &mut SourceRun,
    ) -> PairOutcome {
        let mut seen = HashSet::new();
        let mut collected = 0;
        let mut pages = 0;
        let mut page_request = adapter.first_page_request(category);

        while collected < target && pages < self.config.max_pages_per_pair {
            if cancel.is_cancelled() {
                return PairOutcome::Cancelled;
            }

            let shape = match self.fetch_page(adapter, policy, &page_request, cancel, run).await {
                PageFetch::Page(shape) => shape,
                PageFetch::Cancelled => return PairOutcome::Cancelled,
                PageFetch::Failed {
                    kind,
                    attempts,
                    last_outcome,
                } => {
                    return PairOutcome::Failed(RecoverableError {
                        source: adapter.source(),
                        category,
                        page_url: page_request.url.clone(),
                        kind,
                        attempts,
                        last_outcome,
                    });
                }
            };
            pages += 1;
            run.tally.pages_fetched += 1;

            let harvest = adapter.harvest_fragments(&shape.listings, category, &page_request.url);
            run.tally.corrupt_fragments += harvest.corrupt_fragments;

            let mut new_records = 0;
            for record in harvest.records {
                if collected >= target {
                    break;
                }
                if seen.insert(record.fields.clone()) {
                    run.records.push(record);
                    collected += 1;
                    new_records += 1;
                }
            }

            run.tally.records_collected += new_records;
            self.progress.add(new_records);

            info!(
                "Found {} new listings on page {} for {} / {} ({} of {})",
                new_records,
                page_request.page_index + 1,
                adapter.source(),
                category,
                collected,
                target
            );

            if new_records == 0 {
                break;
            }

            match adapter.next_page_request(&shape, &page_request) {
                Some(next) => page_request = next,
                None => break,
            }
        }

        PairOutcome::Completed
    }

    /// Fetches one page under the policy, retrying transient failures.
    async fn fetch_page(
        &self,
        adapter: &SourceAdapter,
        policy: &FetchPolicy,
        page_request: &PageRequest,
        cancel: &CancellationToken,
        run: &mut SourceRun,
    ) -> PageFetch {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let delay = policy.next_delay(attempt);

            tokio::select! {
                _ = cancel.cancelled() => return PageFetch::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }

            let user_agent = policy.next_user_agent();
            let request = FetchRequest {
                url: page_request.url.clone(),
                headers: adapter.headers_with(&user_agent),
                timeout: policy.request_timeout(),
            };

            let result = self.transport.fetch(&request).await;
            run.tally.fetch_attempts += 1;
            let (outcome, shape) = policy.inspect(&result, adapter);

            let record = FetchAttempt {
                url: request.url,
                attempt,
                outcome,
                delay_ms: delay.as_millis() as u64,
                user_agent,
            };
            debug!(
                "{} attempt {} for {} after {} ms: {}",
                adapter.source(),
                record.attempt,
                record.url,
                record.delay_ms,
                record.outcome
            );

            match (outcome, shape) {
                (FetchOutcome::Success, Some(shape)) => return PageFetch::Page(shape),
                (FetchOutcome::Blocked, _) => {
                    return PageFetch::Failed {
                        kind: RecoverableErrorKind::PageBlocked,
                        attempts: attempt,
                        last_outcome: outcome,
                    };
                }
                (outcome, _) if policy.should_retry(outcome, attempt) => {
                    warn!(
                        "Attempt {} failed for {} ({}), retrying",
                        attempt, record.url, outcome
                    );
                }
                (outcome, _) => {
                    return PageFetch::Failed {
                        kind: RecoverableErrorKind::RetriesExhausted,
                        attempts: attempt,
                        last_outcome: outcome,
                    };
                }
            }
        }
    }
}
