use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::source_config::SourceConfig;
use crate::error::ConfigurationError;
use crate::fetcher::{FetchPolicyConfig, OrchestratorConfig, ScrapeRequest};
use crate::models::{CategoryId, SourceId};
use crate::processor::quality_scorer::ScoringPolicy;
use crate::processor::source_adapter::SourceAdapter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub format: OutputFormat,
    pub file_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "data".to_string(),
            format: OutputFormat::Csv,
            file_prefix: "b2b_products".to_string(),
        }
    }
}

/// Everything a run needs. Layered as defaults, then an optional TOML file,
/// then `B2B__`-prefixed environment variables (`B2B__FETCH__MAX_ATTEMPTS=2`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub sources: Vec<String>,
    pub categories: Vec<String>,
    pub target_per_category: usize,
    pub fetch: FetchPolicyConfig,
    pub orchestrator: OrchestratorConfig,
    pub scoring: ScoringPolicy,
    pub output: OutputConfig,
    /// Directory of per-source adapter TOML files replacing the built-ins.
    pub adapter_dir: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sources: SourceId::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            categories: CategoryId::ALL.iter().map(|c| c.query().to_string()).collect(),
            target_per_category: 30,
            fetch: FetchPolicyConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            scoring: ScoringPolicy::default(),
            output: OutputConfig::default(),
            adapter_dir: None,
        }
    }
}

impl PipelineSettings {
    pub fn load(path: &str) -> Result<Self, ConfigurationError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("B2B")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("sources")
                    .with_list_parse_key("categories"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn scrape_request(&self) -> ScrapeRequest {
        ScrapeRequest {
            sources: self.sources.clone(),
            categories: self.categories.clone(),
            target_per_category: self.target_per_category,
        }
    }

    /// Compiles every `*.toml` override in `adapter_dir`, in file name order.
    pub fn load_adapters(&self) -> Result<Vec<SourceAdapter>, ConfigurationError> {
        let Some(dir) = self.adapter_dir.as_deref() else {
            return Ok(Vec::new());
        };

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| ConfigurationError::AdapterOverride {
                path: dir.to_string(),
                cause: e.into(),
            })?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        paths.iter().map(|path| load_adapter(path)).collect()
    }
}

fn load_adapter(path: &Path) -> Result<SourceAdapter, ConfigurationError> {
    let path_display = path.display().to_string();
    let config = SourceConfig::from_file(&path_display).map_err(|cause| ConfigurationError::AdapterOverride {
        path: path_display.clone(),
        cause,
    })?;
    let adapter = SourceAdapter::from_config(&config)?;

    info!("Loaded {} adapter override from {}", adapter.source(), path_display);
    Ok(adapter)
}
