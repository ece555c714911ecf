use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::config::{OutputConfig, OutputFormat};
use crate::models::{Provenance, RunReport, ScoredRecord};
use crate::processor::dataset_assembler::{AssembledDataset, DatasetSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub dataset: PathBuf,
    pub report: PathBuf,
}

#[derive(Serialize)]
struct ReportFile<'a> {
    run: &'a RunReport,
    summary: &'a DatasetSummary,
}

/// Writes one row per scored record plus a JSON run report next to it.
pub struct DatasetWriter {
    config: OutputConfig,
}

impl DatasetWriter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// `<dir>/<prefix>_<YYYYmmdd_HHMMSS>_<run id prefix>`, shared by both files.
    pub fn generate_stem(&self, started_at: DateTime<Utc>, run_id: Uuid) -> PathBuf {
        let run = run_id.simple().to_string();
        Path::new(&self.config.dir).join(format!(
            "{}_{}_{}",
            self.config.file_prefix,
            started_at.format("%Y%m%d_%H%M%S"),
            &run[..8]
        ))
    }

    pub fn write(&self, dataset: &AssembledDataset, report: &RunReport) -> Result<WrittenFiles> {
        fs::create_dir_all(&self.config.dir)
            .with_context(|| format!("Failed to create output directory: {}", self.config.dir))?;

        let stem = self.generate_stem(report.started_at, report.run_id);
        let dataset_path = stem.with_extension(self.config.format.extension());
        let report_path = PathBuf::from(format!("{}_report.json", stem.display()));

        let mut df = to_dataframe(&dataset.records)?;
        let mut file = File::create(&dataset_path)
            .with_context(|| format!("Failed to create {}", dataset_path.display()))?;
        match self.config.format {
            OutputFormat::Csv => {
                CsvWriter::new(&mut file).finish(&mut df)?;
            }
            OutputFormat::Parquet => {
                ParquetWriter::new(&mut file).finish(&mut df)?;
            }
        }
        info!("💾 Wrote {} rows to {}", df.height(), dataset_path.display());

        let report_json = serde_json::to_string_pretty(&ReportFile {
            run: report,
            summary: &dataset.summary,
        })?;
        fs::write(&report_path, report_json)
            .with_context(|| format!("Failed to write {}", report_path.display()))?;
        info!("💾 Wrote run report to {}", report_path.display());

        Ok(WrittenFiles {
            dataset: dataset_path,
            report: report_path,
        })
    }
}

/// One column per canonical field plus the score and its deductions.
pub fn to_dataframe(records: &[ScoredRecord]) -> Result<DataFrame> {
    let mut source = Vec::with_capacity(records.len());
    let mut category = Vec::with_capacity(records.len());
    let mut title = Vec::with_capacity(records.len());
    let mut company = Vec::with_capacity(records.len());
    let mut price = Vec::with_capacity(records.len());
    let mut currency = Vec::with_capacity(records.len());
    let mut city = Vec::with_capacity(records.len());
    let mut state = Vec::with_capacity(records.len());
    let mut keywords = Vec::with_capacity(records.len());
    let mut rating = Vec::with_capacity(records.len());
    let mut listing_url = Vec::with_capacity(records.len());
    let mut synthetic = Vec::with_capacity(records.len());
    let mut fields_present = Vec::with_capacity(records.len());
    let mut quality_score = Vec::with_capacity(records.len());
    let mut deductions = Vec::with_capacity(records.len());

    for scored in records {
        let record = &scored.record;
        source.push(record.source.as_str().to_string());
        category.push(record.category.query().to_string());
        title.push(record.title.clone());
        company.push(record.company.clone());
        price.push(record.price.and_then(|p| p.amount.to_f64()));
        currency.push(record.price.map(|p| p.currency.code().to_string()));
        city.push(record.location.city.clone());
        state.push(record.location.state.name().to_string());
        keywords.push(record.keywords.iter().cloned().collect::<Vec<_>>().join(";"));
        rating.push(record.rating);
        listing_url.push(record.listing_url.clone());
        synthetic.push(record.provenance == Provenance::Synthetic);
        fields_present.push(record.presence.count() as u32);
        quality_score.push(u32::from(scored.score));
        deductions.push(
            scored
                .deductions
                .iter()
                .map(|d| format!("{:?}(-{})", d.kind, d.points))
                .collect::<Vec<_>>()
                .join(";"),
        );
    }

    let columns: Vec<Column> = vec![
        Series::new("source".into(), source).into(),
        Series::new("category".into(), category).into(),
        Series::new("title".into(), title).into(),
        Series::new("company".into(), company).into(),
        Series::new("price".into(), price).into(),
        Series::new("currency".into(), currency).into(),
        Series::new("city".into(), city).into(),
        Series::new("state".into(), state).into(),
        Series::new("keywords".into(), keywords).into(),
        Series::new("rating".into(), rating).into(),
        Series::new("listing_url".into(), listing_url).into(),
        Series::new("synthetic".into(), synthetic).into(),
        Series::new("fields_present".into(), fields_present).into(),
        Series::new("quality_score".into(), quality_score).into(),
        Series::new("deductions".into(), deductions).into(),
    ];

    DataFrame::new(columns).context("Failed to build dataset DataFrame")
}
