use anyhow::{Context, Result};
use b2b_pipeline::config::PipelineSettings;
use b2b_pipeline::fetcher::HttpTransport;
use b2b_pipeline::models::RunStatus;
use b2b_pipeline::pipeline::Pipeline;
use b2b_pipeline::storage::DatasetWriter;
use std::env;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let settings_path = env::args().nth(1).unwrap_or_else(|| "pipeline.toml".to_string());
    let settings = PipelineSettings::load(&settings_path)
        .with_context(|| format!("Failed to load pipeline settings from {}", settings_path))?;

    info!("🚀 Starting B2B marketplace pipeline");
    info!(
        "Sources: {:?}, categories: {:?}, target {} per category",
        settings.sources, settings.categories, settings.target_per_category
    );

    let transport = HttpTransport::new().context("Failed to build HTTP client")?;
    let pipeline = Pipeline::from_settings(&settings, Arc::new(transport))
        .context("Failed to build pipeline")?;

    let cancel = CancellationToken::new();
    let listener = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ Interrupt received, stopping after the current page");
            listener.cancel();
        }
    });

    let output = pipeline
        .run(&settings.scrape_request(), &cancel)
        .await
        .context("Scrape request rejected")?;

    let writer = DatasetWriter::new(settings.output.clone());
    let files = writer
        .write(&output.dataset, &output.report)
        .context("Failed to write dataset")?;

    let summary = &output.dataset.summary;
    info!("\n=== Pipeline Summary ({:?}) ===", output.report.status);
    info!(
        "📊 {} records ({} synthetic, {} duplicates removed), mean score {:.1}",
        summary.total_records, summary.synthetic_records, summary.duplicates_removed, summary.mean_score
    );
    for (source, count) in &summary.per_source {
        info!("  {}: {} records", source.display_name(), count);
    }
    for failure in &output.report.errors {
        error!(
            "❌ {} / {}: {:?} after {} attempt(s) at {}",
            failure.source, failure.category, failure.kind, failure.attempts, failure.page_url
        );
    }
    let synthetic = output.report.synthetic_sources();
    if !synthetic.is_empty() {
        warn!("⚠️ Synthetic samples used for: {:?}", synthetic);
    }
    info!("💾 Dataset: {}", files.dataset.display());
    info!("💾 Report: {}", files.report.display());

    match output.report.status {
        RunStatus::Cancelled => warn!("⚠️ Run cancelled, partial dataset written"),
        _ => info!("🎉 Pipeline completed"),
    }

    Ok(())
}
