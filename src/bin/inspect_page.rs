use anyhow::{Context, Result};
use b2b_pipeline::config::PipelineSettings;
use b2b_pipeline::models::{CategoryId, SourceId};
use b2b_pipeline::processor::{DatasetAssembler, QualityScorer, RuleNormalizer, SourceAdapter};
use std::env;
use std::fs;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        println!("Usage: cargo run --bin inspect_page <source> <category> <saved page.html>");
        println!("Available sources: tradeindia, alibaba, dhgate, exportersindia");
        return Ok(());
    }

    let source: SourceId = args[1].parse()?;
    let category: CategoryId = args[2].parse()?;
    let body = fs::read_to_string(&args[3])
        .with_context(|| format!("Failed to read saved page {}", args[3]))?;

    let settings = PipelineSettings::load("pipeline.toml")?;
    let adapter = match settings
        .load_adapters()?
        .into_iter()
        .find(|adapter| adapter.source() == source)
    {
        Some(adapter) => adapter,
        None => SourceAdapter::builtin(source)?,
    };

    println!("=== INSPECTING {} / {} ===\n", source.display_name(), category);

    let shape = adapter.page_shape(&body);
    println!("Page marker present: {}", shape.has_marker);
    println!("Listing fragments: {}", shape.listings.len());

    let page_url = adapter.first_page_request(category).url;
    let harvest = adapter.harvest_fragments(&shape.listings, category, &page_url);
    println!(
        "Extracted {} raw records ({} fragments without usable fields)\n",
        harvest.records.len(),
        harvest.corrupt_fragments
    );

    let canonical = RuleNormalizer::new().normalize_all(&harvest.records);
    let scored = QualityScorer::new(settings.scoring.clone()).score_all(canonical);
    let dataset = DatasetAssembler::new(settings.scoring.usd_to_inr).assemble(scored);

    println!("{}", serde_json::to_string_pretty(&dataset)?);

    Ok(())
}
