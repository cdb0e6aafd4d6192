//! The `score` command.

use std::path::{Path, PathBuf};

use risk_map_export::ExportFormat;
use risk_map_ingest::IngestOptions;
use risk_map_risk::config::{RiskConfig, load_config};
use risk_map_risk::summary::ScoreSummary;
use risk_map_risk::{RiskError, RiskResult, parse_method};

#[derive(clap::Args)]
pub struct ScoreArgs {
    /// Input area table (`.csv`, `.geojson` or `.json`)
    #[arg(long)]
    input: PathBuf,
    /// TOML scoring config; built-in defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Column or property holding the zip code
    #[arg(long, default_value = "zip_code")]
    zip_field: String,
    /// Normalization method (`min_max` or `z_score`), overrides the config
    #[arg(long)]
    method: Option<String>,
    /// Minimum score for the high-risk list, overrides the config
    #[arg(long)]
    threshold: Option<f64>,
    /// List the N highest-scoring areas instead of applying the threshold
    #[arg(long)]
    top: Option<usize>,
    /// Write the scored table to this file
    #[arg(long)]
    output: Option<PathBuf>,
    /// Output format (`csv` or `geojson`); guessed from the output
    /// extension when omitted
    #[arg(long)]
    format: Option<String>,
}

pub fn run(args: &ScoreArgs) -> Result<(), Box<dyn std::error::Error>> {
    let base = match &args.config {
        Some(path) => {
            log::info!("Loading scoring config from {}", path.display());
            load_config(path)?
        }
        None => {
            log::info!("Using built-in scoring config");
            RiskConfig::default()
        }
    };
    let config = apply_overrides(base, args)?;

    let output = match &args.output {
        Some(path) => Some((path.as_path(), output_format(path, args.format.as_deref())?)),
        None => None,
    };

    let options = IngestOptions {
        zip_code_field: args.zip_field.clone(),
    };
    let areas = risk_map_ingest::load(&args.input, &options)?;

    let mut engine = config.engine().with_areas(areas);
    let results = engine.calculate_risk_scores(&config.fields)?;
    log::info!(
        "Scored {} areas with {} normalization",
        results.len(),
        config.normalization
    );

    if let Some(summary) = ScoreSummary::from_results(results) {
        println!("Risk score summary:");
        println!("{summary}");
    }

    let high_risk = engine.get_high_risk_areas(&config.query)?;
    match config.query.top_n {
        Some(n) => println!("Top {n} highest-risk areas:"),
        None => println!(
            "{} areas with risk score >= {}:",
            high_risk.len(),
            config.query.threshold
        ),
    }
    print_areas(&high_risk);

    if let Some((path, format)) = output {
        risk_map_export::export(&engine, path, format)?;
    }

    Ok(())
}

fn apply_overrides(mut config: RiskConfig, args: &ScoreArgs) -> Result<RiskConfig, RiskError> {
    if let Some(method) = &args.method {
        config.normalization = parse_method(method)?;
    }
    if let Some(threshold) = args.threshold {
        config.query.threshold = threshold;
        config.query.top_n = None;
    }
    if let Some(top) = args.top {
        config.query.top_n = Some(top);
    }
    Ok(config)
}

fn output_format(path: &Path, format: Option<&str>) -> Result<ExportFormat, RiskError> {
    match format {
        Some(name) => ExportFormat::parse_named(name),
        None => Ok(ExportFormat::from_path(path).unwrap_or(ExportFormat::Csv)),
    }
}

fn print_areas(areas: &[&RiskResult]) {
    if areas.is_empty() {
        println!("  (none)");
        return;
    }

    println!("  {:<8} {:>10}  {}", "zip_code", "risk_score", "risk_category");
    for area in areas {
        println!(
            "  {:<8} {:>10.4}  {}",
            area.zip_code.as_str(),
            area.risk_score,
            area.risk_category
        );
    }
}
