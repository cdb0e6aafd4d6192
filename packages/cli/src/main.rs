#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for zip code risk scoring.

mod score;

use std::io::BufWriter;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "risk_map", about = "Avian influenza risk scoring for zip code areas")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every area in an input file and list the highest-risk areas
    Score(score::ScoreArgs),
    /// Write a synthetic area table for trying the pipeline
    Sample {
        /// Number of zip code areas to generate
        #[arg(long, default_value = "50")]
        count: usize,
        /// Random seed; the same seed always produces the same table
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Output CSV path
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Score(args) => score::run(&args)?,
        Commands::Sample {
            count,
            seed,
            output,
        } => {
            let table = risk_map_ingest::sample_areas(count, seed)?;
            let file = BufWriter::new(std::fs::File::create(&output)?);
            let written = risk_map_export::write_area_csv(&table, file)?;
            println!("Wrote {written} sample areas to {}", output.display());
        }
    }

    Ok(())
}
