use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xstitch::catalog::Catalog;
use xstitch::pipeline::{self, PatternSettings};

#[derive(Parser)]
#[command(name = "xstitch", version)]
#[command(about = "Turn a photo into a DMC cross-stitch chart, template and color key")]
struct Cli {
    /// Source image
    input: PathBuf,

    /// Directory for downscaled.png, cross-stitch.png, template.png and key.txt
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// JSON settings file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of distinct threads (1-256)
    #[arg(short, long)]
    colors: Option<usize>,

    /// Stitch grid width in cells
    #[arg(short, long)]
    width: Option<u32>,

    /// Chart pixels per cell
    #[arg(long)]
    upscale: Option<u32>,

    /// Highest quantization level the color search may try
    #[arg(long)]
    max_levels: Option<usize>,

    /// Thread catalog in code/name/hex line format (default: built-in DMC list)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Fail if the requested color count cannot be reached
    #[arg(long)]
    strict: bool,

    /// Print the color table to stdout
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xstitch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let settings = build_settings(&cli)?;

    let owned;
    let catalog: &Catalog = match &cli.catalog {
        Some(path) => {
            owned = Catalog::from_file(path)?;
            &owned
        }
        None => Catalog::builtin()?,
    };
    tracing::info!(entries = catalog.len(), "catalog loaded");

    let source = pipeline::load_image(&cli.input)?;
    let mut pattern = pipeline::generate(&source, &settings, catalog)
        .with_context(|| format!("failed to build pattern from {}", cli.input.display()))?;
    if cli.strict {
        pattern = pattern.into_converged().context("--strict is set, nothing written")?;
    }

    if cli.verbose {
        print!("{}", pipeline::summary(&pattern));
    }

    let report = pipeline::write_outputs(&pattern, &settings, &cli.output)
        .with_context(|| format!("failed to write pattern to {}", cli.output.display()))?;

    println!("Downscaled image written to {}", report.outputs.downscaled.display());
    println!("Cross-stitch written to {}", report.outputs.chart.display());
    println!("Template written to {}", report.outputs.template.display());
    println!("Key written to {}", report.outputs.key.display());

    Ok(())
}

fn build_settings(cli: &Cli) -> anyhow::Result<PatternSettings> {
    let mut settings = match &cli.config {
        Some(path) => PatternSettings::from_json_file(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?,
        None => PatternSettings::default(),
    };
    if let Some(v) = cli.colors { settings.colors = v; }
    if let Some(v) = cli.width { settings.target_width = v; }
    if let Some(v) = cli.upscale { settings.upscale_factor = v; }
    if let Some(v) = cli.max_levels { settings.max_quantization_levels = Some(v); }
    settings.validate()?;
    Ok(settings)
}
