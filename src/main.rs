mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chunkforge_world::{
    steps::default_steps, ChunkGenerator, FractalNoise, GeneratorConfig, NoiseConfig,
    TokioScheduler,
};
use clap::Parser;
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::report::RunReport;

const DEFAULT_CONFIG_PATH: &str = "config/generator.toml";

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate voxel chunks around the world origin")]
struct Args {
    /// Generator configuration (TOML); missing files fall back to defaults
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the world seed from the config file
    #[arg(long)]
    seed: Option<i32>,

    /// Override the initial chunk radius from the config file
    #[arg(long)]
    radius: Option<i32>,

    /// Remove a step from the default pipeline (repeatable)
    #[arg(long = "skip-step", value_name = "NAME")]
    skip_steps: Vec<String>,

    /// Write the effective configuration to this path before generating
    #[arg(long, value_name = "PATH")]
    save_config: Option<PathBuf>,

    /// Print the run report as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!("Starting chunkforge v{}", env!("CARGO_PKG_VERSION"));

    let mut config = GeneratorConfig::load_from_path(&args.config);
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(radius) = args.radius {
        config.initial_radius = radius;
    }
    if let Some(path) = &args.save_config {
        config.save_to_path(path)?;
        info!("Wrote effective config to {}", path.display());
    }

    let scheduler = Arc::new(TokioScheduler::new(Handle::current()));
    let noise = Arc::new(FractalNoise::new(NoiseConfig::unscaled(4)));
    let generator = ChunkGenerator::new(&config, noise, scheduler);
    for step in default_steps(&config.terrain) {
        generator.add_generator_step(step);
    }
    for name in &args.skip_steps {
        if !generator.remove_generator_step(name) {
            warn!(step = %name, "no such step in the pipeline");
        }
    }

    let started = Instant::now();
    let generated = generator
        .generate_initial_chunks()
        .await
        .context("initial chunk generation failed")?;
    let report = RunReport::collect(&generator, config.initial_radius, started.elapsed());
    info!(
        chunks = generated,
        elapsed_ms = report.elapsed_ms,
        "initial chunks ready"
    );

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{report}");
    }

    generator.cache().dispose();
    Ok(())
}
