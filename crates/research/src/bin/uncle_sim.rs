use std::{fs, path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt, EnvFilter};
use uncle_sim::prelude::*;

const DEFAULT_CONFIG: &str = include_str!("../../config.default.toml");

/// Run a mining simulation described by a TOML config file.
#[derive(Parser)]
struct Args {
    /// Config file to read. The four-miner scenario is used if not given.
    config: Option<PathBuf>,
    #[clap(short, long)]
    ticks: Option<u64>,
    #[clap(short, long)]
    seed: Option<u64>,
    #[clap(short, long)]
    repeat: Option<usize>,
    #[clap(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,
    #[clap(short, long, value_enum, default_value_t = AverageArg::None)]
    average: AverageArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Pretty,
}

impl From<OutputFormat> for Format {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Csv => Format::CSV,
            OutputFormat::Pretty => Format::PrettyPrint,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AverageArg {
    None,
    Mean,
    Median,
    Max,
    Min,
}

impl From<AverageArg> for Average {
    fn from(value: AverageArg) -> Self {
        match value {
            AverageArg::None => Average::None,
            AverageArg::Mean => Average::Mean,
            AverageArg::Median => Average::Median,
            AverageArg::Max => Average::Max,
            AverageArg::Min => Average::Min,
        }
    }
}

fn read_config(args: &Args) -> Result<RawConfig> {
    let mut raw_config: RawConfig = match &args.config {
        Some(path) => {
            let file = fs::read_to_string(path)
                .with_context(|| format!("could not read {}", path.display()))?;
            toml::from_str(&file)?
        }
        None => toml::from_str(DEFAULT_CONFIG)?,
    };
    if let Some(ticks) = args.ticks {
        raw_config.ticks = Some(ticks);
    }
    if let Some(seed) = args.seed {
        raw_config.seed = Some(seed);
    }
    if let Some(repeat) = args.repeat {
        raw_config.repeat = Some(repeat);
    }

    Ok(raw_config)
}

fn main() -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry().with(fmt_layer).with(filter).init();

    let args = Args::parse();
    let start = Instant::now();

    let simulation = read_config(&args)?.into_builder()?.build()?;
    let results = simulation
        .run_all()?
        .average(args.average.into())
        .all()
        .format(args.format.into())
        .build();

    println!("{}", results);

    info!("elapsed time: {:.4} secs", start.elapsed().as_secs_f64());
    Ok(())
}
