//! How much does a slow connection cost a miner? Sweeps the mean latency
//! between "Slow" and everyone else, keeping hash rates fixed.

use std::time::{Duration, Instant};

use anyhow::Result;
use uncle_sim::prelude::*;

const LATENCIES: [f64; 7] = [0.2, 5.0, 15.0, 30.0, 60.0, 105.0, 150.0];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .compact()
        .without_time()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();

    let start = Instant::now();

    for (i, mean) in LATENCIES.into_iter().enumerate() {
        let slow_link = FloatDistribution::normal(mean, mean / 7.0)?;
        let simulation = SimulationBuilder::new()
            .add_miner("Alice", 30e6)
            .add_miner("Bob", 20e6)
            .add_miner("Charlie", 5e6)
            .add_miner("Slow", 30e6)
            .latency("Alice", "Bob", FloatDistribution::constant(0.1))
            .latency("Alice", "Slow", slow_link)
            .latency("Bob", "Slow", slow_link)
            .latency("Charlie", "Slow", slow_link)
            .run_for(Duration::from_secs(6 * 3600))
            .no_snapshots()
            .repeat_all(16)
            .seed(i as u64)
            .build()?;

        let results = simulation
            .run_all()?
            .average(Average::Mean)
            .constant("Slow Latency", mean)
            .balances()
            .uncles()
            .uncle_rate()
            .stale_blocks()
            .format(Format::CSV)
            .build()
            .to_string();

        // Only print the header once
        let skip = usize::from(i > 0);
        for line in results.lines().skip(skip) {
            println!("{line}");
        }
    }

    eprintln!("elapsed time: {:.4} secs", start.elapsed().as_secs_f64());
    Ok(())
}
