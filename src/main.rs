use std::fs;
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use voxcell::{AcuteLegend, Simulation, SimulationConfig};

mod cli;

use cli::{Cli, Commands, OutputFormat, RunArgs};

fn run(args: &RunArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;
    let mut sim = Simulation::from_config(&config)?;

    let mut frames = Vec::with_capacity(config.frames as usize);
    for _ in 0..config.frames {
        frames.push(sim.step_frame(config.dt, &config.physics)?);
    }

    if let Some(path) = &args.stats {
        write_json(path, &frames)?;
    }
    let snapshot = sim.generator_snapshot();
    if let Some(path) = &args.snapshot {
        write_json(path, &snapshot)?;
    }

    let legend = AcuteLegend::default();
    let histogram = legend
        .labels()
        .iter()
        .zip(legend.histogram(&snapshot))
        .map(|(label, count)| format!("{label}:{count}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "Ran {} frames at {}^3 with {} generators: {} junctions, acute counts [{}]",
        sim.frame(),
        sim.resolution(),
        sim.generator_count(),
        sim.junctions().len(),
        histogram
    );
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn print_config(format: OutputFormat) -> anyhow::Result<()> {
    let config = SimulationConfig::default();
    let text = match format {
        OutputFormat::Yaml => config.to_yaml()?,
        OutputFormat::Json => config.to_json()?,
    };
    println!("{}", text.trim_end());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(&args),
        Commands::Config { format } => print_config(format),
    }
}
