use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

use voxcell::{PhysicsMode, SimulationConfig};

/// Discrete 3D Voronoi growth simulation.
#[derive(Parser, Debug)]
#[command(name = "voxcell")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a headless simulation and report per-frame statistics
    Run(RunArgs),
    /// Print the default configuration
    Config {
        /// Output format
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: OutputFormat,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file (.yaml, .yml or .json); flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Voxels per axis
    #[arg(short, long)]
    pub resolution: Option<u32>,

    /// Number of generators
    #[arg(short, long)]
    pub generators: Option<u32>,

    /// Frames to simulate
    #[arg(short, long)]
    pub frames: Option<u32>,

    /// RNG seed for generator placement
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Physics mode (balanced, growth-only, shrink-only, inverse)
    #[arg(short, long)]
    pub mode: Option<PhysicsMode>,

    /// Acute-count threshold
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// Write per-frame statistics as a JSON array
    #[arg(long)]
    pub stats: Option<PathBuf>,

    /// Write the final generator snapshot as JSON
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

impl RunArgs {
    /// Load the config file, if any, and apply flag overrides
    pub fn resolve(&self) -> anyhow::Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => SimulationConfig::default(),
        };

        if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }
        if let Some(generators) = self.generators {
            config.generator_count = generators;
        }
        if let Some(frames) = self.frames {
            config.frames = frames;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(mode) = self.mode {
            config.physics.mode = mode;
        }
        if let Some(threshold) = self.threshold {
            config.physics.threshold = threshold;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_with_defaults() {
        let cli = Cli::try_parse_from(["voxcell", "run"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert!(args.config.is_none());
                assert!(args.stats.is_none());
                let config = args.resolve().unwrap();
                assert_eq!(config, SimulationConfig::default());
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn cli_parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "voxcell",
            "run",
            "--resolution",
            "16",
            "--generators",
            "5",
            "--frames",
            "3",
            "--seed",
            "11",
            "--mode",
            "growth-only",
            "--threshold",
            "2.5",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("Expected Run command");
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.resolution, 16);
        assert_eq!(config.generator_count, 5);
        assert_eq!(config.frames, 3);
        assert_eq!(config.seed, Some(11));
        assert_eq!(config.physics.mode, PhysicsMode::GrowthOnly);
        assert_eq!(config.physics.threshold, 2.5);
    }

    #[test]
    fn cli_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["voxcell", "run", "--mode", "sideways"]).is_err());
    }

    #[test]
    fn resolve_rejects_invalid_resolution() {
        let cli = Cli::try_parse_from(["voxcell", "run", "--resolution", "1"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("Expected Run command");
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn cli_parses_config_subcommand() {
        let cli = Cli::try_parse_from(["voxcell", "config", "--format", "json"]).unwrap();
        match cli.command {
            Commands::Config { format } => assert_eq!(format, OutputFormat::Json),
            _ => panic!("Expected Config command"),
        }

        let cli = Cli::try_parse_from(["voxcell", "config"]).unwrap();
        match cli.command {
            Commands::Config { format } => assert_eq!(format, OutputFormat::Yaml),
            _ => panic!("Expected Config command"),
        }
    }
}
