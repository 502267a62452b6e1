use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dpi_config::DpiConfig;
use dpi_core::alloc::FreeListKind;
use dpi_engine::{run_stress, Pipeline, StressPlan};
use dpi_telemetry::Logger;
use tracing::{info, warn};

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the capture → inspect pipeline over synthetic traffic
    Run(RunArgs),
    /// Hammer a standalone pool with randomized acquire/release from many threads
    Stress(StressArgs),
    /// Print the effective configuration as YAML
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Configuration file; defaults to config/dpi.yaml plus DPI_* overrides
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Frames per capture worker
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub packets: Option<u64>,
    /// Slots in the pool
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub slots: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct StressArgs {
    #[arg(long, default_value_t = 8)]
    pub threads: usize,
    /// Acquire/release decisions per thread
    #[arg(long, default_value_t = 100_000)]
    pub iterations: usize,
    #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u32).range(1..))]
    pub slots: u32,
    #[arg(long, value_enum, default_value_t = Strategy::LockFree)]
    pub strategy: Strategy,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    LockFree,
    Locked,
}

impl From<Strategy> for FreeListKind {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::LockFree => FreeListKind::LockFree,
            Strategy::Locked => FreeListKind::Locked,
        }
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline(args),
        Commands::Stress(args) => stress(args),
        Commands::Config(args) => show_config(args),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<DpiConfig> {
    DpiConfig::load_optional(path.as_ref()).context("Failed to load configuration")
}

fn init_logging(config: &DpiConfig) -> anyhow::Result<()> {
    Logger::try_init(&config.telemetry.log_level)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize logging")
}

/// Applies `--packets`/`--slots` and re-validates, so overrides obey the same
/// bounds as the configuration files.
fn apply_overrides(mut config: DpiConfig, args: &RunArgs) -> anyhow::Result<DpiConfig> {
    if let Some(packets) = args.packets {
        config.pipeline.packets_per_worker = packets;
    }
    if let Some(slots) = args.slots {
        config.pool.slot_count = slots as usize;
    }
    config.validated().context("Invalid command-line override")
}

fn run_pipeline(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.clone())?;
    let config = apply_overrides(config, &args)?;
    init_logging(&config)?;

    let pipeline = Pipeline::from_config(&config)?;
    info!(
        slots = config.pool.slot_count,
        strategy = %config.pool.free_list,
        "Pool ready"
    );
    let report = pipeline.run_synthetic()?;
    print!("{}", serde_yaml::to_string(&report)?);

    if config.telemetry.metrics {
        print!("{}", pipeline.metrics().gather_metrics()?);
    }
    Ok(())
}

fn stress(args: StressArgs) -> anyhow::Result<()> {
    let mut config = DpiConfig::default();
    config.pool.slot_count = args.slots as usize;
    config.pool.free_list = args.strategy.into();
    let config = config.validated().context("Invalid command-line override")?;
    init_logging(&config)?;

    let plan = StressPlan {
        threads: args.threads,
        iterations: args.iterations,
        slots: config.pool.slot_count,
        strategy: config.pool.free_list,
        seed: args.seed,
    };
    let report = run_stress(&plan)?;
    print!("{}", serde_yaml::to_string(&report)?);

    if !report.is_clean() {
        warn!(
            violations = report.violations,
            missing_slots = report.missing_slots,
            "Pool invariants violated"
        );
        bail!(
            "Stress run found {} violation(s) and {} missing slot(s)",
            report.violations,
            report.missing_slots
        );
    }
    Ok(())
}

fn show_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.config)?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_stress_strategy() {
        let cli = Cli::try_parse_from(["dpi", "stress", "--strategy", "locked", "--slots", "4"])
            .unwrap();
        let Commands::Stress(args) = cli.command else {
            panic!("expected stress");
        };
        assert_eq!(FreeListKind::from(args.strategy), FreeListKind::Locked);
        assert_eq!(args.slots, 4);
        assert_eq!(args.threads, 8);
    }

    #[test]
    fn rejects_zero_slots() {
        assert!(Cli::try_parse_from(["dpi", "run", "--slots", "0"]).is_err());
        assert!(Cli::try_parse_from(["dpi", "stress", "--slots", "0"]).is_err());
    }

    #[test]
    fn oversized_slot_override_is_rejected() {
        let cli = Cli::try_parse_from(["dpi", "run", "--slots", "4000000000"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let err = apply_overrides(DpiConfig::default(), &args).unwrap_err();
        assert!(format!("{err:#}").contains("pool.slot_count"), "{err:#}");
    }

    #[test]
    fn overrides_within_bounds_are_applied() {
        let cli = Cli::try_parse_from(["dpi", "run", "--slots", "128", "--packets", "5"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = apply_overrides(DpiConfig::default(), &args).unwrap();
        assert_eq!(config.pool.slot_count, 128);
        assert_eq!(config.pipeline.packets_per_worker, 5);
    }

    #[test]
    fn second_logger_install_is_an_error() {
        let config = DpiConfig::default();
        let _ = init_logging(&config);
        let err = init_logging(&config).unwrap_err();
        assert!(err.to_string().contains("Failed to initialize logging"));
    }

    #[test]
    fn run_overrides_are_optional() {
        let cli = Cli::try_parse_from(["dpi", "run", "--packets", "10"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.packets, Some(10));
        assert!(args.slots.is_none() && args.config.is_none());
    }
}
