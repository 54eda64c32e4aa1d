use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use montecarlo::manager::Manager;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Estimate neutron count distributions per generation.
    Fission,

    /// Estimate secretary problem success rates per sample size.
    Secretary,

    /// Remove every generated output file.
    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Fission => mgr.run_fission()?,
        Command::Secretary => mgr.run_secretary()?,
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}
