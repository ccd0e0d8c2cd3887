use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fahrpc_core::config::expand_path;
use fahrpc_core::{Config, ConfigSource, ControlFlags, LifecycleSupervisor};
use tracing::{error, info};

mod doctor;
mod factory;
mod logging;
mod signals;

#[derive(Debug, Parser)]
#[command(
    name = "fahrpc",
    version,
    about = "Shows Folding@home progress as Discord rich presence"
)]
struct Cli {
    /// Config file (default: <config dir>/fahrpc/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Seconds between updates; overrides foldingathome.update_interval
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Log filter, e.g. "debug" or "fahrpc_core=debug"; RUST_LOG still wins
    #[arg(long, global = true)]
    log: Option<String>,

    /// Do not write the rolling log file
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Run the presence daemon (default)
    Run,
    /// Check devices, the client, the stats page and Discord once
    Doctor,
    /// Write the default config file
    InitConfig {
        #[arg(long)]
        force: bool,
    },
    /// Print the config file location
    ConfigPath,
}

impl Cli {
    fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(raw) => Ok(expand_path(raw)),
            None => Config::default_path().context("locating config directory"),
        }
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(interval) = self.interval {
            config.foldingathome.update_interval = interval;
        }
        if let Some(level) = &self.log {
            config.logging.level = level.clone();
        }
        if self.no_file_log {
            config.logging.file_enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let path = cli.config_path()?;
    match cli.cmd {
        Some(Cmd::ConfigPath) => {
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Some(Cmd::InitConfig { force }) => {
            if path.exists() && !force {
                bail!("{} already exists; pass --force to overwrite", path.display());
            }
            Config::default().save_to(&path)?;
            println!("wrote {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Some(Cmd::Doctor) => {
            let config = load(&cli, &path)?;
            let healthy = doctor::run(&config, &path).await?;
            Ok(if healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Some(Cmd::Run) | None => {
            run_daemon(&cli, &path).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load(cli: &Cli, path: &std::path::Path) -> Result<Config> {
    let loaded = Config::load_or_init(path)?;
    match &loaded.source {
        ConfigSource::File => {}
        ConfigSource::Created => eprintln!("created default config at {}", path.display()),
        ConfigSource::Fallback { error } => {
            eprintln!("config unreadable, using defaults: {error}")
        }
    }
    let mut config = loaded.config;
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

async fn run_daemon(cli: &Cli, path: &std::path::Path) -> Result<()> {
    let config = load(cli, path)?;
    let log_dir = Config::data_dir(path);
    let guard = logging::init(&config.logging, &log_dir)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        log_file = ?guard.file,
        "fahrpc starting"
    );

    let flags = ControlFlags::new();
    signals::install(flags.clone());

    let supervisor = LifecycleSupervisor::new(flags);
    let factory = factory::DaemonFactory::new(config);
    match supervisor.run(&factory).await {
        Ok(summary) => {
            info!(generations = summary.generations, "fahrpc stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "fahrpc failed");
            Err(e)
        }
    }
}
