use std::path::Path;

use anyhow::{Context, Result};
use fahrpc_core::{Config, PresenceSink, ProgressSource};
use fahrpc_discord::DiscordPresence;
use fahrpc_fah::FahClient;

use crate::factory::metrics_source;

/// One pass over every dependency. Returns whether the daemon could run.
pub async fn run(config: &Config, config_path: &Path) -> Result<bool> {
    println!("config:   {}", config_path.display());

    let metrics = metrics_source(config).await;
    if metrics.device_count() == 0 {
        println!("devices:  none detected");
    }
    for device in metrics.devices() {
        println!("device:   {} {} ({})", device.vendor, device.name, device.id);
    }

    println!("renderer: {:?}", config.foldingathome.renderer);
    let mut fah = FahClient::from_config(&config.foldingathome).context("building page loader")?;
    let control_ok = match fah.get_progress().await {
        Ok(report) => {
            println!(
                "control:  ok, {} task(s), running={} ({})",
                report.task_ids.len(),
                report.running,
                fah.web_url()
            );
            true
        }
        Err(e) => {
            println!("control:  FAILED {} ({e})", fah.web_url());
            false
        }
    };

    match fah.get_global_stats().await {
        Some(stats) => println!(
            "stats:    {} points, {} work units",
            stats.points, stats.work_units
        ),
        None => println!("stats:    unavailable ({})", fah.stats_url()),
    }
    fah.close().await;

    let mut discord = DiscordPresence::from_config(&config.discord);
    let discord_ok = match discord.connect().await {
        Ok(()) => {
            println!("discord:  handshake ok");
            discord.close().await;
            true
        }
        Err(e) => {
            println!("discord:  FAILED ({e})");
            false
        }
    };

    Ok(control_ok && discord_ok)
}
