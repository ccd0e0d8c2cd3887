use anyhow::{Context, Result};
use async_trait::async_trait;
use fahrpc_core::{Config, LoopFactory, LoopSettings, MetricsSource, ReconciliationLoop, Vendor};
use fahrpc_discord::DiscordPresence;
use fahrpc_fah::FahClient;
use tracing::info;

/// Builds the production loop: Folding@home over HTTP, vendor telemetry, Discord IPC.
pub struct DaemonFactory {
    config: Config,
}

impl DaemonFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

pub async fn metrics_source(config: &Config) -> MetricsSource {
    let mut metrics = MetricsSource::new(
        fahrpc_gpu::providers_from_config(&config.hardware),
        config.temperature.clone(),
    );
    metrics.enumerate().await;
    metrics
}

#[async_trait]
impl LoopFactory for DaemonFactory {
    async fn build(&self) -> Result<ReconciliationLoop> {
        let config = &self.config;
        let metrics = metrics_source(config).await;
        let fah = FahClient::from_config(&config.foldingathome).context("building page loader")?;
        let discord = DiscordPresence::from_config(&config.discord);
        let settings = LoopSettings::from(config);

        info!(
            nvidia = metrics.count_for(Vendor::Nvidia),
            amd = metrics.count_for(Vendor::Amd),
            control = %fah.web_url(),
            stats = %fah.stats_url(),
            renderer = ?config.foldingathome.renderer,
            interval_secs = settings.interval.as_secs(),
            "presence loop configured"
        );

        Ok(ReconciliationLoop::new(
            settings,
            Box::new(fah),
            Box::new(metrics),
            Box::new(discord),
        ))
    }
}
