use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fahrpc_core::config::{expand_path, FahConfig, Renderer};
use fahrpc_core::{
    Clock, GlobalStats, ProgressError, ProgressReport, ProgressSource, SystemClock, TtlCache,
};
use tracing::{debug, warn};

use crate::extract::{parse_control_page, parse_stats_page};
use crate::render::{
    BrowserLoader, HttpLoader, PageLoader, PageRequest, CONTROL_READY, STATS_READY,
};

/// Reads the local client's web control page and the public stats page.
pub struct FahClient {
    pages: Box<dyn PageLoader>,
    web_url: String,
    stats_url: String,
    control_timeout: Duration,
    stats_timeout: Duration,
    cache: TtlCache<GlobalStats>,
    clock: Arc<dyn Clock>,
}

impl FahClient {
    pub fn from_config(config: &FahConfig) -> Result<Self, reqwest::Error> {
        let pages: Box<dyn PageLoader> = match config.renderer {
            Renderer::Browser => Box::new(BrowserLoader::new(
                config.browser_path.as_deref().map(expand_path),
            )),
            Renderer::Http => Box::new(HttpLoader::new()?),
        };
        Ok(Self::with_loader(config, pages))
    }

    pub fn with_loader(config: &FahConfig, pages: Box<dyn PageLoader>) -> Self {
        Self {
            pages,
            web_url: config.web_url.clone(),
            stats_url: config.stats_url.clone(),
            control_timeout: config.control_timeout(),
            stats_timeout: config.stats_timeout(),
            cache: TtlCache::new(config.stats_cache_ttl()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    pub fn stats_url(&self) -> &str {
        &self.stats_url
    }
}

#[async_trait]
impl ProgressSource for FahClient {
    async fn get_progress(&mut self) -> Result<ProgressReport, ProgressError> {
        let request = PageRequest {
            url: &self.web_url,
            ready: CONTROL_READY,
            timeout: self.control_timeout,
        };
        let html = self.pages.load(&request).await?;
        let report = parse_control_page(&html)?;
        debug!(
            tasks = report.task_ids.len(),
            running = report.running,
            "control page read"
        );
        Ok(report)
    }

    async fn get_global_stats(&mut self) -> Option<GlobalStats> {
        let now = self.clock.now();
        if let Some(hit) = self.cache.get(now) {
            debug!("global stats served from cache");
            return Some(hit);
        }

        let request = PageRequest {
            url: &self.stats_url,
            ready: STATS_READY,
            timeout: self.stats_timeout,
        };
        let html = match self.pages.load(&request).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %self.stats_url, error = %e, "stats page fetch failed");
                return None;
            }
        };
        match parse_stats_page(&html) {
            Some(stats) => {
                self.cache.put(stats.clone(), now);
                Some(stats)
            }
            None => {
                warn!(url = %self.stats_url, "stats page has no totals");
                None
            }
        }
    }

    async fn close(&mut self) {
        self.cache.clear();
        self.pages.close().await;
    }
}
