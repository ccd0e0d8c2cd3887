use async_trait::async_trait;

use crate::error::{MetricsError, PresenceError, ProgressError};
use crate::model::{DeviceReading, GlobalStats, ProgressReport};

/// Work queue state from the local client and account totals from the stats site.
#[async_trait]
pub trait ProgressSource: Send {
    /// Fails when the control endpoint is unreachable or does not look like a client page.
    async fn get_progress(&mut self) -> Result<ProgressReport, ProgressError>;

    /// Never fails: `None` means no data this time.
    async fn get_global_stats(&mut self) -> Option<GlobalStats>;

    async fn close(&mut self);
}

/// The presence display. Any failed `update` must leave the sink disconnected.
#[async_trait]
pub trait PresenceSink: Send {
    fn is_connected(&self) -> bool;

    async fn connect(&mut self) -> Result<(), PresenceError>;

    async fn update(&mut self, detail: &str, state: &str) -> Result<(), PresenceError>;

    /// Best effort.
    async fn clear(&mut self);

    /// Best effort.
    async fn close(&mut self);
}

/// Per-tick device readings.
#[async_trait]
pub trait Telemetry: Send {
    async fn sample_all(&mut self) -> Result<Vec<DeviceReading>, MetricsError>;
}
