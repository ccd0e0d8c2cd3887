#![forbid(unsafe_code)]

//! Shared model, settings and the reconciliation loop that keeps a Discord
//! presence in step with a local Folding@home client.

pub mod cache;
pub mod config;
pub mod display;
pub mod edge;
pub mod error;
pub mod metrics;
pub mod model;
pub mod reconcile;
pub mod sources;
pub mod supervisor;
pub mod sync;
pub mod time;

#[cfg(test)]
mod testing;

pub use cache::TtlCache;
pub use config::{Config, ConfigError, ConfigSource, LoadedConfig};
pub use error::{MetricsError, ModelError, PresenceError, ProgressError, TickError};
pub use metrics::{MetricsProvider, MetricsSource};
pub use model::*;
pub use reconcile::{LoopEvent, LoopSettings, ReconciliationLoop, TickOutcome, TickReport};
pub use sources::{PresenceSink, ProgressSource, Telemetry};
pub use supervisor::{ControlFlags, LifecycleSupervisor, LoopFactory};
pub use sync::{RefreshReasons, SyncState, SyncStatus};
pub use time::{Clock, ManualClock, SystemClock};

/// Application identifier used for directories and log file names.
pub const APP_NAME: &str = "fahrpc";
