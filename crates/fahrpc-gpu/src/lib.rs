//! Vendor telemetry providers.

pub mod amd;
pub mod nvidia;

use fahrpc_core::config::HardwareConfig;
use fahrpc_core::{MetricsProvider, Vendor};
use tracing::debug;

pub use amd::AmdSysfs;
pub use nvidia::NvidiaSmi;

/// Providers for every vendor enabled in `hardware`.
pub fn providers_from_config(hardware: &HardwareConfig) -> Vec<Box<dyn MetricsProvider>> {
    let mut providers: Vec<Box<dyn MetricsProvider>> = Vec::new();
    if hardware.nvidia.enabled {
        providers.push(Box::new(NvidiaSmi::new(
            hardware.nvidia.strip_prefix(Vendor::Nvidia),
        )));
    } else {
        debug!("nvidia telemetry disabled");
    }
    if hardware.amd.enabled {
        providers.push(Box::new(AmdSysfs::new(hardware.amd.strip_prefix(Vendor::Amd))));
    } else {
        debug!("amd telemetry disabled");
    }
    providers
}

/// Removes the vendor's marketing prefix and surrounding whitespace.
pub(crate) fn clean_name(raw: &str, prefix: &str) -> String {
    let raw = raw.trim();
    let stripped = if prefix.is_empty() {
        raw
    } else {
        raw.strip_prefix(prefix.trim_end())
            .unwrap_or(raw)
    };
    stripped.trim().to_string()
}
