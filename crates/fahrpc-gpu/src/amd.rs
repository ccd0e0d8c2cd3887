//! AMD telemetry from the `amdgpu` sysfs nodes under `/sys/class/drm`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fahrpc_core::{DeviceHandle, MetricsError, MetricsProvider, RawReading, Vendor};
use tokio::fs;
use tracing::debug;

use crate::clean_name;

pub const DRM_ROOT: &str = "/sys/class/drm";
const AMD_VENDOR_ID: &str = "0x1002";

pub struct AmdSysfs {
    root: PathBuf,
    strip_prefix: String,
}

impl AmdSysfs {
    pub fn new(strip_prefix: &str) -> Self {
        Self::with_root(DRM_ROOT, strip_prefix)
    }

    pub fn with_root(root: impl Into<PathBuf>, strip_prefix: &str) -> Self {
        Self {
            root: root.into(),
            strip_prefix: strip_prefix.to_string(),
        }
    }

    fn device_dir(&self, card: &str) -> PathBuf {
        self.root.join(card).join("device")
    }
}

async fn read_trimmed(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).await.ok()?;
    let v = raw.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

async fn read_busy_percent(device: &Path) -> Option<u32> {
    read_trimmed(&device.join("gpu_busy_percent"))
        .await?
        .parse()
        .ok()
}

/// First `hwmon*/temp1_input`, in whole degrees.
async fn read_temperature(device: &Path) -> Option<i64> {
    let mut entries = fs::read_dir(device.join("hwmon")).await.ok()?;
    let mut monitors = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        monitors.push(entry.path());
    }
    monitors.sort();
    for monitor in monitors {
        if let Some(raw) = read_trimmed(&monitor.join("temp1_input")).await {
            if let Ok(millis) = raw.parse::<i64>() {
                return Some(millis / 1000);
            }
        }
    }
    None
}

/// `card0`, `card1`, ... but not connector nodes such as `card0-DP-1`.
fn card_number(name: &str) -> Option<u32> {
    name.strip_prefix("card")?.parse().ok()
}

#[async_trait]
impl MetricsProvider for AmdSysfs {
    fn vendor(&self) -> Vendor {
        Vendor::Amd
    }

    /// No DRM class directory (not Linux, or no GPU driver) means no devices.
    async fn enumerate(&mut self) -> Result<Vec<DeviceHandle>, MetricsError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(root = %self.root.display(), "no drm class, no amd devices");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(MetricsError::Unavailable {
                    vendor: Vendor::Amd,
                    reason: format!("reading {}: {e}", self.root.display()),
                })
            }
        };

        let mut cards = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(n) = card_number(&name) {
                cards.push((n, name));
            }
        }
        cards.sort();

        let mut devices = Vec::new();
        for (_, card) in cards {
            let dir = self.device_dir(&card);
            if read_trimmed(&dir.join("vendor")).await.as_deref() != Some(AMD_VENDOR_ID) {
                continue;
            }
            if read_busy_percent(&dir).await.is_none() {
                debug!(%card, "skipping amd card without gpu_busy_percent");
                continue;
            }
            let raw_name = read_trimmed(&dir.join("product_name"))
                .await
                .unwrap_or_else(|| format!("AMD GPU {card}"));
            devices.push(DeviceHandle {
                vendor: Vendor::Amd,
                id: card,
                name: clean_name(&raw_name, &self.strip_prefix),
            });
        }
        Ok(devices)
    }

    async fn sample(&mut self, device: &DeviceHandle) -> Result<RawReading, MetricsError> {
        let dir = self.device_dir(&device.id);
        let utilization = read_busy_percent(&dir)
            .await
            .ok_or_else(|| MetricsError::Query {
                device: device.id.clone(),
                reason: "gpu_busy_percent unreadable".to_string(),
            })?;
        Ok(RawReading {
            utilization,
            temperature: read_temperature(&dir).await,
        })
    }
}
