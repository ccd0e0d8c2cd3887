//! Aggregates accelerator telemetry across vendors.

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::config::TemperatureConfig;
use crate::error::MetricsError;
use crate::model::{DeviceHandle, DeviceReading, RawReading, Temperature, Vendor};
use crate::sources::Telemetry;

/// One vendor's way of finding and querying devices.
#[async_trait]
pub trait MetricsProvider: Send {
    fn vendor(&self) -> Vendor;

    async fn enumerate(&mut self) -> Result<Vec<DeviceHandle>, MetricsError>;

    async fn sample(&mut self, device: &DeviceHandle) -> Result<RawReading, MetricsError>;
}

pub struct MetricsSource {
    providers: Vec<Box<dyn MetricsProvider>>,
    temperature: TemperatureConfig,
    /// `(provider index, device)` in enumeration order.
    devices: Option<Vec<(usize, DeviceHandle)>>,
}

impl MetricsSource {
    pub fn new(providers: Vec<Box<dyn MetricsProvider>>, temperature: TemperatureConfig) -> Self {
        Self {
            providers,
            temperature,
            devices: None,
        }
    }

    /// Discovers devices once. Later calls return the cached list.
    pub async fn enumerate(&mut self) -> &[(usize, DeviceHandle)] {
        if self.devices.is_none() {
            let mut found = Vec::new();
            for (idx, provider) in self.providers.iter_mut().enumerate() {
                let vendor = provider.vendor();
                match provider.enumerate().await {
                    Ok(handles) => {
                        info!(%vendor, count = handles.len(), "enumerated devices");
                        for handle in handles {
                            info!(%vendor, id = %handle.id, name = %handle.name, "device found");
                            found.push((idx, handle));
                        }
                    }
                    Err(e) => error!(%vendor, error = %e, "device enumeration failed"),
                }
            }
            self.devices = Some(found);
        }
        self.devices.as_deref().unwrap_or_default()
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceHandle> {
        self.devices.iter().flatten().map(|(_, d)| d)
    }

    pub fn device_count(&self) -> usize {
        self.devices.as_ref().map_or(0, Vec::len)
    }

    pub fn count_for(&self, vendor: Vendor) -> usize {
        self.devices().filter(|d| d.vendor == vendor).count()
    }

    /// Reads every enumerated device, skipping the ones that fail this time.
    pub async fn sample_all(&mut self) -> Result<Vec<DeviceReading>, MetricsError> {
        let devices = self.devices.as_ref().ok_or(MetricsError::NotEnumerated)?;
        let mut readings = Vec::with_capacity(devices.len());
        for (idx, handle) in devices {
            let Some(provider) = self.providers.get_mut(*idx) else {
                continue;
            };
            match provider.sample(handle).await {
                Ok(raw) => {
                    let reading = normalize(handle, raw);
                    let level = self
                        .temperature
                        .classify(reading.temperature)
                        .map(|l| self.temperature.label(l))
                        .unwrap_or("unknown");
                    debug!(
                        vendor = %reading.vendor,
                        name = %reading.name,
                        utilization = reading.utilization,
                        temperature = %reading.temperature,
                        level,
                        "device sample"
                    );
                    readings.push(reading);
                }
                Err(e) => debug!(device = %handle.name, error = %e, "device sample skipped"),
            }
        }
        Ok(readings)
    }
}

#[async_trait]
impl Telemetry for MetricsSource {
    async fn sample_all(&mut self) -> Result<Vec<DeviceReading>, MetricsError> {
        MetricsSource::sample_all(self).await
    }
}

fn normalize(handle: &DeviceHandle, raw: RawReading) -> DeviceReading {
    DeviceReading {
        vendor: handle.vendor,
        name: handle.name.clone(),
        utilization: raw.utilization.min(100),
        temperature: Temperature::from_raw(raw.temperature),
    }
}
