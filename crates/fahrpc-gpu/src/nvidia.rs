use std::ffi::OsString;
use std::time::Duration;

use async_trait::async_trait;
use fahrpc_core::{DeviceHandle, MetricsError, MetricsProvider, RawReading, Vendor};
use tokio::process::Command;
use tokio::time::timeout;

use crate::clean_name;

const QUERY: &str = "--query-gpu=index,name,utilization.gpu,temperature.gpu";
const FORMAT: &str = "--format=csv,noheader,nounits";
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// One row of `nvidia-smi` query output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRow {
    pub index: String,
    pub name: String,
    pub utilization: Option<u32>,
    pub temperature: Option<i64>,
}

/// Parses `index, name, utilization, temperature`. The name may itself contain commas.
pub fn parse_query_line(line: &str) -> Option<QueryRow> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (index, rest) = line.split_once(',')?;
    let mut tail = rest.rsplitn(3, ',');
    let temperature = tail.next()?;
    let utilization = tail.next()?;
    let name = tail.next()?;

    let index = index.trim();
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(QueryRow {
        index: index.to_string(),
        name: name.trim().to_string(),
        utilization: parse_field(utilization),
        temperature: parse_field(temperature),
    })
}

/// `[N/A]`, `[Not Supported]` and friends are absent values.
fn parse_field<T: std::str::FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

/// NVIDIA telemetry through the `nvidia-smi` query interface.
pub struct NvidiaSmi {
    program: OsString,
    strip_prefix: String,
}

impl NvidiaSmi {
    pub fn new(strip_prefix: &str) -> Self {
        Self::with_program("nvidia-smi", strip_prefix)
    }

    pub fn with_program(program: impl Into<OsString>, strip_prefix: &str) -> Self {
        Self {
            program: program.into(),
            strip_prefix: strip_prefix.to_string(),
        }
    }

    async fn query(&self, index: Option<&str>) -> Result<Vec<QueryRow>, MetricsError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(QUERY).arg(FORMAT).kill_on_drop(true);
        if let Some(index) = index {
            cmd.arg("-i").arg(index);
        }

        let unavailable = |reason: String| MetricsError::Unavailable {
            vendor: Vendor::Nvidia,
            reason,
        };
        let out = timeout(QUERY_TIMEOUT, cmd.output())
            .await
            .map_err(|_| unavailable("nvidia-smi timed out".to_string()))?
            .map_err(|e| unavailable(format!("running nvidia-smi: {e}")))?;
        if !out.status.success() {
            return Err(unavailable(format!(
                "nvidia-smi failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&out.stdout)
            .lines()
            .filter_map(parse_query_line)
            .collect())
    }
}

#[async_trait]
impl MetricsProvider for NvidiaSmi {
    fn vendor(&self) -> Vendor {
        Vendor::Nvidia
    }

    async fn enumerate(&mut self) -> Result<Vec<DeviceHandle>, MetricsError> {
        let rows = self.query(None).await?;
        Ok(rows
            .into_iter()
            .map(|row| DeviceHandle {
                vendor: Vendor::Nvidia,
                id: row.index,
                name: clean_name(&row.name, &self.strip_prefix),
            })
            .collect())
    }

    async fn sample(&mut self, device: &DeviceHandle) -> Result<RawReading, MetricsError> {
        let rows = self.query(Some(&device.id)).await.map_err(|e| MetricsError::Query {
            device: device.id.clone(),
            reason: e.to_string(),
        })?;
        let row = rows
            .into_iter()
            .find(|r| r.index == device.id)
            .ok_or_else(|| MetricsError::Query {
                device: device.id.clone(),
                reason: "device missing from nvidia-smi output".to_string(),
            })?;
        let utilization = row.utilization.ok_or_else(|| MetricsError::Query {
            device: device.id.clone(),
            reason: "utilization not reported".to_string(),
        })?;
        Ok(RawReading {
            utilization,
            temperature: row.temperature,
        })
    }
}
