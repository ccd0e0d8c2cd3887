use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ModelError;

/// Task id reported when the client is running but no project id is visible yet.
pub const ACTIVE_PLACEHOLDER: &str = "Active";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Nvidia,
    Amd,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Nvidia => "nvidia",
            Vendor::Amd => "amd",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device temperature. Vendor tooling reports zero or negative values when
/// the sensor is missing; those never leave the metrics layer as numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temperature {
    Celsius(u32),
    Unavailable,
}

impl Temperature {
    pub fn from_raw(raw: Option<i64>) -> Self {
        match raw {
            Some(t) if t > 0 => Temperature::Celsius(u32::try_from(t).unwrap_or(u32::MAX)),
            _ => Temperature::Unavailable,
        }
    }

    pub fn celsius(&self) -> Option<u32> {
        match self {
            Temperature::Celsius(t) => Some(*t),
            Temperature::Unavailable => None,
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Temperature::Celsius(t) => write!(f, "{t}°C"),
            Temperature::Unavailable => f.write_str("N/A"),
        }
    }
}

/// Identity of an enumerated accelerator. `id` is provider specific
/// (an `nvidia-smi` index, a DRM card name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub vendor: Vendor,
    pub id: String,
    pub name: String,
}

/// Unnormalized provider output for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReading {
    pub utilization: u32,
    pub temperature: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReading {
    pub vendor: Vendor,
    pub name: String,
    pub utilization: u32,
    pub temperature: Temperature,
}

/// What the local control endpoint reports, as scraped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressReport {
    pub percentages: Vec<String>,
    pub task_ids: Vec<String>,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress {
    pub id: String,
    pub percent: String,
}

impl TaskProgress {
    pub fn percent_value(&self) -> f64 {
        parse_percent(&self.percent)
    }
}

/// The task that drives stats synchronisation: always the first one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leader<'a> {
    pub id: &'a str,
    pub percent: f64,
}

/// Validated work queue state for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    tasks: Vec<TaskProgress>,
    running: bool,
}

impl TaskSnapshot {
    pub fn new(
        task_ids: Vec<String>,
        percentages: Vec<String>,
        running: bool,
    ) -> Result<Self, ModelError> {
        if task_ids.len() != percentages.len() {
            return Err(ModelError::LengthMismatch {
                task_ids: task_ids.len(),
                percentages: percentages.len(),
            });
        }
        let tasks = task_ids
            .into_iter()
            .zip(percentages)
            .map(|(id, percent)| TaskProgress { id, percent })
            .collect();
        Ok(Self { tasks, running })
    }

    pub fn tasks(&self) -> &[TaskProgress] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn leader(&self) -> Leader<'_> {
        match self.tasks.first() {
            Some(task) => Leader {
                id: &task.id,
                percent: task.percent_value(),
            },
            None => Leader {
                id: ACTIVE_PLACEHOLDER,
                percent: 0.0,
            },
        }
    }
}

impl TryFrom<ProgressReport> for TaskSnapshot {
    type Error = ModelError;

    fn try_from(report: ProgressReport) -> Result<Self, Self::Error> {
        TaskSnapshot::new(report.task_ids, report.percentages, report.running)
    }
}

/// Lenient percentage parse: surrounding whitespace and a trailing `%` are
/// ignored, anything unparseable counts as zero.
pub fn parse_percent(raw: &str) -> f64 {
    raw.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Cumulative account totals, kept as the display strings the stats page uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub points: String,
    pub work_units: String,
}

impl GlobalStats {
    /// Both figures must be present and non-empty, otherwise the fetch counts as "no data".
    pub fn from_parts(points: Option<String>, work_units: Option<String>) -> Option<Self> {
        let points = points.map(|p| p.trim().to_string()).filter(|p| !p.is_empty())?;
        let work_units = work_units
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())?;
        Some(Self { points, work_units })
    }
}
