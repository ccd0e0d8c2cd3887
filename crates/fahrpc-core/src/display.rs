//! Rotating presence text.
//!
//! The variant shown is keyed by the number of successful updates so far, so a
//! failed push shows the same variant again next tick.

use crate::model::{DeviceReading, GlobalStats, TaskSnapshot, Temperature};

pub const NO_DEVICE_DATA: &str = "no device data";
pub const SYNCHRONIZING: &str = "Synchronizing...";
pub const FLAVOR_TEXT: &str = "\"hyper modern space heater\"";

/// The two presence lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceText {
    pub detail: String,
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayVariant {
    Totals,
    TwoTasks,
    DevicesWithTask,
    DevicesWithFlavor,
}

pub fn select_variant(task_count: usize, cycle: u64) -> DisplayVariant {
    match task_count {
        0 => DisplayVariant::Totals,
        1 => match cycle % 2 {
            0 => DisplayVariant::Totals,
            _ => DisplayVariant::DevicesWithTask,
        },
        _ => match cycle % 3 {
            0 => DisplayVariant::Totals,
            1 => DisplayVariant::TwoTasks,
            _ => DisplayVariant::DevicesWithFlavor,
        },
    }
}

/// One line describing all readings. Temperature is averaged only over
/// readings that have one; utilization over all of them.
pub fn device_summary(readings: &[DeviceReading]) -> String {
    match readings {
        [] => NO_DEVICE_DATA.to_string(),
        [only] => format!("{} | {}% - {}", only.name, only.utilization, only.temperature),
        many => {
            let count = many.len();
            let util_sum: u64 = many.iter().map(|r| u64::from(r.utilization)).sum();
            let avg_util = util_sum / count as u64;

            let temps: Vec<u64> = many
                .iter()
                .filter_map(|r| r.temperature.celsius())
                .map(u64::from)
                .collect();
            let avg_temp = if temps.is_empty() {
                Temperature::Unavailable
            } else {
                let avg = temps.iter().sum::<u64>() / temps.len() as u64;
                Temperature::Celsius(u32::try_from(avg).unwrap_or(u32::MAX))
            };
            format!("{count} devices | {avg_util}% - {avg_temp}")
        }
    }
}

pub fn render(
    variant: DisplayVariant,
    tasks: &TaskSnapshot,
    stats: Option<&GlobalStats>,
    devices: &str,
) -> PresenceText {
    let task_line = |i: usize| {
        tasks
            .tasks()
            .get(i)
            .map(|t| format!("Project {} - {}%", t.id, t.percent))
    };

    match variant {
        DisplayVariant::TwoTasks => {
            if let (Some(detail), Some(state)) = (task_line(0), task_line(1)) {
                return PresenceText { detail, state };
            }
        }
        DisplayVariant::DevicesWithTask => {
            if let Some(state) = task_line(0) {
                return PresenceText {
                    detail: devices.to_string(),
                    state,
                };
            }
        }
        DisplayVariant::DevicesWithFlavor => {
            return PresenceText {
                detail: devices.to_string(),
                state: FLAVOR_TEXT.to_string(),
            };
        }
        DisplayVariant::Totals => {}
    }
    totals(stats)
}

fn totals(stats: Option<&GlobalStats>) -> PresenceText {
    let (points, wus) = match stats {
        Some(s) => (s.points.as_str(), s.work_units.as_str()),
        None => (SYNCHRONIZING, SYNCHRONIZING),
    };
    PresenceText {
        detail: format!("pTotal: {points}"),
        state: format!("WUs Completed: {wus}"),
    }
}

pub fn compose(
    tasks: &TaskSnapshot,
    stats: Option<&GlobalStats>,
    readings: &[DeviceReading],
    cycle: u64,
) -> PresenceText {
    let variant = select_variant(tasks.len(), cycle);
    render(variant, tasks, stats, &device_summary(readings))
}
