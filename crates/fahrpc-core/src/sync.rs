//! When to refresh the cumulative stats.
//!
//! Only the leading task is considered. A refresh is needed when the leader
//! changes, when it first reaches half way, when the last attempt produced no
//! data, or when something upstream forced it (a new presence session, folding
//! resuming). At most one refresh is in flight at a time.

use std::fmt;

pub const HALF_WAY_PERCENT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Pending,
    Synced,
}

/// Which conditions asked for a refresh on this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshReasons {
    pub task_changed: bool,
    pub crossed_half_way: bool,
    pub idle: bool,
    pub forced: bool,
}

impl RefreshReasons {
    pub fn is_needed(&self) -> bool {
        self.task_changed || self.crossed_half_way || self.idle || self.forced
    }
}

impl fmt::Display for RefreshReasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.task_changed, "task-changed"),
            (self.crossed_half_way, "half-way"),
            (self.idle, "idle"),
            (self.forced, "forced"),
        ];
        let active: Vec<&str> = names.iter().filter(|(on, _)| *on).map(|(_, n)| *n).collect();
        if active.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&active.join(","))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    status: SyncStatus,
    last_task_id: Option<String>,
    fifty_percent_synced: bool,
    force_stats_sync: bool,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn last_task_id(&self) -> Option<&str> {
        self.last_task_id.as_deref()
    }

    pub fn fifty_percent_synced(&self) -> bool {
        self.fifty_percent_synced
    }

    pub fn force_pending(&self) -> bool {
        self.force_stats_sync
    }

    /// The next eligible tick refreshes regardless of the other conditions.
    pub fn force(&mut self) {
        self.force_stats_sync = true;
    }

    /// Clears the half-way flag when a different task leads. Returns whether it changed.
    pub fn observe_leader(&mut self, task_id: &str) -> bool {
        let changed = self.last_task_id.as_deref() != Some(task_id);
        if changed {
            self.fifty_percent_synced = false;
        }
        changed
    }

    pub fn refresh_reasons(&self, task_id: &str, percent: f64) -> RefreshReasons {
        RefreshReasons {
            task_changed: self.last_task_id.as_deref() != Some(task_id),
            crossed_half_way: percent >= HALF_WAY_PERCENT && !self.fifty_percent_synced,
            idle: self.status == SyncStatus::Idle,
            forced: self.force_stats_sync,
        }
    }

    pub fn should_attempt(&self, reasons: &RefreshReasons) -> bool {
        reasons.is_needed() && self.status != SyncStatus::Pending
    }

    pub fn begin_refresh(&mut self, task_id: &str) {
        debug_assert!(self.status != SyncStatus::Pending);
        self.status = SyncStatus::Pending;
        self.force_stats_sync = false;
        self.last_task_id = Some(task_id.to_string());
    }

    pub fn complete_refresh(&mut self, fetched: bool, percent: f64) {
        if fetched {
            self.status = SyncStatus::Synced;
            if percent >= HALF_WAY_PERCENT {
                self.fifty_percent_synced = true;
            }
        } else {
            self.status = SyncStatus::Idle;
        }
    }

    /// Drops a refresh that never completed, so the next tick may try again.
    pub fn abandon_refresh(&mut self) {
        if self.status == SyncStatus::Pending {
            self.status = SyncStatus::Idle;
        }
    }

    /// False for the combination that should never be observable between ticks.
    pub fn is_consistent(&self) -> bool {
        !(self.status == SyncStatus::Pending && self.force_stats_sync)
    }
}
