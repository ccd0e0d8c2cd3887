//! The interval-driven loop that keeps the presence in step with the client.
//!
//! Nothing survives a restart: a fresh loop starts with no stats, cycle zero
//! and unknown dependency health.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::display;
use crate::edge::{Edge, EdgeLatch};
use crate::error::TickError;
use crate::model::{GlobalStats, TaskSnapshot};
use crate::sources::{PresenceSink, ProgressSource, Telemetry};
use crate::sync::{RefreshReasons, SyncState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub interval: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
        }
    }
}

impl From<&Config> for LoopSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.foldingathome.update_interval(),
        }
    }
}

/// Something worth telling the operator about, emitted at most once per tick.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    SinkConnected,
    SinkUnavailable,
    SinkLost,
    ControlLost { reason: String },
    ControlRestored,
    FoldingStarted,
    FoldingPaused,
    StatsSyncStarted { reasons: RefreshReasons },
    StatsSynced { stats: GlobalStats },
    StatsUnavailable,
    MetricsUnavailable { reason: String },
    PresenceUpdated { detail: String, state: String },
    PresenceCleared,
}

impl LoopEvent {
    fn log(&self) {
        match self {
            LoopEvent::SinkConnected => info!("connected to Discord"),
            LoopEvent::SinkUnavailable => warn!("Discord not found; retrying every interval"),
            LoopEvent::SinkLost => warn!("lost connection to Discord"),
            LoopEvent::ControlLost { reason } => {
                warn!(%reason, "Folding@home client unreachable")
            }
            LoopEvent::ControlRestored => info!("Folding@home client reachable"),
            LoopEvent::FoldingStarted => info!("folding started"),
            LoopEvent::FoldingPaused => info!("folding paused; presence cleared"),
            LoopEvent::StatsSyncStarted { reasons } => {
                debug!(%reasons, "refreshing global stats")
            }
            LoopEvent::StatsSynced { stats } => info!(
                points = %stats.points,
                work_units = %stats.work_units,
                "global stats synchronized"
            ),
            LoopEvent::StatsUnavailable => debug!("global stats unavailable; keeping previous totals"),
            LoopEvent::MetricsUnavailable { reason } => {
                debug!(%reason, "device metrics unavailable")
            }
            LoopEvent::PresenceUpdated { detail, state } => {
                debug!(%detail, %state, "presence updated")
            }
            LoopEvent::PresenceCleared => debug!("presence cleared"),
        }
    }
}

/// How a tick ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    SinkDown,
    ControlDown,
    Paused,
    Updated,
    UpdateFailed,
    Failed { reason: String },
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickOutcome::SinkDown => f.write_str("sink-down"),
            TickOutcome::ControlDown => f.write_str("control-down"),
            TickOutcome::Paused => f.write_str("paused"),
            TickOutcome::Updated => f.write_str("updated"),
            TickOutcome::UpdateFailed => f.write_str("update-failed"),
            TickOutcome::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub events: Vec<LoopEvent>,
    pub outcome: TickOutcome,
}

impl TickReport {
    pub fn has(&self, event: &LoopEvent) -> bool {
        self.events.contains(event)
    }
}

#[derive(Debug)]
struct CycleState {
    sync: SyncState,
    stats: Option<GlobalStats>,
    /// Successful presence updates so far; drives the display rotation.
    cycle: u64,
    sink: EdgeLatch,
    control: EdgeLatch,
    running: EdgeLatch,
}

impl Default for CycleState {
    fn default() -> Self {
        Self {
            sync: SyncState::new(),
            stats: None,
            cycle: 0,
            sink: EdgeLatch::new(),
            control: EdgeLatch::new(),
            running: EdgeLatch::starting_at(true),
        }
    }
}

pub struct ReconciliationLoop {
    settings: LoopSettings,
    progress: Box<dyn ProgressSource>,
    telemetry: Box<dyn Telemetry>,
    sink: Box<dyn PresenceSink>,
    state: CycleState,
}

impl ReconciliationLoop {
    pub fn new(
        settings: LoopSettings,
        progress: Box<dyn ProgressSource>,
        telemetry: Box<dyn Telemetry>,
        sink: Box<dyn PresenceSink>,
    ) -> Self {
        Self {
            settings,
            progress,
            telemetry,
            sink,
            state: CycleState::default(),
        }
    }

    pub fn settings(&self) -> LoopSettings {
        self.settings
    }

    pub fn sync_state(&self) -> &SyncState {
        &self.state.sync
    }

    pub fn stats(&self) -> Option<&GlobalStats> {
        self.state.stats.as_ref()
    }

    pub fn cycle(&self) -> u64 {
        self.state.cycle
    }

    /// Runs one tick. Never sleeps and never fails: anything unexpected,
    /// including a panic inside a leaf, is reported as [`TickOutcome::Failed`].
    pub async fn tick(&mut self) -> TickReport {
        let mut events = Vec::new();
        let caught = AssertUnwindSafe(self.tick_inner(&mut events))
            .catch_unwind()
            .await;
        let outcome = match caught {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = %e, "tick failed");
                TickOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            Err(payload) => {
                let reason = format!("panicked: {}", panic_message(&*payload));
                error!(%reason, "tick failed");
                self.state.sync.abandon_refresh();
                TickOutcome::Failed { reason }
            }
        };
        debug!(%outcome, cycle = self.state.cycle, "tick finished");
        TickReport { events, outcome }
    }

    async fn tick_inner(&mut self, events: &mut Vec<LoopEvent>) -> Result<TickOutcome, TickError> {
        let state = &mut self.state;

        if !self.sink.is_connected() {
            match self.sink.connect().await {
                Ok(()) => {
                    state.sync.force();
                    if state.sink.observe(true) == Some(Edge::Up) {
                        emit(events, LoopEvent::SinkConnected);
                    }
                }
                Err(e) => {
                    debug!(error = %e, "presence connect failed");
                    if state.sink.observe(false) == Some(Edge::Down) {
                        emit(events, LoopEvent::SinkUnavailable);
                    }
                    return Ok(TickOutcome::SinkDown);
                }
            }
        }

        let report = match self.progress.get_progress().await {
            Ok(report) => {
                if state.control.observe(true) == Some(Edge::Up) {
                    emit(events, LoopEvent::ControlRestored);
                }
                report
            }
            Err(e) => {
                if state.control.observe(false) == Some(Edge::Down) {
                    emit(
                        events,
                        LoopEvent::ControlLost {
                            reason: e.to_string(),
                        },
                    );
                }
                return Ok(TickOutcome::ControlDown);
            }
        };
        let snapshot = TaskSnapshot::try_from(report)?;

        match state.running.observe(snapshot.running()) {
            Some(Edge::Up) => {
                state.sync.force();
                emit(events, LoopEvent::FoldingStarted);
            }
            Some(Edge::Down) => emit(events, LoopEvent::FoldingPaused),
            None => {}
        }

        if !snapshot.running() {
            self.sink.clear().await;
            emit(events, LoopEvent::PresenceCleared);
            return Ok(TickOutcome::Paused);
        }

        let leader = snapshot.leader();
        let (leader_id, leader_percent) = (leader.id.to_string(), leader.percent);
        state.sync.observe_leader(&leader_id);
        let reasons = state.sync.refresh_reasons(&leader_id, leader_percent);
        if state.sync.should_attempt(&reasons) {
            emit(events, LoopEvent::StatsSyncStarted { reasons });
            state.sync.begin_refresh(&leader_id);
            match self.progress.get_global_stats().await {
                Some(stats) => {
                    state.stats = Some(stats.clone());
                    state.sync.complete_refresh(true, leader_percent);
                    emit(events, LoopEvent::StatsSynced { stats });
                }
                None => {
                    state.sync.complete_refresh(false, leader_percent);
                    emit(events, LoopEvent::StatsUnavailable);
                }
            }
        }

        let sampled = AssertUnwindSafe(self.telemetry.sample_all())
            .catch_unwind()
            .await;
        let readings = match sampled {
            Ok(Ok(readings)) => readings,
            Ok(Err(e)) => {
                emit(
                    events,
                    LoopEvent::MetricsUnavailable {
                        reason: e.to_string(),
                    },
                );
                Vec::new()
            }
            Err(payload) => {
                emit(
                    events,
                    LoopEvent::MetricsUnavailable {
                        reason: format!("telemetry panicked: {}", panic_message(&*payload)),
                    },
                );
                Vec::new()
            }
        };

        let text = display::compose(&snapshot, state.stats.as_ref(), &readings, state.cycle);
        match self.sink.update(&text.detail, &text.state).await {
            Ok(()) => {
                state.cycle += 1;
                state.sink.observe(true);
                emit(
                    events,
                    LoopEvent::PresenceUpdated {
                        detail: text.detail,
                        state: text.state,
                    },
                );
                Ok(TickOutcome::Updated)
            }
            Err(e) => {
                debug!(error = %e, "presence update failed");
                if state.sink.observe(false) == Some(Edge::Down) {
                    emit(events, LoopEvent::SinkLost);
                }
                Ok(TickOutcome::UpdateFailed)
            }
        }
    }

    /// Ticks every interval until `cancel` fires, then closes both remote sessions.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        info!(interval_secs = self.settings.interval.as_secs(), "presence loop started");
        while !*cancel.borrow() {
            tokio::select! {
                _ = self.tick() => {}
                _ = cancel.changed() => break,
            }
            tokio::select! {
                _ = sleep(self.settings.interval) => {}
                _ = cancel.changed() => break,
            }
        }
        self.shutdown().await;
    }

    pub async fn shutdown(&mut self) {
        self.sink.close().await;
        self.progress.close().await;
        info!("presence loop stopped");
    }
}

fn emit(events: &mut Vec<LoopEvent>, event: LoopEvent) {
    event.log();
    events.push(event);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{FLAVOR_TEXT, NO_DEVICE_DATA};
    use crate::error::{MetricsError, ProgressError};
    use crate::model::{DeviceReading, Temperature, Vendor};
    use crate::sync::SyncStatus;
    use crate::testing::{report, stats, FakeProgress, FakeSink, FakeTelemetry};

    struct Harness {
        progress: FakeProgress,
        sink: FakeSink,
        telemetry: FakeTelemetry,
        lp: ReconciliationLoop,
    }

    fn harness(initial: crate::model::ProgressReport) -> Harness {
        let progress = FakeProgress::new(initial);
        let sink = FakeSink::new();
        let telemetry = FakeTelemetry::new(vec![]);
        let lp = ReconciliationLoop::new(
            LoopSettings::default(),
            Box::new(progress.clone()),
            Box::new(telemetry.clone()),
            Box::new(sink.clone()),
        );
        Harness {
            progress,
            sink,
            telemetry,
            lp,
        }
    }

    #[tokio::test]
    async fn paused_client_clears_and_never_updates() {
        let mut h = harness(report(&["18201"], &["72"], false));
        for _ in 0..3 {
            let r = h.lp.tick().await;
            assert_eq!(r.outcome, TickOutcome::Paused);
        }
        let sink = h.sink.state();
        assert_eq!(sink.clears, 3);
        assert!(sink.updates.is_empty());
        assert_eq!(h.lp.cycle(), 0);
    }

    #[tokio::test]
    async fn paused_at_startup_logs_once() {
        let mut h = harness(report(&[], &[], false));
        let first = h.lp.tick().await;
        assert!(first.has(&LoopEvent::FoldingPaused));
        let second = h.lp.tick().await;
        assert!(!second.has(&LoopEvent::FoldingPaused));
    }

    #[tokio::test]
    async fn first_task_triggers_refresh() {
        let mut h = harness(report(&["18201"], &["72"], true));
        h.progress.set_stats(Some(stats("1,000", "10")));

        let r = h.lp.tick().await;
        assert_eq!(r.outcome, TickOutcome::Updated);
        let started = r.events.iter().find_map(|e| match e {
            LoopEvent::StatsSyncStarted { reasons } => Some(*reasons),
            _ => None,
        });
        let reasons = started.expect("refresh attempted");
        assert!(reasons.task_changed);
        assert_eq!(h.progress.state().stats_calls, 1);
        assert_eq!(h.lp.sync_state().status(), SyncStatus::Synced);
        assert_eq!(h.lp.sync_state().last_task_id(), Some("18201"));
        assert!(h.lp.sync_state().fifty_percent_synced());
    }

    #[tokio::test]
    async fn half_way_refresh_happens_once() {
        let mut h = harness(report(&["18201"], &["49"], true));
        h.progress.set_stats(Some(stats("1,000", "10")));
        h.lp.tick().await;
        assert_eq!(h.progress.state().stats_calls, 1);
        assert!(!h.lp.sync_state().fifty_percent_synced());

        h.lp.tick().await;
        assert_eq!(h.progress.state().stats_calls, 1);

        h.progress.set_progress(Ok(report(&["18201"], &["51"], true)));
        let r = h.lp.tick().await;
        assert!(matches!(
            r.events.iter().find(|e| matches!(e, LoopEvent::StatsSyncStarted { .. })),
            Some(LoopEvent::StatsSyncStarted { reasons }) if reasons.crossed_half_way
        ));
        assert_eq!(h.progress.state().stats_calls, 2);
        assert!(h.lp.sync_state().fifty_percent_synced());

        h.progress.set_progress(Ok(report(&["18201"], &["55"], true)));
        h.lp.tick().await;
        assert_eq!(h.progress.state().stats_calls, 2);
    }

    #[tokio::test]
    async fn leader_change_resets_half_way_flag() {
        let mut h = harness(report(&["18201"], &["80"], true));
        h.progress.set_stats(Some(stats("1,000", "10")));
        h.lp.tick().await;
        assert!(h.lp.sync_state().fifty_percent_synced());

        h.progress.set_progress(Ok(report(&["18202"], &["1"], true)));
        h.lp.tick().await;
        assert!(!h.lp.sync_state().fifty_percent_synced());
        assert_eq!(h.lp.sync_state().last_task_id(), Some("18202"));
        assert_eq!(h.progress.state().stats_calls, 2);
    }

    #[tokio::test]
    async fn empty_stats_fetch_keeps_cached_totals() {
        let mut h = harness(report(&["18201"], &["10"], true));
        h.progress.set_stats(Some(stats("1,000", "10")));
        h.lp.tick().await;
        assert_eq!(h.lp.stats(), Some(&stats("1,000", "10")));

        h.progress.set_stats(None);
        h.progress.set_progress(Ok(report(&["18202"], &["10"], true)));
        let r = h.lp.tick().await;
        assert!(r.has(&LoopEvent::StatsUnavailable));
        assert_eq!(h.lp.stats(), Some(&stats("1,000", "10")));
        assert_eq!(h.lp.sync_state().status(), SyncStatus::Idle);

        // idle retries on the next tick
        h.lp.tick().await;
        assert_eq!(h.progress.state().stats_calls, 3);
    }

    #[tokio::test]
    async fn sink_connect_failures_log_one_edge() {
        let mut h = harness(report(&["18201"], &["10"], true));
        h.sink.state().accept_connect = false;

        let mut unavailable = 0;
        for _ in 0..3 {
            let r = h.lp.tick().await;
            assert_eq!(r.outcome, TickOutcome::SinkDown);
            unavailable += r
                .events
                .iter()
                .filter(|e| **e == LoopEvent::SinkUnavailable)
                .count();
        }
        assert_eq!(unavailable, 1);
        assert_eq!(h.sink.state().connects, 3);
        assert_eq!(h.progress.state().progress_calls, 0);

        h.sink.state().accept_connect = true;
        let r = h.lp.tick().await;
        assert!(r.has(&LoopEvent::SinkConnected));
        assert_eq!(r.outcome, TickOutcome::Updated);
    }

    #[tokio::test]
    async fn connect_forces_stats_refresh() {
        let mut h = harness(report(&["18201"], &["10"], true));
        h.progress.set_stats(Some(stats("1,000", "10")));
        h.lp.tick().await;
        h.lp.tick().await;
        assert_eq!(h.progress.state().stats_calls, 1);

        // drop the session: the next tick reconnects and must refresh
        h.sink.state().connected = false;
        let r = h.lp.tick().await;
        let reasons = r.events.iter().find_map(|e| match e {
            LoopEvent::StatsSyncStarted { reasons } => Some(*reasons),
            _ => None,
        });
        assert!(reasons.expect("refresh").forced);
        assert!(!h.lp.sync_state().force_pending());
        assert_eq!(h.progress.state().stats_calls, 2);
    }

    #[tokio::test]
    async fn control_loss_is_edge_triggered() {
        let mut h = harness(report(&["18201"], &["10"], true));
        h.progress
            .set_progress(Err(ProgressError::Unreachable("refused".into())));

        let first = h.lp.tick().await;
        assert_eq!(first.outcome, TickOutcome::ControlDown);
        assert!(matches!(first.events.last(), Some(LoopEvent::ControlLost { .. })));
        let second = h.lp.tick().await;
        assert!(second.events.is_empty());
        assert!(h.sink.state().updates.is_empty());

        h.progress.set_progress(Ok(report(&["18201"], &["10"], true)));
        let third = h.lp.tick().await;
        assert!(third.has(&LoopEvent::ControlRestored));
    }

    #[tokio::test]
    async fn cycle_counts_only_successful_updates() {
        let mut h = harness(report(&["18201", "18202"], &["10", "20"], true));
        h.lp.tick().await;
        assert_eq!(h.lp.cycle(), 1);

        h.sink.state().accept_update = false;
        let r = h.lp.tick().await;
        assert_eq!(r.outcome, TickOutcome::UpdateFailed);
        assert!(r.has(&LoopEvent::SinkLost));
        assert_eq!(h.lp.cycle(), 1);

        // reconnect failures after a lost session are the same outage
        h.sink.state().accept_connect = false;
        let r = h.lp.tick().await;
        assert_eq!(r.outcome, TickOutcome::SinkDown);
        assert!(r.events.is_empty());
        assert_eq!(h.lp.cycle(), 1);

        h.sink.state().accept_connect = true;
        h.sink.state().accept_update = true;
        h.lp.tick().await;
        assert_eq!(h.lp.cycle(), 2);
    }

    #[tokio::test]
    async fn two_tasks_rotate_presence_text() {
        let mut h = harness(report(&["18201", "18202"], &["72", "5"], true));
        h.progress.set_stats(Some(stats("1,234", "89")));
        for _ in 0..4 {
            h.lp.tick().await;
        }
        let updates = h.sink.state().updates.clone();
        assert_eq!(
            updates,
            vec![
                ("pTotal: 1,234".into(), "WUs Completed: 89".into()),
                ("Project 18201 - 72%".into(), "Project 18202 - 5%".into()),
                (NO_DEVICE_DATA.into(), FLAVOR_TEXT.into()),
                ("pTotal: 1,234".into(), "WUs Completed: 89".into()),
            ]
        );
    }

    #[tokio::test]
    async fn metrics_failure_does_not_abort_tick() {
        let mut h = harness(report(&["18201"], &["10"], true));
        h.telemetry.set(Err(MetricsError::NotEnumerated));
        h.lp.tick().await;
        let r = h.lp.tick().await;
        assert_eq!(r.outcome, TickOutcome::Updated);
        assert!(r
            .events
            .iter()
            .any(|e| matches!(e, LoopEvent::MetricsUnavailable { .. })));
        assert_eq!(h.sink.state().updates[1].0, NO_DEVICE_DATA);

        h.telemetry.set(Ok(vec![DeviceReading {
            vendor: Vendor::Nvidia,
            name: "RTX 3070".into(),
            utilization: 98,
            temperature: Temperature::Celsius(64),
        }]));
        h.lp.tick().await;
        h.lp.tick().await;
        assert_eq!(h.sink.state().updates[3].0, "RTX 3070 | 98% - 64°C");
    }

    #[tokio::test]
    async fn panicking_telemetry_still_updates_presence() {
        let mut h = harness(report(&["18201"], &["10"], true));
        h.telemetry.state().panics = true;

        let r = h.lp.tick().await;
        assert_eq!(r.outcome, TickOutcome::Updated);
        assert!(r.events.iter().any(|e| matches!(
            e,
            LoopEvent::MetricsUnavailable { reason } if reason.contains("sensor driver crashed")
        )));
        assert_eq!(h.sink.state().updates.len(), 1);
        assert_eq!(h.lp.cycle(), 1);
    }

    #[tokio::test]
    async fn panic_during_refresh_fails_only_that_tick() {
        let mut h = harness(report(&["18201"], &["10"], true));
        h.progress.state().panic_on_stats = true;

        let r = h.lp.tick().await;
        match &r.outcome {
            TickOutcome::Failed { reason } => assert!(reason.contains("stats parser exploded")),
            other => panic!("expected failed tick, got {other:?}"),
        }
        assert_eq!(h.lp.sync_state().status(), SyncStatus::Idle);
        assert!(h.sink.state().updates.is_empty());

        h.progress.state().panic_on_stats = false;
        h.progress.set_stats(Some(stats("1,000", "10")));
        let r = h.lp.tick().await;
        assert_eq!(r.outcome, TickOutcome::Updated);
        assert_eq!(h.progress.state().stats_calls, 2);
        assert_eq!(h.lp.sync_state().status(), SyncStatus::Synced);
    }

    #[tokio::test]
    async fn mismatched_report_is_a_transient_failure() {
        let mut h = harness(report(&["18201"], &[], true));
        let r = h.lp.tick().await;
        assert!(matches!(r.outcome, TickOutcome::Failed { .. }));
        assert!(h.sink.state().updates.is_empty());

        h.progress.set_progress(Ok(report(&["18201"], &["3"], true)));
        assert_eq!(h.lp.tick().await.outcome, TickOutcome::Updated);
    }

    #[tokio::test]
    async fn resume_forces_refresh() {
        let mut h = harness(report(&["18201"], &["10"], true));
        h.progress.set_stats(Some(stats("1,000", "10")));
        h.lp.tick().await;

        h.progress.set_progress(Ok(report(&["18201"], &["10"], false)));
        h.lp.tick().await;
        h.progress.set_progress(Ok(report(&["18201"], &["10"], true)));
        let r = h.lp.tick().await;
        assert!(r.has(&LoopEvent::FoldingStarted));
        assert_eq!(h.progress.state().stats_calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_closes_sessions_on_cancel() {
        let h = harness(report(&["18201"], &["10"], true));
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(h.lp.run(rx));

        tokio::time::sleep(Duration::from_secs(46)).await;
        tx.send(true).unwrap();
        task.await.unwrap();

        // ticks at 0, 15, 30 and 45 seconds
        assert_eq!(h.progress.state().progress_calls, 4);
        assert_eq!(h.progress.state().closed, 1);
        assert_eq!(h.sink.state().closes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_keeps_interval_when_ticks_panic() {
        let h = harness(report(&["18201"], &["10"], true));
        h.telemetry.state().panics = true;
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(h.lp.run(rx));

        tokio::time::sleep(Duration::from_secs(46)).await;
        tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(h.progress.state().progress_calls, 4);
        assert_eq!(h.telemetry.state().calls, 4);
        assert_eq!(h.sink.state().updates.len(), 4);
        assert_eq!(h.sink.state().closes, 1);
        assert_eq!(h.progress.state().closed, 1);
    }
}
