//! In-memory leaves for loop and supervisor tests. Each fake hands out a
//! shared handle so a test can script it and inspect the calls afterwards.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{MetricsError, PresenceError, ProgressError};
use crate::model::{DeviceReading, GlobalStats, ProgressReport};
use crate::sources::{PresenceSink, ProgressSource, Telemetry};

pub fn report(ids: &[&str], pcts: &[&str], running: bool) -> ProgressReport {
    ProgressReport {
        percentages: pcts.iter().map(|s| s.to_string()).collect(),
        task_ids: ids.iter().map(|s| s.to_string()).collect(),
        running,
    }
}

pub fn stats(points: &str, wus: &str) -> GlobalStats {
    GlobalStats {
        points: points.to_string(),
        work_units: wus.to_string(),
    }
}

pub struct ProgressState {
    pub progress: Result<ProgressReport, ProgressError>,
    pub stats: Option<GlobalStats>,
    pub panic_on_stats: bool,
    pub progress_calls: usize,
    pub stats_calls: usize,
    pub closed: usize,
}

#[derive(Clone)]
pub struct FakeProgress(Arc<Mutex<ProgressState>>);

impl FakeProgress {
    pub fn new(progress: ProgressReport) -> Self {
        Self(Arc::new(Mutex::new(ProgressState {
            progress: Ok(progress),
            stats: None,
            panic_on_stats: false,
            progress_calls: 0,
            stats_calls: 0,
            closed: 0,
        })))
    }

    pub fn state(&self) -> MutexGuard<'_, ProgressState> {
        self.0.lock().unwrap()
    }

    pub fn set_progress(&self, progress: Result<ProgressReport, ProgressError>) {
        self.state().progress = progress;
    }

    pub fn set_stats(&self, stats: Option<GlobalStats>) {
        self.state().stats = stats;
    }
}

#[async_trait]
impl ProgressSource for FakeProgress {
    async fn get_progress(&mut self) -> Result<ProgressReport, ProgressError> {
        let mut s = self.state();
        s.progress_calls += 1;
        s.progress.clone()
    }

    async fn get_global_stats(&mut self) -> Option<GlobalStats> {
        let mut s = self.state();
        s.stats_calls += 1;
        if s.panic_on_stats {
            drop(s);
            panic!("stats parser exploded");
        }
        s.stats.clone()
    }

    async fn close(&mut self) {
        self.state().closed += 1;
    }
}

pub struct SinkState {
    pub accept_connect: bool,
    pub accept_update: bool,
    pub panic_on_connect: bool,
    pub panic_on_close: bool,
    pub connected: bool,
    pub connects: usize,
    pub updates: Vec<(String, String)>,
    pub clears: usize,
    pub closes: usize,
}

#[derive(Clone)]
pub struct FakeSink(Arc<Mutex<SinkState>>);

impl FakeSink {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(SinkState {
            accept_connect: true,
            accept_update: true,
            panic_on_connect: false,
            panic_on_close: false,
            connected: false,
            connects: 0,
            updates: Vec::new(),
            clears: 0,
            closes: 0,
        })))
    }

    pub fn state(&self) -> MutexGuard<'_, SinkState> {
        self.0.lock().unwrap()
    }
}

#[async_trait]
impl PresenceSink for FakeSink {
    fn is_connected(&self) -> bool {
        self.state().connected
    }

    async fn connect(&mut self) -> Result<(), PresenceError> {
        let mut s = self.state();
        if s.panic_on_connect {
            drop(s);
            panic!("sink exploded");
        }
        s.connects += 1;
        s.connected = s.accept_connect;
        if s.connected {
            Ok(())
        } else {
            Err(PresenceError::Transport("no discord".into()))
        }
    }

    async fn update(&mut self, detail: &str, state: &str) -> Result<(), PresenceError> {
        let mut s = self.state();
        if !s.connected {
            return Err(PresenceError::NotConnected);
        }
        if !s.accept_update {
            s.connected = false;
            return Err(PresenceError::Transport("pipe closed".into()));
        }
        s.updates.push((detail.to_string(), state.to_string()));
        Ok(())
    }

    async fn clear(&mut self) {
        self.state().clears += 1;
    }

    async fn close(&mut self) {
        let mut s = self.state();
        s.closes += 1;
        s.connected = false;
        if s.panic_on_close {
            drop(s);
            panic!("sink close exploded");
        }
    }
}

pub struct TelemetryState {
    pub readings: Result<Vec<DeviceReading>, MetricsError>,
    pub panics: bool,
    pub calls: usize,
}

#[derive(Clone)]
pub struct FakeTelemetry(Arc<Mutex<TelemetryState>>);

impl FakeTelemetry {
    pub fn new(readings: Vec<DeviceReading>) -> Self {
        Self(Arc::new(Mutex::new(TelemetryState {
            readings: Ok(readings),
            panics: false,
            calls: 0,
        })))
    }

    pub fn state(&self) -> MutexGuard<'_, TelemetryState> {
        self.0.lock().unwrap()
    }

    pub fn set(&self, readings: Result<Vec<DeviceReading>, MetricsError>) {
        self.state().readings = readings;
    }
}

#[async_trait]
impl Telemetry for FakeTelemetry {
    async fn sample_all(&mut self) -> Result<Vec<DeviceReading>, MetricsError> {
        let mut s = self.state();
        s.calls += 1;
        if s.panics {
            drop(s);
            panic!("sensor driver crashed");
        }
        s.readings.clone()
    }
}
