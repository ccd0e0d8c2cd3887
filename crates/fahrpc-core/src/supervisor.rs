//! Owns the presence loop task: starts it, restarts it on request, stops it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::reconcile::ReconciliationLoop;

/// Restart and stop requests shared with signal handlers and other front ends.
///
/// Front ends only ever set a flag; the supervisor polls them and clears
/// `restart` when it starts a fresh loop.
#[derive(Debug, Clone, Default)]
pub struct ControlFlags {
    restart: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl ControlFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_restart(&self) {
        self.restart.store(true, Ordering::SeqCst);
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn restart_requested(&self) -> bool {
        self.restart.load(Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn clear_restart(&self) {
        self.restart.store(false, Ordering::SeqCst);
    }
}

/// Builds a fresh loop, with fresh leaf sessions, for every generation.
#[async_trait]
pub trait LoopFactory: Send + Sync {
    async fn build(&self) -> Result<ReconciliationLoop>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorTiming {
    pub poll_every: Duration,
    pub settle: Duration,
    pub restart_delay: Duration,
}

impl Default for SupervisorTiming {
    fn default() -> Self {
        Self {
            poll_every: Duration::from_secs(1),
            settle: Duration::from_millis(500),
            restart_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SupervisorSummary {
    /// Loops started, including the first.
    pub generations: u32,
}

pub struct LifecycleSupervisor {
    flags: ControlFlags,
    timing: SupervisorTiming,
}

impl LifecycleSupervisor {
    pub fn new(flags: ControlFlags) -> Self {
        Self {
            flags,
            timing: SupervisorTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: SupervisorTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn flags(&self) -> &ControlFlags {
        &self.flags
    }

    /// Runs generations of the loop until stop is requested. Returns early only
    /// when the factory cannot build a loop.
    pub async fn run<F>(&self, factory: &F) -> Result<SupervisorSummary>
    where
        F: LoopFactory + ?Sized,
    {
        let mut summary = SupervisorSummary::default();

        while !self.flags.stop_requested() {
            self.flags.clear_restart();
            let presence_loop = factory.build().await.context("building presence loop")?;
            summary.generations += 1;
            info!(generation = summary.generations, "starting presence loop");

            let (cancel_tx, cancel_rx) = watch::channel(false);
            let mut handle = tokio::spawn(presence_loop.run(cancel_rx));

            let finished = loop {
                tokio::select! {
                    joined = &mut handle => break Some(joined),
                    _ = sleep(self.timing.poll_every) => {
                        if self.flags.stop_requested() || self.flags.restart_requested() {
                            break None;
                        }
                    }
                }
            };

            let joined = match finished {
                Some(joined) => joined,
                None => {
                    let _ = cancel_tx.send(true);
                    handle.await
                }
            };
            report_exit(joined);

            sleep(self.timing.settle).await;
            if self.flags.stop_requested() {
                break;
            }
            info!("restarting presence loop");
            sleep(self.timing.restart_delay).await;
        }

        info!(generations = summary.generations, "supervisor stopped");
        Ok(summary)
    }
}

fn report_exit(joined: std::result::Result<(), JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_panic() => error!(error = %e, "presence loop panicked"),
        Err(e) => warn!(error = %e, "presence loop task ended abnormally"),
    }
}
