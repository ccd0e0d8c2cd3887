use fahrpc_core::ControlFlags;
use tracing::{info, warn};

/// Ctrl-C and SIGTERM stop the daemon; SIGHUP restarts the presence loop.
pub fn install(flags: ControlFlags) {
    let stop = flags.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received; stopping");
                stop.request_stop();
            }
            Err(e) => warn!(error = %e, "cannot listen for ctrl-c"),
        }
    });

    #[cfg(unix)]
    unix::install(flags);
}

#[cfg(unix)]
mod unix {
    use fahrpc_core::ControlFlags;
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::{info, warn};

    pub fn install(flags: ControlFlags) {
        let stop = flags.clone();
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::spawn(async move {
                    if term.recv().await.is_some() {
                        info!("SIGTERM received; stopping");
                        stop.request_stop();
                    }
                });
            }
            Err(e) => warn!(error = %e, "cannot listen for SIGTERM"),
        }

        match signal(SignalKind::hangup()) {
            Ok(mut hup) => {
                tokio::spawn(async move {
                    while hup.recv().await.is_some() {
                        info!("SIGHUP received; restarting presence loop");
                        flags.request_restart();
                    }
                });
            }
            Err(e) => warn!(error = %e, "cannot listen for SIGHUP"),
        }
    }
}
