use std::time::Duration;

use async_trait::async_trait;
use fahrpc_core::config::{Button, DiscordConfig};
use fahrpc_core::time::local_midnight_epoch;
use fahrpc_core::{PresenceError, PresenceSink};
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use crate::ipc::{read_frame, write_frame, IpcError, Opcode};
use crate::transport::{Connector, IpcStream, LocalIpcConnector};

/// Bound on every connect or request/reply exchange.
pub const IO_TIMEOUT: Duration = Duration::from_secs(5);
pub const MIN_LINE_CHARS: usize = 2;
pub const MAX_LINE_CHARS: usize = 128;

/// Discord trims whitespace before checking length, so short lines are
/// padded with a blank that is not whitespace.
const PAD: char = '\u{2800}';

/// Rich presence over the local Discord IPC endpoint.
pub struct DiscordPresence {
    client_id: String,
    large_image: String,
    buttons: Vec<Button>,
    connector: Box<dyn Connector>,
    stream: Option<Box<dyn IpcStream>>,
    pid: u32,
}

impl DiscordPresence {
    pub fn from_config(config: &DiscordConfig) -> Self {
        Self::with_connector(config, Box::new(LocalIpcConnector::discover()))
    }

    pub fn with_connector(config: &DiscordConfig, connector: Box<dyn Connector>) -> Self {
        Self {
            client_id: config.client_id.clone(),
            large_image: config.large_image.clone(),
            buttons: config.buttons.clone(),
            connector,
            stream: None,
            pid: std::process::id(),
        }
    }

    pub fn activity(&self, detail: &str, state: &str, start: i64) -> Value {
        let mut activity = json!({
            "details": fit_line(detail),
            "state": fit_line(state),
            "assets": { "large_image": self.large_image },
            "timestamps": { "start": start },
        });
        if !self.buttons.is_empty() {
            activity["buttons"] = json!(self.buttons);
        }
        activity
    }

    async fn set_activity(&mut self, activity: Value) -> Result<(), PresenceError> {
        let nonce = Uuid::new_v4().to_string();
        let request = json!({
            "cmd": "SET_ACTIVITY",
            "args": { "pid": self.pid, "activity": activity },
            "nonce": nonce,
        });
        let Some(stream) = self.stream.as_mut() else {
            return Err(PresenceError::NotConnected);
        };

        let result = match timeout(IO_TIMEOUT, exchange(stream, &request, &nonce)).await {
            Ok(result) => result,
            Err(_) => Err(IpcError::Timeout),
        };
        match result {
            Ok(reply) if reply["evt"] == "ERROR" => {
                self.stream = None;
                Err(PresenceError::Rejected(reason(&reply["data"])))
            }
            Ok(_) => Ok(()),
            Err(e) => {
                self.stream = None;
                Err(PresenceError::Transport(e.to_string()))
            }
        }
    }
}

/// Opens a stream and performs the version 1 handshake.
async fn open_session(
    connector: &dyn Connector,
    client_id: &str,
) -> Result<Box<dyn IpcStream>, IpcError> {
    let mut stream = connector.connect().await?;
    write_frame(
        &mut stream,
        Opcode::Handshake,
        &json!({ "v": 1, "client_id": client_id }),
    )
    .await?;

    let reply = read_frame(&mut stream).await?;
    match reply.opcode {
        Opcode::Frame if reply.payload["cmd"] == "DISPATCH" && reply.payload["evt"] == "READY" => {
            Ok(stream)
        }
        Opcode::Close => Err(IpcError::Closed(reason(&reply.payload))),
        _ => Err(IpcError::Unexpected(reply.payload.to_string())),
    }
}

/// Sends one command and waits for the reply carrying the same nonce,
/// answering pings on the way.
async fn exchange(
    stream: &mut Box<dyn IpcStream>,
    request: &Value,
    nonce: &str,
) -> Result<Value, IpcError> {
    write_frame(stream, Opcode::Frame, request).await?;
    loop {
        let frame = read_frame(stream).await?;
        match frame.opcode {
            Opcode::Ping => write_frame(stream, Opcode::Pong, &frame.payload).await?,
            Opcode::Close => return Err(IpcError::Closed(reason(&frame.payload))),
            Opcode::Frame if frame.payload["nonce"] == nonce => return Ok(frame.payload),
            _ => {}
        }
    }
}

fn reason(payload: &Value) -> String {
    payload["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

/// Fits a line into Discord's 2..=128 character window.
pub fn fit_line(line: &str) -> String {
    let count = line.chars().count();
    if count > MAX_LINE_CHARS {
        let mut out: String = line.chars().take(MAX_LINE_CHARS - 1).collect();
        out.push('…');
        return out;
    }
    let mut out = line.to_string();
    for _ in count..MIN_LINE_CHARS {
        out.push(PAD);
    }
    out
}

#[async_trait]
impl PresenceSink for DiscordPresence {
    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn connect(&mut self) -> Result<(), PresenceError> {
        self.stream = None;
        let opened = match timeout(
            IO_TIMEOUT,
            open_session(self.connector.as_ref(), &self.client_id),
        )
        .await
        {
            Ok(opened) => opened,
            Err(_) => Err(IpcError::Timeout),
        };
        match opened {
            Ok(stream) => {
                debug!("discord handshake complete");
                self.stream = Some(stream);
                Ok(())
            }
            Err(e @ (IpcError::Closed(_) | IpcError::Unexpected(_))) => {
                Err(PresenceError::Rejected(e.to_string()))
            }
            Err(e) => Err(PresenceError::Transport(e.to_string())),
        }
    }

    async fn update(&mut self, detail: &str, state: &str) -> Result<(), PresenceError> {
        let activity = self.activity(detail, state, local_midnight_epoch());
        self.set_activity(activity).await
    }

    async fn clear(&mut self) {
        if self.stream.is_none() {
            return;
        }
        if let Err(e) = self.set_activity(Value::Null).await {
            debug!(error = %e, "presence clear failed");
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = timeout(IO_TIMEOUT, write_frame(&mut stream, Opcode::Close, &json!({}))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::io::DuplexStream;

    struct Pipes(Mutex<VecDeque<DuplexStream>>);

    #[async_trait]
    impl Connector for Pipes {
        async fn connect(&self) -> Result<Box<dyn IpcStream>, IpcError> {
            match self.0.lock().unwrap().pop_front() {
                Some(s) => Ok(Box::new(s)),
                None => Err(IpcError::NoEndpoint),
            }
        }
    }

    fn presence(servers: usize) -> (DiscordPresence, Vec<DuplexStream>) {
        let mut clients = VecDeque::new();
        let mut ends = Vec::new();
        for _ in 0..servers {
            let (client, server) = tokio::io::duplex(64 * 1024);
            clients.push_back(client);
            ends.push(server);
        }
        let p = DiscordPresence::with_connector(
            &DiscordConfig::default(),
            Box::new(Pipes(Mutex::new(clients))),
        );
        (p, ends)
    }

    async fn accept_handshake(server: &mut DuplexStream) {
        let hello = read_frame(server).await.unwrap();
        assert_eq!(hello.opcode, Opcode::Handshake);
        assert_eq!(hello.payload["v"], 1);
        assert_eq!(hello.payload["client_id"], "1457701520673079501");
        write_frame(
            server,
            Opcode::Frame,
            &json!({"cmd": "DISPATCH", "evt": "READY", "data": {"v": 1}}),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn handshake_update_and_close() {
        let (mut p, mut servers) = presence(1);
        let mut server = servers.remove(0);
        let script = tokio::spawn(async move {
            accept_handshake(&mut server).await;

            let req = read_frame(&mut server).await.unwrap();
            assert_eq!(req.payload["cmd"], "SET_ACTIVITY");
            let activity = &req.payload["args"]["activity"];
            assert_eq!(activity["details"], "pTotal: 1,234");
            assert_eq!(activity["state"], "WUs Completed: 89");
            assert_eq!(activity["assets"]["large_image"], "folding-at-home-logo");
            assert_eq!(activity["buttons"][0]["label"], "Start Folding");
            assert!(activity["timestamps"]["start"].as_i64().unwrap() > 0);
            let nonce = req.payload["nonce"].clone();
            write_frame(
                &mut server,
                Opcode::Frame,
                &json!({"cmd": "SET_ACTIVITY", "evt": null, "nonce": nonce}),
            )
            .await
            .unwrap();

            let bye = read_frame(&mut server).await.unwrap();
            assert_eq!(bye.opcode, Opcode::Close);
        });

        p.connect().await.unwrap();
        assert!(p.is_connected());
        p.update("pTotal: 1,234", "WUs Completed: 89").await.unwrap();
        p.close().await;
        assert!(!p.is_connected());
        script.await.unwrap();
    }

    #[tokio::test]
    async fn rejected_update_disconnects() {
        let (mut p, mut servers) = presence(1);
        let mut server = servers.remove(0);
        tokio::spawn(async move {
            accept_handshake(&mut server).await;
            let req = read_frame(&mut server).await.unwrap();
            write_frame(
                &mut server,
                Opcode::Frame,
                &json!({
                    "cmd": "SET_ACTIVITY",
                    "evt": "ERROR",
                    "nonce": req.payload["nonce"],
                    "data": {"code": 4000, "message": "child \"activity\" fails"},
                }),
            )
            .await
            .unwrap();
            let _ = read_frame(&mut server).await;
        });

        p.connect().await.unwrap();
        let err = p.update("a", "b").await.unwrap_err();
        assert!(matches!(err, PresenceError::Rejected(ref m) if m.contains("activity")));
        assert!(!p.is_connected());
    }

    #[tokio::test]
    async fn pings_are_answered_mid_exchange() {
        let (mut p, mut servers) = presence(1);
        let mut server = servers.remove(0);
        let script = tokio::spawn(async move {
            accept_handshake(&mut server).await;
            let req = read_frame(&mut server).await.unwrap();
            write_frame(&mut server, Opcode::Ping, &json!({"t": 7})).await.unwrap();
            let pong = read_frame(&mut server).await.unwrap();
            assert_eq!(pong.opcode, Opcode::Pong);
            assert_eq!(pong.payload["t"], 7);
            write_frame(
                &mut server,
                Opcode::Frame,
                &json!({"cmd": "SET_ACTIVITY", "nonce": req.payload["nonce"]}),
            )
            .await
            .unwrap();
            server
        });

        p.connect().await.unwrap();
        p.clear().await;
        assert!(p.is_connected());
        drop(script.await.unwrap());
    }

    #[tokio::test]
    async fn closed_handshake_is_rejected() {
        let (mut p, mut servers) = presence(1);
        let mut server = servers.remove(0);
        tokio::spawn(async move {
            let _ = read_frame(&mut server).await;
            write_frame(
                &mut server,
                Opcode::Close,
                &json!({"code": 4000, "message": "Invalid Client ID"}),
            )
            .await
            .unwrap();
        });

        let err = p.connect().await.unwrap_err();
        assert!(matches!(err, PresenceError::Rejected(ref m) if m.contains("Invalid Client ID")));
        assert!(!p.is_connected());
    }

    #[tokio::test]
    async fn dead_pipe_fails_update() {
        let (mut p, mut servers) = presence(1);
        let mut server = servers.remove(0);
        let script = tokio::spawn(async move {
            accept_handshake(&mut server).await;
            server
        });
        p.connect().await.unwrap();
        drop(script.await.unwrap());

        let err = p.update("a", "b").await.unwrap_err();
        assert!(matches!(err, PresenceError::Transport(_)));
        assert!(!p.is_connected());
        assert!(matches!(
            p.update("a", "b").await,
            Err(PresenceError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_times_out() {
        let (mut p, mut servers) = presence(1);
        let mut server = servers.remove(0);
        let script = tokio::spawn(async move {
            accept_handshake(&mut server).await;
            let _ = read_frame(&mut server).await;
            server
        });
        p.connect().await.unwrap();
        let err = p.update("a", "b").await.unwrap_err();
        assert!(matches!(err, PresenceError::Transport(ref m) if m.contains("timed out")));
        drop(script.await.unwrap());
    }

    #[tokio::test]
    async fn no_endpoint_is_a_transport_failure() {
        let (mut p, _) = presence(0);
        assert!(matches!(
            p.connect().await,
            Err(PresenceError::Transport(_))
        ));
        p.clear().await;
        p.close().await;
    }

    #[test]
    fn lines_fit_discord_limits() {
        assert_eq!(fit_line("ok"), "ok");
        assert_eq!(fit_line("a").chars().count(), 2);
        assert_eq!(fit_line("").chars().count(), 2);
        let long = "é".repeat(200);
        let fitted = fit_line(&long);
        assert_eq!(fitted.chars().count(), MAX_LINE_CHARS);
        assert!(fitted.ends_with('…'));
    }

    #[test]
    fn activity_omits_empty_buttons() {
        let config = DiscordConfig {
            buttons: vec![],
            ..DiscordConfig::default()
        };
        let p = DiscordPresence::with_connector(
            &config,
            Box::new(Pipes(Mutex::new(VecDeque::new()))),
        );
        let activity = p.activity("detail", "state", 1_700_000_000);
        assert!(activity.get("buttons").is_none());
        assert_eq!(activity["timestamps"]["start"], 1_700_000_000);
    }
}
