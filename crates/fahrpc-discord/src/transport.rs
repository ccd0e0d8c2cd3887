use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::ipc::IpcError;

/// Byte stream to a Discord client.
pub trait IpcStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> IpcStream for T {}

/// Opens a fresh stream per presence session.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn IpcStream>, IpcError>;
}

const SLOTS: u8 = 10;

/// Unix sockets or Windows named pipes, tried in order.
#[derive(Debug, Clone)]
pub struct LocalIpcConnector {
    endpoints: Vec<PathBuf>,
}

impl LocalIpcConnector {
    pub fn discover() -> Self {
        Self {
            endpoints: default_endpoints(),
        }
    }

    pub fn with_endpoints(endpoints: Vec<PathBuf>) -> Self {
        Self { endpoints }
    }

    pub fn endpoints(&self) -> &[PathBuf] {
        &self.endpoints
    }
}

#[cfg(unix)]
fn default_endpoints() -> Vec<PathBuf> {
    unix_endpoints(|key| std::env::var(key).ok())
}

#[cfg(windows)]
fn default_endpoints() -> Vec<PathBuf> {
    (0..SLOTS)
        .map(|i| PathBuf::from(format!(r"\\?\pipe\discord-ipc-{i}")))
        .collect()
}

#[cfg(not(any(unix, windows)))]
fn default_endpoints() -> Vec<PathBuf> {
    Vec::new()
}

/// Runtime directories first, then the sandboxed client layouts under each.
pub fn unix_endpoints(env: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut bases: Vec<PathBuf> = Vec::new();
    for key in ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"] {
        if let Some(dir) = env(key).filter(|d| !d.is_empty()) {
            let dir = PathBuf::from(dir);
            if !bases.contains(&dir) {
                bases.push(dir);
            }
        }
    }
    let tmp = PathBuf::from("/tmp");
    if !bases.contains(&tmp) {
        bases.push(tmp);
    }

    let mut endpoints = Vec::new();
    for base in &bases {
        for sub in ["", "snap.discord", "app/com.discordapp.Discord"] {
            for i in 0..SLOTS {
                endpoints.push(base.join(sub).join(format!("discord-ipc-{i}")));
            }
        }
    }
    endpoints
}

#[async_trait]
impl Connector for LocalIpcConnector {
    async fn connect(&self) -> Result<Box<dyn IpcStream>, IpcError> {
        for endpoint in &self.endpoints {
            match open(endpoint).await {
                Ok(stream) => {
                    debug!(endpoint = %endpoint.display(), "discord ipc endpoint opened");
                    return Ok(stream);
                }
                Err(e) => debug!(endpoint = %endpoint.display(), error = %e, "endpoint refused"),
            }
        }
        Err(IpcError::NoEndpoint)
    }
}

#[cfg(unix)]
async fn open(endpoint: &std::path::Path) -> std::io::Result<Box<dyn IpcStream>> {
    let stream = tokio::net::UnixStream::connect(endpoint).await?;
    Ok(Box::new(stream))
}

#[cfg(windows)]
async fn open(endpoint: &std::path::Path) -> std::io::Result<Box<dyn IpcStream>> {
    let pipe = tokio::net::windows::named_pipe::ClientOptions::new().open(endpoint)?;
    Ok(Box::new(pipe))
}

#[cfg(not(any(unix, windows)))]
async fn open(_endpoint: &std::path::Path) -> std::io::Result<Box<dyn IpcStream>> {
    Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_endpoints_follow_env_order() {
        let endpoints = unix_endpoints(|key| match key {
            "XDG_RUNTIME_DIR" => Some("/run/user/1000".into()),
            "TMPDIR" => Some("/tmp".into()),
            _ => None,
        });
        assert_eq!(endpoints.len(), 2 * 3 * 10);
        assert_eq!(endpoints[0], PathBuf::from("/run/user/1000/discord-ipc-0"));
        assert_eq!(
            endpoints[10],
            PathBuf::from("/run/user/1000/snap.discord/discord-ipc-0")
        );
        assert_eq!(
            endpoints[29],
            PathBuf::from("/run/user/1000/app/com.discordapp.Discord/discord-ipc-9")
        );
        assert_eq!(endpoints[30], PathBuf::from("/tmp/discord-ipc-0"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn connects_to_first_listening_socket() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("discord-ipc-1");
        let _listener = tokio::net::UnixListener::bind(&live).unwrap();

        let connector = LocalIpcConnector::with_endpoints(vec![
            dir.path().join("discord-ipc-0"),
            live,
        ]);
        assert!(connector.connect().await.is_ok());

        let none = LocalIpcConnector::with_endpoints(vec![dir.path().join("discord-ipc-5")]);
        assert!(matches!(none.connect().await, Err(IpcError::NoEndpoint)));
    }
}
