//! Discord rich presence over the local IPC socket.

pub mod ipc;
pub mod presence;
pub mod transport;

pub use ipc::IpcError;
pub use presence::DiscordPresence;
pub use transport::{Connector, IpcStream, LocalIpcConnector};
