//! Discord local IPC framing: `u32` opcode, `u32` length, both little endian,
//! followed by a JSON payload.

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on an incoming payload.
pub const MAX_FRAME_LEN: u32 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl TryFrom<u32> for Opcode {
    type Error = IpcError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Ok(match raw {
            0 => Opcode::Handshake,
            1 => Opcode::Frame,
            2 => Opcode::Close,
            3 => Opcode::Ping,
            4 => Opcode::Pong,
            other => return Err(IpcError::UnknownOpcode(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub opcode: Opcode,
    pub payload: Value,
}

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("ipc i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("ipc payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown ipc opcode {0}")]
    UnknownOpcode(u32),
    #[error("ipc frame of {0} bytes exceeds the limit")]
    TooLarge(u32),
    #[error("discord closed the connection: {0}")]
    Closed(String),
    #[error("unexpected reply: {0}")]
    Unexpected(String),
    #[error("ipc exchange timed out")]
    Timeout,
    #[error("no discord ipc endpoint accepted a connection")]
    NoEndpoint,
}

pub fn encode(opcode: Opcode, payload: &Value) -> Result<Vec<u8>, IpcError> {
    let body = serde_json::to_vec(payload)?;
    let len = u32::try_from(body.len()).map_err(|_| IpcError::TooLarge(u32::MAX))?;
    let mut buf = Vec::with_capacity(8 + body.len());
    buf.extend_from_slice(&(opcode as u32).to_le_bytes());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

pub async fn write_frame<W>(w: &mut W, opcode: Opcode, payload: &Value) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let buf = encode(opcode, payload)?;
    w.write_all(&buf).await?;
    w.flush().await?;
    Ok(())
}

pub async fn read_frame<R>(r: &mut R) -> Result<Frame, IpcError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; 8];
    r.read_exact(&mut header).await?;
    let opcode = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    let opcode = Opcode::try_from(opcode)?;
    if len > MAX_FRAME_LEN {
        return Err(IpcError::TooLarge(len));
    }

    let mut body = vec![0u8; len as usize];
    r.read_exact(&mut body).await?;
    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)?
    };
    Ok(Frame { opcode, payload })
}
