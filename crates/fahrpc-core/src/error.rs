use thiserror::Error;

use crate::model::Vendor;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("task snapshot has {task_ids} task ids but {percentages} percentages")]
    LengthMismatch { task_ids: usize, percentages: usize },
}

/// Hard failure of the local control endpoint.
#[derive(Debug, Clone, Error)]
pub enum ProgressError {
    #[error("control endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("control endpoint returned HTTP {0}")]
    Status(u16),
    #[error("control page has no client markup")]
    MarkupMissing,
    #[error("page renderer failed: {0}")]
    Render(String),
}

#[derive(Debug, Clone, Error)]
pub enum PresenceError {
    #[error("presence service not connected")]
    NotConnected,
    #[error("presence transport failed: {0}")]
    Transport(String),
    #[error("presence service rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Error)]
pub enum MetricsError {
    #[error("{vendor} tooling unavailable: {reason}")]
    Unavailable { vendor: Vendor, reason: String },
    #[error("query for device {device} failed: {reason}")]
    Query { device: String, reason: String },
    #[error("devices have not been enumerated")]
    NotEnumerated,
}

/// Failures that abort a tick without a dedicated handler.
#[derive(Debug, Clone, Error)]
pub enum TickError {
    #[error(transparent)]
    Model(#[from] ModelError),
}
