//! Session-level errors

use thiserror::Error;

use crate::audit::AuditError;
use crate::batch::BatchError;
use crate::config::ConfigError;
use crate::protocol::ProtocolError;

/// Errors surfaced by a running session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Connection-level failure; ends the session
    #[error("Transport error: {0}")]
    Transport(#[from] ProtocolError),

    /// The submitted batch was rejected before anything was sent
    #[error("Batch rejected: {0}")]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Whether the session can keep accepting batches after this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::Batch(_))
    }
}
