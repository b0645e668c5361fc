//! Error types for batch parsing

use thiserror::Error;

/// Errors that invalidate a whole batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Unrecognized command '{0}'")]
    BadToken(String),

    #[error("Alias/file expansion cycle at '{name}' (chain: {chain})")]
    AliasFileCycle { name: String, chain: String },

    #[error("Cannot read batch file '{path}': {message}")]
    FileRead { path: String, message: String },
}
