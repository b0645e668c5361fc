//! # regtalk Core Library
//!
//! Core functionality for talking to register-addressed targets.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - The register read/write wire protocol (compact and framed packets)
//! - TCP and serial transports
//! - Batch command parsing with aliases and batch files
//! - Batch execution with write verification and continuous mode
//! - CSV audit logging
//! - Session configuration
//! - A simulated target for testing
//!
//! ## Example
//!
//! ```rust,ignore
//! use regtalk_core::prelude::*;
//!
//! let config = SessionConfig::load("regtalk.cfg")?;
//! let format = config.product.unwrap_or(Product::Drx).wire_format(DEFAULT_MESSAGE_TYPE);
//! let transport = connect(&config.target()?, Duration::from_secs(5))?;
//!
//! let mut session = Session::new(
//!     Executor::new(transport, format),
//!     config.aliases().clone(),
//!     Box::new(DirResolver::current_dir()),
//!     CsvAuditLog::open("regtalk_log.csv")?,
//! );
//! session.submit("w 10 1; r 602b", &NeverCancel, &mut |o| println!("{}", o))?;
//! ```

pub mod audit;
pub mod batch;
pub mod config;
mod error;
pub mod executor;
pub mod protocol;
pub mod session;
pub mod sim;

pub use error::SessionError;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::audit::{AuditLog, AuditRecord, CsvAuditLog, MemoryAuditLog};
    pub use crate::batch::{parse, AliasTable, Batch, Command, DirResolver, NoFiles};
    pub use crate::config::{Product, SessionConfig};
    pub use crate::executor::{
        CancelFlag, CancelSignal, Executor, NeverCancel, Outcome, Pacing, RunSummary,
    };
    pub use crate::protocol::{
        connect, ChannelTransport, Direction, Transport, TransportTarget, WireFormat,
        DEFAULT_MESSAGE_TYPE,
    };
    pub use crate::session::Session;
    pub use crate::sim::RegisterBank;
    pub use crate::SessionError;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
