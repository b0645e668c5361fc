//! Audit Trail
//!
//! Append-only record of every outcome reported by the executor.

mod recorder;

pub use recorder::CsvAuditLog;

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::protocol::Direction;

/// Errors raised while writing the audit trail
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audit log CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Audit log is closed")]
    Closed,
}

/// A single audit entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub direction: Option<Direction>,
    pub address: Option<u16>,
    pub value: Option<u16>,
}

impl AuditRecord {
    /// Create a record stamped with the current local time
    pub fn new(
        message: impl Into<String>,
        direction: Option<Direction>,
        address: Option<u16>,
        value: Option<u16>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
            direction,
            address,
            value,
        }
    }

    /// A record with no register attached (comments, session events)
    pub fn note(message: impl Into<String>) -> Self {
        Self::new(message, None, None, None)
    }
}

/// Sink for audit records
pub trait AuditLog {
    /// Append one record
    fn record(&mut self, record: AuditRecord) -> Result<(), AuditError>;

    /// Push buffered records to durable storage
    fn flush(&mut self) -> Result<(), AuditError> {
        Ok(())
    }
}

impl<L: AuditLog + ?Sized> AuditLog for &mut L {
    fn record(&mut self, record: AuditRecord) -> Result<(), AuditError> {
        (**self).record(record)
    }

    fn flush(&mut self) -> Result<(), AuditError> {
        (**self).flush()
    }
}

/// In-memory audit log
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLog {
    records: Vec<AuditRecord>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, oldest first
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    /// Messages of all records, oldest first
    pub fn messages(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.message.as_str()).collect()
    }
}

impl AuditLog for MemoryAuditLog {
    fn record(&mut self, record: AuditRecord) -> Result<(), AuditError> {
        self.records.push(record);
        Ok(())
    }
}
