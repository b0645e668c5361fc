//! Reported outcomes of executed commands

use serde::Serialize;
use std::fmt;

use crate::audit::AuditRecord;
use crate::protocol::Direction;

/// Result of executing one command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A read returned a value
    ReadValue { address: u16, value: u16 },
    /// The verification read returned the written value
    WriteVerified { address: u16, value: u16 },
    /// The verification read returned something else
    WriteVerificationMismatch {
        address: u16,
        expected: u16,
        actual: u16,
    },
    /// No complete response arrived in time
    Timeout { direction: Direction, address: u16 },
    /// A response arrived but could not be accepted
    Rejected {
        direction: Direction,
        address: u16,
        reason: String,
    },
    Delayed { seconds: f64 },
    Comment { text: String },
    /// Continuous mode marker
    Continuous,
}

impl Outcome {
    /// Build the audit record for this outcome
    pub fn to_record(&self) -> AuditRecord {
        let message = self.to_string();
        match self {
            Outcome::ReadValue { address, value } => {
                AuditRecord::new(message, Some(Direction::Read), Some(*address), Some(*value))
            }
            Outcome::WriteVerified { address, value } => {
                AuditRecord::new(message, Some(Direction::Write), Some(*address), Some(*value))
            }
            Outcome::WriteVerificationMismatch {
                address, actual, ..
            } => AuditRecord::new(message, Some(Direction::Write), Some(*address), Some(*actual)),
            Outcome::Timeout { direction, address }
            | Outcome::Rejected {
                direction, address, ..
            } => AuditRecord::new(message, Some(*direction), Some(*address), None),
            Outcome::Delayed { .. } | Outcome::Comment { .. } | Outcome::Continuous => {
                AuditRecord::note(message)
            }
        }
    }

    /// Whether the outcome should be surfaced as a warning
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Outcome::WriteVerificationMismatch { .. }
                | Outcome::Timeout { .. }
                | Outcome::Rejected { .. }
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::ReadValue { address, value } => {
                write!(f, "read {:04X} = {:04X}", address, value)
            }
            Outcome::WriteVerified { address, value } => {
                write!(f, "write {:04X} = {:04X} verified", address, value)
            }
            Outcome::WriteVerificationMismatch {
                address,
                expected,
                actual,
            } => write!(
                f,
                "write {:04X} verification mismatch: wrote {:04X}, read back {:04X}",
                address, expected, actual
            ),
            Outcome::Timeout { direction, address } => match direction {
                Direction::Read => write!(f, "read {:04X} timed out", address),
                Direction::Write => write!(f, "write {:04X} verification timed out", address),
            },
            Outcome::Rejected {
                direction,
                address,
                reason,
            } => write!(
                f,
                "{} {:04X} response rejected: {}",
                match direction {
                    Direction::Read => "read",
                    Direction::Write => "write",
                },
                address,
                reason
            ),
            Outcome::Delayed { seconds } => write!(f, "delay {}s", seconds),
            Outcome::Comment { text } => write!(f, "# {}", text),
            Outcome::Continuous => f.write_str("continuous mode"),
        }
    }
}

/// How a batch run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchEnd {
    #[default]
    Finished,
    Cancelled,
}

/// Counts of what happened during one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub end: BatchEnd,
    /// Completed passes over the command sequence
    pub passes: u64,
    pub reads: u64,
    pub verified: u64,
    pub mismatches: u64,
    pub timeouts: u64,
    pub rejected: u64,
}

impl RunSummary {
    pub(crate) fn tally(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::ReadValue { .. } => self.reads += 1,
            Outcome::WriteVerified { .. } => self.verified += 1,
            Outcome::WriteVerificationMismatch { .. } => self.mismatches += 1,
            Outcome::Timeout { .. } => self.timeouts += 1,
            Outcome::Rejected { .. } => self.rejected += 1,
            Outcome::Delayed { .. } | Outcome::Comment { .. } | Outcome::Continuous => {}
        }
    }

    /// True if every exchange succeeded
    pub fn is_clean(&self) -> bool {
        self.mismatches == 0 && self.timeouts == 0 && self.rejected == 0
    }
}
