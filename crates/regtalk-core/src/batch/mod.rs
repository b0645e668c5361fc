//! Command Batches
//!
//! Parses `;`-separated command text into an immutable sequence of register
//! commands, expanding aliases and batch files on the way.

mod alias;
mod error;
mod parser;
mod resolver;

pub use alias::AliasTable;
pub use error::BatchError;
pub use parser::{parse, MAX_EXPANSION_DEPTH};
pub use resolver::{DirResolver, FileResolver, NoFiles, ResolvedFile, BATCH_FILE_EXTENSION};

use serde::{Deserialize, Serialize};

/// A single parsed command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Read one register
    Read { address: u16 },
    /// Write one register, then read it back
    Write { address: u16, value: u16 },
    /// Pause the executor
    Delay { seconds: f64 },
    /// Repeat the whole batch until cancelled
    Continuous,
    /// Free text recorded to the audit log
    Comment { text: String },
}

/// A validated, ordered batch of commands
///
/// Only `Read`, `Write` and `Delay` are sequenced. `cont` tokens set the
/// continuous flag and `#` tokens are kept as comments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    commands: Vec<Command>,
    continuous: bool,
    comments: Vec<String>,
}

impl Batch {
    /// Sequenced commands in submission order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Whether the batch repeats until cancelled
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    /// Comment tokens, in the order they appeared
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Number of sequenced commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if nothing would be sent or logged
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.comments.is_empty()
    }

    fn push(&mut self, command: Command) {
        match command {
            Command::Continuous => self.continuous = true,
            Command::Comment { text } => self.comments.push(text),
            other => self.commands.push(other),
        }
    }
}
