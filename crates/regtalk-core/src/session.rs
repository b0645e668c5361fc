//! Interactive session
//!
//! Ties the pieces together for one connected target: each submitted line is
//! parsed into a batch against the current aliases and batch files, then run
//! by the executor with every outcome recorded to the audit log.

use crate::audit::{AuditLog, AuditRecord};
use crate::batch::{parse, AliasTable, Batch, FileResolver};
use crate::error::SessionError;
use crate::executor::{CancelSignal, Executor, Outcome, RunSummary};
use crate::protocol::Transport;

/// One connected session
pub struct Session<T: Transport, L: AuditLog> {
    executor: Executor<T>,
    aliases: AliasTable,
    resolver: Box<dyn FileResolver>,
    log: L,
}

impl<T: Transport, L: AuditLog> Session<T, L> {
    pub fn new(
        executor: Executor<T>,
        aliases: AliasTable,
        resolver: Box<dyn FileResolver>,
        log: L,
    ) -> Self {
        Self {
            executor,
            aliases,
            resolver,
            log,
        }
    }

    pub fn executor(&self) -> &Executor<T> {
        &self.executor
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Mutable alias table; changes apply to the next submitted batch
    pub fn aliases_mut(&mut self) -> &mut AliasTable {
        &mut self.aliases
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Parse `text` without running it
    pub fn prepare(&self, text: &str) -> Result<Batch, SessionError> {
        Ok(parse(text, &self.aliases, self.resolver.as_ref())?)
    }

    /// Parse `text` for running, recording a rejected batch to the audit log
    pub fn load(&mut self, text: &str) -> Result<Batch, SessionError> {
        match self.prepare(text) {
            Ok(batch) => Ok(batch),
            Err(e) => {
                tracing::warn!("{}", e);
                self.log.record(AuditRecord::note(e.to_string()))?;
                self.log.flush()?;
                Err(e)
            }
        }
    }

    /// Run a batch already accepted by [`Session::load`]
    pub fn run(
        &mut self,
        batch: &Batch,
        cancel: &dyn CancelSignal,
        observer: &mut dyn FnMut(&Outcome),
    ) -> Result<RunSummary, SessionError> {
        tracing::debug!(
            "running batch of {} command(s){}",
            batch.len(),
            if batch.is_continuous() { ", continuous" } else { "" }
        );
        self.executor.run_with(batch, &mut self.log, cancel, observer)
    }

    /// Parse and run one batch.
    ///
    /// A batch that fails to parse is recorded and rejected before anything
    /// is sent. Errors other than [`SessionError::Batch`] end the session.
    pub fn submit(
        &mut self,
        text: &str,
        cancel: &dyn CancelSignal,
        observer: &mut dyn FnMut(&Outcome),
    ) -> Result<RunSummary, SessionError> {
        let batch = self.load(text)?;
        self.run(&batch, cancel, observer)
    }

    /// Record a session event that is not a command outcome
    pub fn note(&mut self, message: impl Into<String>) -> Result<(), SessionError> {
        self.log.record(AuditRecord::note(message))?;
        Ok(())
    }

    /// End the session, returning the transport and the audit log
    pub fn close(mut self) -> Result<(T, L), SessionError> {
        self.log.flush()?;
        Ok((self.executor.into_transport(), self.log))
    }
}
