//! Command Executor
//!
//! Drives a [`Transport`] through a parsed [`Batch`], one request/response
//! exchange at a time.
//!
//! Exchange states: `Idle -> Sent -> {Received | TimedOut} -> Idle`.
//! Batch states: `Running -> CompletedOnce -> {Looping -> ... | Finished | Cancelled}`.
//!
//! Writes are always followed by a verification read of the same address. In
//! continuous mode the cancel signal is polled only between passes, so a
//! write/verify pair is never split.

mod cancel;
mod outcome;

pub use cancel::{CancelFlag, CancelSignal, NeverCancel};
pub use outcome::{BatchEnd, Outcome, RunSummary};

use std::time::Duration;

use crate::audit::{AuditLog, AuditRecord};
use crate::batch::{Batch, Command};
use crate::error::SessionError;
use crate::protocol::{ProtocolError, Transaction, Transport, WireFormat, DEFAULT_TIMEOUT_MS};

/// Default delay between sending a request and reading its response
pub const DEFAULT_SETTLE_MS: u64 = 50;

/// Default delay between consecutive commands
pub const DEFAULT_GAP_MS: u64 = 200;

/// Timing policy around I/O. Not part of the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Wait after each send before reading
    pub settle: Duration,
    /// Wait between commands, and between passes in continuous mode
    pub gap: Duration,
    /// Bound on waiting for a complete response
    pub timeout: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            gap: Duration::from_millis(DEFAULT_GAP_MS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl Pacing {
    /// No settle or gap delays, with the given response timeout
    pub fn immediate(timeout: Duration) -> Self {
        Self {
            settle: Duration::ZERO,
            gap: Duration::ZERO,
            timeout,
        }
    }
}

/// State of the current request/response exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sent,
    Received,
    TimedOut,
}

/// State of the current batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    CompletedOnce,
    Looping,
    Finished,
    Cancelled,
}

/// Response to a single exchange
enum Reply {
    Received(Transaction),
    TimedOut,
    Invalid(String),
}

/// Executes batches against a single transport, which it owns for the session
pub struct Executor<T: Transport> {
    transport: T,
    format: WireFormat,
    pacing: Pacing,
    exchange_state: ExchangeState,
    batch_state: BatchState,
}

impl<T: Transport> Executor<T> {
    pub fn new(transport: T, format: WireFormat) -> Self {
        Self {
            transport,
            format,
            pacing: Pacing::default(),
            exchange_state: ExchangeState::Idle,
            batch_state: BatchState::Idle,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    pub fn exchange_state(&self) -> ExchangeState {
        self.exchange_state
    }

    pub fn batch_state(&self) -> BatchState {
        self.batch_state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Give the transport back, ending the executor
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run a batch, recording every outcome to `log`
    pub fn run(
        &mut self,
        batch: &Batch,
        log: &mut dyn AuditLog,
        cancel: &dyn CancelSignal,
    ) -> Result<RunSummary, SessionError> {
        self.run_with(batch, log, cancel, &mut |_: &Outcome| {})
    }

    /// Run a batch, also handing each outcome to `observer` as it happens
    pub fn run_with(
        &mut self,
        batch: &Batch,
        log: &mut dyn AuditLog,
        cancel: &dyn CancelSignal,
        observer: &mut dyn FnMut(&Outcome),
    ) -> Result<RunSummary, SessionError> {
        let mut summary = RunSummary::default();

        for text in batch.comments() {
            let outcome = self.execute(&Command::Comment { text: text.clone() }, log)?;
            observer(&outcome);
        }
        if batch.is_continuous() {
            let outcome = self.execute(&Command::Continuous, log)?;
            observer(&outcome);
        }

        self.batch_state = BatchState::Running;
        let result = self.run_passes(batch, log, cancel, observer, &mut summary);
        if result.is_err() {
            self.batch_state = BatchState::Idle;
            self.exchange_state = ExchangeState::Idle;
        }
        result?;

        log.flush()?;
        tracing::debug!(
            "batch ended ({:?}) after {} pass(es)",
            summary.end,
            summary.passes
        );
        Ok(summary)
    }

    fn run_passes(
        &mut self,
        batch: &Batch,
        log: &mut dyn AuditLog,
        cancel: &dyn CancelSignal,
        observer: &mut dyn FnMut(&Outcome),
        summary: &mut RunSummary,
    ) -> Result<(), SessionError> {
        loop {
            for (idx, command) in batch.commands().iter().enumerate() {
                if idx > 0 {
                    pause(self.pacing.gap);
                }
                let outcome = self.execute(command, log)?;
                summary.tally(&outcome);
                observer(&outcome);
            }
            summary.passes += 1;
            self.batch_state = BatchState::CompletedOnce;

            // An empty continuous batch would spin without doing anything
            if !batch.is_continuous() || batch.commands().is_empty() {
                self.batch_state = BatchState::Finished;
                summary.end = BatchEnd::Finished;
                return Ok(());
            }

            if cancel.poll_cancel() {
                self.batch_state = BatchState::Cancelled;
                summary.end = BatchEnd::Cancelled;
                log.record(AuditRecord::note(format!(
                    "continuous run cancelled after {} pass(es)",
                    summary.passes
                )))?;
                tracing::info!("continuous run cancelled after {} pass(es)", summary.passes);
                return Ok(());
            }

            self.batch_state = BatchState::Looping;
            pause(self.pacing.gap);
        }
    }

    /// Execute one command and record its outcome
    pub fn execute(
        &mut self,
        command: &Command,
        log: &mut dyn AuditLog,
    ) -> Result<Outcome, SessionError> {
        let outcome = match command {
            Command::Read { address } => self.read_register(*address)?,
            Command::Write { address, value } => self.write_register(*address, *value)?,
            Command::Delay { seconds } => {
                pause(Duration::try_from_secs_f64(*seconds).unwrap_or_default());
                Outcome::Delayed { seconds: *seconds }
            }
            Command::Comment { text } => Outcome::Comment { text: text.clone() },
            Command::Continuous => Outcome::Continuous,
        };

        if outcome.is_failure() {
            tracing::warn!("{}", outcome);
        } else {
            tracing::info!("{}", outcome);
        }
        log.record(outcome.to_record())?;
        Ok(outcome)
    }

    fn read_register(&mut self, address: u16) -> Result<Outcome, SessionError> {
        let request = Transaction::read(address);
        Ok(match self.exchange(&request)? {
            Reply::Received(reply) => Outcome::ReadValue {
                address: request.address,
                value: reply.value,
            },
            Reply::TimedOut => Outcome::Timeout {
                direction: request.direction,
                address: request.address,
            },
            Reply::Invalid(reason) => Outcome::Rejected {
                direction: request.direction,
                address: request.address,
                reason,
            },
        })
    }

    fn write_register(&mut self, address: u16, value: u16) -> Result<Outcome, SessionError> {
        let request = Transaction::write(address, value);
        self.send(&request)?;
        pause(self.pacing.settle);
        // Anything the target sent in reply to the write must not be taken
        // for the verification response.
        self.transport.clear_input()?;
        self.exchange_state = ExchangeState::Idle;

        let verify = Transaction::read(request.address);
        Ok(match self.exchange(&verify)? {
            Reply::Received(reply) if reply.value == value => Outcome::WriteVerified {
                address: request.address,
                value,
            },
            Reply::Received(reply) => Outcome::WriteVerificationMismatch {
                address: request.address,
                expected: value,
                actual: reply.value,
            },
            Reply::TimedOut => Outcome::Timeout {
                direction: request.direction,
                address: request.address,
            },
            Reply::Invalid(reason) => Outcome::Rejected {
                direction: request.direction,
                address: request.address,
                reason,
            },
        })
    }

    fn send(&mut self, request: &Transaction) -> Result<(), ProtocolError> {
        let bytes = self.format.encode(request);
        self.transport.send(&bytes)?;
        self.exchange_state = ExchangeState::Sent;
        Ok(())
    }

    /// One request/response round trip
    fn exchange(&mut self, request: &Transaction) -> Result<Reply, ProtocolError> {
        self.send(request)?;
        pause(self.pacing.settle);

        let reply = match self
            .transport
            .receive(self.format.packet_len(), self.pacing.timeout)
        {
            Ok(bytes) => {
                self.exchange_state = ExchangeState::Received;
                match self.format.decode(&bytes) {
                    // A write-flagged packet is an echo or ack, never a read-back
                    Ok(reply) if reply.direction != request.direction => {
                        Reply::Invalid(format!("response carries {} flag", reply.direction.label()))
                    }
                    Ok(reply) if reply.address != request.address => Reply::Invalid(format!(
                        "response carries address {:04X}",
                        reply.address
                    )),
                    Ok(reply) => Reply::Received(reply),
                    Err(e) => Reply::Invalid(e.to_string()),
                }
            }
            Err(ProtocolError::Timeout) => {
                self.exchange_state = ExchangeState::TimedOut;
                Reply::TimedOut
            }
            Err(e) if e.is_packet_error() => {
                self.exchange_state = ExchangeState::Received;
                Reply::Invalid(e.to_string())
            }
            Err(e) => {
                self.exchange_state = ExchangeState::Idle;
                return Err(e);
            }
        };

        if matches!(reply, Reply::TimedOut | Reply::Invalid(_)) {
            // Drop a late or partial response so it cannot answer the next request
            self.transport.clear_input()?;
        }
        self.exchange_state = ExchangeState::Idle;
        Ok(reply)
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}
