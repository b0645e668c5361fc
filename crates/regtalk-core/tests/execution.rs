//! Batch execution against an in-process simulated target

use pretty_assertions::assert_eq;
use regtalk_core::audit::MemoryAuditLog;
use regtalk_core::batch::{parse, AliasTable, Batch, NoFiles};
use regtalk_core::executor::{
    BatchEnd, BatchState, CancelFlag, Executor, NeverCancel, Outcome, Pacing,
};
use regtalk_core::protocol::{ProtocolError, Transport, WireFormat};
use regtalk_core::sim::RegisterBank;
use std::collections::VecDeque;
use std::time::Duration;

/// Transport that hands every packet straight to a register bank
struct BankTransport {
    bank: RegisterBank,
    pending: VecDeque<u8>,
    sent: Vec<Vec<u8>>,
    /// Fire `cancel` once this many packets have been sent
    cancel_after: Option<(usize, CancelFlag)>,
}

impl BankTransport {
    fn new(bank: RegisterBank) -> Self {
        Self {
            bank,
            pending: VecDeque::new(),
            sent: Vec::new(),
            cancel_after: None,
        }
    }
}

impl Transport for BankTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.sent.push(bytes.to_vec());
        if let Some(reply) = self.bank.handle(bytes) {
            self.pending.extend(reply);
        }
        if let Some((count, flag)) = &self.cancel_after {
            if self.sent.len() >= *count {
                flag.cancel();
            }
        }
        Ok(())
    }

    fn receive(&mut self, len: usize, _timeout: Duration) -> Result<Vec<u8>, ProtocolError> {
        if self.pending.len() < len {
            return Err(ProtocolError::Timeout);
        }
        Ok(self.pending.drain(..len).collect())
    }

    fn clear_input(&mut self) -> Result<(), ProtocolError> {
        self.pending.clear();
        Ok(())
    }
}

fn executor(transport: BankTransport) -> Executor<BankTransport> {
    let format = transport.bank.format();
    Executor::new(transport, format).with_pacing(Pacing::immediate(Duration::from_millis(10)))
}

fn batch(text: &str) -> Batch {
    parse(text, &AliasTable::new(), &NoFiles).unwrap()
}

#[test]
fn test_write_verify_against_echoing_target() {
    for format in [WireFormat::Compact, WireFormat::Framed { message_type: 1 }] {
        let mut exec = executor(BankTransport::new(RegisterBank::new(format)));
        let mut log = MemoryAuditLog::new();

        let summary = exec
            .run(&batch("w 1000 abcd; r 1000"), &mut log, &NeverCancel)
            .unwrap();

        assert_eq!(summary.verified, 1);
        assert_eq!(summary.reads, 1);
        assert!(summary.is_clean());
        assert_eq!(
            log.messages(),
            vec!["write 1000 = ABCD verified", "read 1000 = ABCD"]
        );
        // write, verification read, read
        assert_eq!(exec.transport().sent.len(), 3);
    }
}

#[test]
fn test_write_verify_mismatch_is_reported() {
    let bank = RegisterBank::new(WireFormat::Compact)
        .with_register(0x10, 0x0007)
        .with_read_only(0x10);
    let mut exec = executor(BankTransport::new(bank));
    let mut log = MemoryAuditLog::new();
    let mut outcomes = Vec::new();

    let summary = exec
        .run_with(
            &batch("w 10 1; r 11"),
            &mut log,
            &NeverCancel,
            &mut |o: &Outcome| outcomes.push(o.clone()),
        )
        .unwrap();

    assert_eq!(summary.mismatches, 1);
    assert_eq!(
        outcomes[0],
        Outcome::WriteVerificationMismatch {
            address: 0x10,
            expected: 0x0001,
            actual: 0x0007
        }
    );
    // The batch keeps going after a mismatch
    assert_eq!(
        outcomes[1],
        Outcome::ReadValue {
            address: 0x11,
            value: 0
        }
    );
}

#[test]
fn test_continuous_cancel_finishes_pass() {
    let cancel = CancelFlag::new();
    let mut transport = BankTransport::new(RegisterBank::new(WireFormat::Compact));
    // Cancel as soon as the first packet of pass 1 goes out
    transport.cancel_after = Some((1, cancel.clone()));

    let mut exec = executor(transport);
    let mut log = MemoryAuditLog::new();
    let summary = exec
        .run(&batch("cont; w 10 5; r 10"), &mut log, &cancel)
        .unwrap();

    assert_eq!(summary.end, BatchEnd::Cancelled);
    assert_eq!(summary.passes, 1);
    assert_eq!(summary.verified, 1);
    assert_eq!(summary.reads, 1);
    assert_eq!(exec.batch_state(), BatchState::Cancelled);
    // The write/verify pair and the read all went out
    assert_eq!(exec.transport().sent.len(), 3);
    assert_eq!(
        log.messages().last().copied(),
        Some("continuous run cancelled after 1 pass(es)")
    );
}

#[test]
fn test_continuous_runs_until_cancelled() {
    let cancel = CancelFlag::new();
    let mut transport = BankTransport::new(RegisterBank::new(WireFormat::Compact));
    // Third pass sends the fifth packet
    transport.cancel_after = Some((5, cancel.clone()));

    let mut exec = executor(transport);
    let mut log = MemoryAuditLog::new();
    let summary = exec
        .run(&batch("r 1; cont; r 2"), &mut log, &cancel)
        .unwrap();

    assert_eq!(summary.passes, 3);
    assert_eq!(summary.reads, 6);
    assert_eq!(exec.transport().sent.len(), 6);
}

#[test]
fn test_silent_target_times_out() {
    struct Silent;

    impl Transport for Silent {
        fn send(&mut self, _bytes: &[u8]) -> Result<(), ProtocolError> {
            Ok(())
        }

        fn receive(&mut self, _len: usize, _timeout: Duration) -> Result<Vec<u8>, ProtocolError> {
            Err(ProtocolError::Timeout)
        }
    }

    let mut exec = Executor::new(Silent, WireFormat::Compact)
        .with_pacing(Pacing::immediate(Duration::from_millis(1)));
    let mut log = MemoryAuditLog::new();
    let summary = exec
        .run(&batch("w 1 2; r 3"), &mut log, &NeverCancel)
        .unwrap();

    assert_eq!(summary.timeouts, 2);
    assert_eq!(summary.end, BatchEnd::Finished);
    assert_eq!(
        log.messages(),
        vec!["write 0001 verification timed out", "read 0003 timed out"]
    );
}
