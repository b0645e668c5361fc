//! Simulated register target
//!
//! Answers packets the way a target does: writes are stored silently, reads
//! reply with the stored value (zero if never written), and packets that fail
//! to decode are dropped without a reply.

use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Write};
use std::net::TcpListener;

use crate::protocol::{
    encode_compact, encode_framed, framed_message_type, Direction, Transaction, WireFormat,
    MAX_ADDRESS,
};

/// In-memory register file speaking one wire format
#[derive(Debug, Clone)]
pub struct RegisterBank {
    format: WireFormat,
    registers: HashMap<u16, u16>,
    /// Addresses that ignore writes
    read_only: HashSet<u16>,
}

impl RegisterBank {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            registers: HashMap::new(),
            read_only: HashSet::new(),
        }
    }

    /// Preset a register value
    pub fn with_register(mut self, address: u16, value: u16) -> Self {
        self.registers.insert(address & MAX_ADDRESS, value);
        self
    }

    /// Make a register ignore writes
    pub fn with_read_only(mut self, address: u16) -> Self {
        self.read_only.insert(address & MAX_ADDRESS);
        self
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Current value of a register
    pub fn get(&self, address: u16) -> u16 {
        self.registers
            .get(&(address & MAX_ADDRESS))
            .copied()
            .unwrap_or(0)
    }

    /// Apply one request packet; returns the reply packet, if any
    pub fn handle(&mut self, packet: &[u8]) -> Option<Vec<u8>> {
        let request = match self.format.decode(packet) {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!("sim: dropping packet {:02x?}: {}", packet, e);
                return None;
            }
        };

        match request.direction {
            Direction::Write => {
                if self.read_only.contains(&request.address) {
                    tracing::debug!("sim: ignoring write to read-only {:04X}", request.address);
                } else {
                    self.registers.insert(request.address, request.value);
                    tracing::debug!("sim: {:04X} <- {:04X}", request.address, request.value);
                }
                None
            }
            Direction::Read => {
                let reply = Transaction {
                    value: self.get(request.address),
                    ..request
                };
                tracing::debug!("sim: {:04X} -> {:04X}", reply.address, reply.value);
                Some(self.encode_reply(&reply, packet))
            }
        }
    }

    fn encode_reply(&self, reply: &Transaction, request: &[u8]) -> Vec<u8> {
        match self.format {
            WireFormat::Compact => {
                encode_compact(reply.direction, reply.address, reply.value).to_vec()
            }
            // Echo the request's message type
            WireFormat::Framed { message_type } => encode_framed(
                framed_message_type(request).unwrap_or(message_type),
                reply.direction,
                reply.address,
                reply.value,
            )
            .to_vec(),
        }
    }

    /// Serve one client until it disconnects
    pub fn serve_connection<S: Read + Write>(&mut self, stream: &mut S) -> io::Result<()> {
        let mut packet = vec![0u8; self.format.packet_len()];
        loop {
            match stream.read_exact(&mut packet) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e),
            }
            if let Some(reply) = self.handle(&packet) {
                stream.write_all(&reply)?;
                stream.flush()?;
            }
        }
    }

    /// Accept clients on `listener` one at a time, forever
    pub fn serve_tcp(&mut self, listener: &TcpListener) -> io::Result<()> {
        for stream in listener.incoming() {
            let mut stream = stream?;
            let peer = stream
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".into());
            tracing::info!("sim: client {} connected", peer);
            if let Err(e) = self.serve_connection(&mut stream) {
                tracing::warn!("sim: client {} failed: {}", peer, e);
            }
            tracing::info!("sim: client {} disconnected", peer);
        }
        Ok(())
    }
}
