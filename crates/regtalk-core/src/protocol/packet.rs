//! Packet encoding/decoding
//!
//! Two wire formats carry a register transaction:
//!
//! Compact (4 bytes, little-endian):
//! - 2 bytes: address word (bit 15 = direction, bits 0..=14 = address)
//! - 2 bytes: value word
//!
//! Framed (10 bytes, big-endian):
//! - 2 bytes: header `0xAA55`
//! - 2 bytes: message type
//! - 2 bytes: address word (same layout as compact)
//! - 2 bytes: data word
//! - 2 bytes: CRC-16 of the four preceding words
//!
//! Direction bit: `1` = write, `0` = read, in both formats.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::{checksum, ProtocolError, MAX_ADDRESS};

/// Framed packet header word
pub const FRAME_HEADER: u16 = 0xAA55;

/// Size of a compact packet in bytes
pub const COMPACT_PACKET_LEN: usize = 4;

/// Size of a framed packet in bytes
pub const FRAMED_PACKET_LEN: usize = 10;

const DIRECTION_BIT: u16 = 0x8000;

/// Transfer direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    fn from_address_word(word: u16) -> Self {
        if word & DIRECTION_BIT != 0 {
            Direction::Write
        } else {
            Direction::Read
        }
    }

    /// Short label used in logs ("R" / "W")
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Read => "R",
            Direction::Write => "W",
        }
    }
}

/// A single register transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub direction: Direction,
    /// 15-bit register address
    pub address: u16,
    /// Value to write, or the value carried by a read response
    pub value: u16,
}

impl Transaction {
    /// A read request (value word is zero on the wire)
    pub fn read(address: u16) -> Self {
        Self {
            direction: Direction::Read,
            address: address & MAX_ADDRESS,
            value: 0,
        }
    }

    /// A write request
    pub fn write(address: u16, value: u16) -> Self {
        Self {
            direction: Direction::Write,
            address: address & MAX_ADDRESS,
            value,
        }
    }

    fn address_word(&self) -> u16 {
        let flag = match self.direction {
            Direction::Write => DIRECTION_BIT,
            Direction::Read => 0,
        };
        flag | (self.address & MAX_ADDRESS)
    }

    fn from_words(address_word: u16, value: u16) -> Self {
        Self {
            direction: Direction::from_address_word(address_word),
            address: address_word & MAX_ADDRESS,
            value,
        }
    }
}

/// Wire format used for a whole session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireFormat {
    /// 4-byte little-endian packet without integrity check
    Compact,
    /// 10-byte big-endian packet with CRC-16
    Framed { message_type: u16 },
}

impl WireFormat {
    /// Encoded size of one packet
    pub fn packet_len(&self) -> usize {
        match self {
            WireFormat::Compact => COMPACT_PACKET_LEN,
            WireFormat::Framed { .. } => FRAMED_PACKET_LEN,
        }
    }

    /// Encode a transaction in this format
    pub fn encode(&self, tx: &Transaction) -> Vec<u8> {
        match self {
            WireFormat::Compact => encode_compact(tx.direction, tx.address, tx.value).to_vec(),
            WireFormat::Framed { message_type } => {
                encode_framed(*message_type, tx.direction, tx.address, tx.value).to_vec()
            }
        }
    }

    /// Decode a transaction in this format
    pub fn decode(&self, bytes: &[u8]) -> Result<Transaction, ProtocolError> {
        match self {
            WireFormat::Compact => decode_compact(bytes),
            WireFormat::Framed { .. } => decode_framed(bytes),
        }
    }
}

/// Encode a compact packet. The address is masked to 15 bits.
pub fn encode_compact(direction: Direction, address: u16, value: u16) -> [u8; 4] {
    let tx = Transaction {
        direction,
        address,
        value,
    };
    let mut bytes = [0u8; COMPACT_PACKET_LEN];
    LittleEndian::write_u16(&mut bytes[0..2], tx.address_word());
    LittleEndian::write_u16(&mut bytes[2..4], value);
    bytes
}

/// Decode a compact packet
pub fn decode_compact(bytes: &[u8]) -> Result<Transaction, ProtocolError> {
    if bytes.len() != COMPACT_PACKET_LEN {
        return Err(ProtocolError::InvalidLength {
            expected: COMPACT_PACKET_LEN,
            actual: bytes.len(),
        });
    }

    let address_word = LittleEndian::read_u16(&bytes[0..2]);
    let value = LittleEndian::read_u16(&bytes[2..4]);
    Ok(Transaction::from_words(address_word, value))
}

/// Encode a framed packet with its CRC. The address is masked to 15 bits.
pub fn encode_framed(message_type: u16, direction: Direction, address: u16, value: u16) -> [u8; 10] {
    let tx = Transaction {
        direction,
        address,
        value,
    };
    let words = [FRAME_HEADER, message_type, tx.address_word(), value];
    let crc = checksum::compute(&words);

    let frame = [words[0], words[1], words[2], words[3], crc];

    let mut bytes = [0u8; FRAMED_PACKET_LEN];
    BigEndian::write_u16_into(&frame, &mut bytes);
    bytes
}

/// Decode a framed packet, verifying its CRC before anything else
pub fn decode_framed(bytes: &[u8]) -> Result<Transaction, ProtocolError> {
    if bytes.len() != FRAMED_PACKET_LEN {
        return Err(ProtocolError::InvalidLength {
            expected: FRAMED_PACKET_LEN,
            actual: bytes.len(),
        });
    }

    let mut words = [0u16; 5];
    BigEndian::read_u16_into(bytes, &mut words);

    let received_crc = words[4];
    if !checksum::verify(&words[..4], received_crc) {
        return Err(ProtocolError::CrcMismatch {
            expected: checksum::compute(&words[..4]),
            actual: received_crc,
        });
    }

    if words[0] != FRAME_HEADER {
        return Err(ProtocolError::InvalidHeader(words[0]));
    }

    Ok(Transaction::from_words(words[2], words[3]))
}

/// Message type field of a framed packet, if the bytes have framed length
pub fn framed_message_type(bytes: &[u8]) -> Option<u16> {
    (bytes.len() == FRAMED_PACKET_LEN).then(|| BigEndian::read_u16(&bytes[2..4]))
}
