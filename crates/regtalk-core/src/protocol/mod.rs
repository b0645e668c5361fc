//! Register Access Protocol
//!
//! Implements the register read/write wire protocol spoken by the target.
//!
//! Supports both the compact 4-byte packet and the framed 10-byte packet with CRC-16.

pub mod checksum;
mod connection;
mod error;
mod packet;
pub mod serial;
mod stream;

pub use connection::{connect, TransportTarget};
pub use error::ProtocolError;
pub use packet::{
    decode_compact, decode_framed, encode_compact, encode_framed, framed_message_type, Direction,
    Transaction, WireFormat, COMPACT_PACKET_LEN, FRAMED_PACKET_LEN, FRAME_HEADER,
};
pub use serial::{list_ports, PortInfo, PortKind};
pub use stream::{ChannelTransport, CommunicationChannel, SerialChannel, TcpChannel, Transport};

/// Default baud rate for serial targets
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default timeout for responses in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Default TCP connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Largest register address representable in the 15-bit address field
pub const MAX_ADDRESS: u16 = 0x7FFF;

/// Default framed message type
pub const DEFAULT_MESSAGE_TYPE: u16 = 0x0001;
