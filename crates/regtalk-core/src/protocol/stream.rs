use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use super::ProtocolError;

/// Byte-stream transport used by the executor.
///
/// The protocol is half-duplex request/response, so a transport only needs to
/// push a request out and pull back a fixed number of bytes within a deadline.
pub trait Transport {
    /// Send a complete packet
    fn send(&mut self, bytes: &[u8]) -> Result<(), ProtocolError>;

    /// Receive exactly `len` bytes or fail with [`ProtocolError::Timeout`]
    fn receive(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, ProtocolError>;

    /// Discard anything already buffered on the input side
    fn clear_input(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        (**self).send(bytes)
    }

    fn receive(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, ProtocolError> {
        (**self).receive(len, timeout)
    }

    fn clear_input(&mut self) -> Result<(), ProtocolError> {
        (**self).clear_input()
    }
}

/// Abstraction for communication channels (Serial or TCP)
pub trait CommunicationChannel: Read + Write + Send {
    /// Set timeout for read/write operations
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Clear input buffers
    fn clear_input_buffer(&mut self) -> io::Result<()>;
}

/// Serial port wrapper implementing CommunicationChannel
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl CommunicationChannel for SerialChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::other)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }
}

/// TCP stream wrapper implementing CommunicationChannel
pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Read for TcpChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl CommunicationChannel for TcpChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        // A zero duration is rejected by set_read_timeout
        let timeout = timeout.max(Duration::from_millis(1));
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))?;
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        // No kernel call drops queued TCP input; drain with non-blocking reads.
        self.stream.set_nonblocking(true)?;
        let mut buf = [0u8; 1024];
        let result = loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.stream.set_nonblocking(false)?;
        result
    }
}

/// Transport over any [`CommunicationChannel`], with byte/packet counters
pub struct ChannelTransport {
    channel: Box<dyn CommunicationChannel>,
    /// Upper bound for a single blocking read while waiting for a response
    poll_interval: Duration,
    tx_bytes: u64,
    rx_bytes: u64,
    tx_packets: u64,
    rx_packets: u64,
}

impl ChannelTransport {
    pub fn new(channel: Box<dyn CommunicationChannel>) -> Self {
        Self {
            channel,
            poll_interval: Duration::from_millis(20),
            tx_bytes: 0,
            rx_bytes: 0,
            tx_packets: 0,
            rx_packets: 0,
        }
    }

    /// Get cumulative tx/rx bytes and packet counters
    pub fn get_counters(&self) -> (u64, u64, u64, u64) {
        (
            self.tx_bytes,
            self.rx_bytes,
            self.tx_packets,
            self.rx_packets,
        )
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        tracing::debug!("send: {} bytes: {:02x?}", bytes.len(), bytes);
        self.channel.write_all(bytes).map_err(map_io_error)?;
        self.channel.flush().map_err(map_io_error)?;
        self.tx_bytes = self.tx_bytes.saturating_add(bytes.len() as u64);
        self.tx_packets = self.tx_packets.saturating_add(1);
        Ok(())
    }

    fn receive(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, ProtocolError> {
        let start = Instant::now();
        let mut buf = vec![0u8; len];
        let mut offset = 0;

        while offset < len {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                tracing::debug!(
                    "receive: timed out after reading {} of {} bytes",
                    offset,
                    len
                );
                return Err(ProtocolError::Timeout);
            }

            let wait = (timeout - elapsed).min(self.poll_interval);
            self.channel.set_timeout(wait)?;

            match self.channel.read(&mut buf[offset..]) {
                Ok(0) => return Err(ProtocolError::ConnectionClosed),
                Ok(n) => {
                    tracing::debug!("receive: read {} bytes: {:02x?}", n, &buf[offset..offset + n]);
                    offset += n;
                }
                Err(ref e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    continue;
                }
                Err(e) => return Err(map_io_error(e)),
            }
        }

        self.rx_bytes = self.rx_bytes.saturating_add(len as u64);
        self.rx_packets = self.rx_packets.saturating_add(1);
        Ok(buf)
    }

    fn clear_input(&mut self) -> Result<(), ProtocolError> {
        self.channel.clear_input_buffer().map_err(map_io_error)
    }
}

fn map_io_error(e: io::Error) -> ProtocolError {
    match e.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::UnexpectedEof => ProtocolError::ConnectionClosed,
        _ => ProtocolError::IoError(e),
    }
}
