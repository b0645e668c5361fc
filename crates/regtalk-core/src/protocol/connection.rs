//! Connection management
//!
//! Opens the byte-stream transport for a session. Any failure here is fatal to
//! the session; there is no reconnection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{
    serial::{looks_like_serial_port, open_port},
    ChannelTransport, ProtocolError, SerialChannel, TcpChannel,
};

/// Where the target lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportTarget {
    /// TCP host and port
    Tcp { host: String, port: u16 },
    /// Serial device and baud rate
    Serial { path: String, baud_rate: u32 },
}

impl TransportTarget {
    /// Build a target from the configured `address` and `port` values.
    ///
    /// A serial device address (`/dev/...`, `COMn`) takes `port` as its baud
    /// rate; any other address is a TCP host.
    pub fn from_address(address: &str, port: u32) -> Result<Self, ProtocolError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ProtocolError::InvalidTarget("empty address".into()));
        }

        if looks_like_serial_port(address) {
            if port == 0 {
                return Err(ProtocolError::InvalidTarget(format!(
                    "baud rate for {} must be non-zero",
                    address
                )));
            }
            return Ok(TransportTarget::Serial {
                path: address.to_string(),
                baud_rate: port,
            });
        }

        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                ProtocolError::InvalidTarget(format!(
                    "port {} is outside 1-65535",
                    port
                ))
            })?;
        Ok(TransportTarget::Tcp {
            host: address.to_string(),
            port,
        })
    }
}

impl fmt::Display for TransportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportTarget::Tcp { host, port } => write!(f, "{}:{}", host, port),
            TransportTarget::Serial { path, baud_rate } => write!(f, "{}@{}", path, baud_rate),
        }
    }
}

/// Open a transport to the target
pub fn connect(
    target: &TransportTarget,
    connect_timeout: Duration,
) -> Result<ChannelTransport, ProtocolError> {
    match target {
        TransportTarget::Tcp { host, port } => {
            let addrs: Vec<_> = (host.as_str(), *port)
                .to_socket_addrs()
                .map_err(|e| {
                    ProtocolError::ConnectionFailed(format!("cannot resolve {}: {}", host, e))
                })?
                .collect();

            let mut last_err = None;
            for addr in &addrs {
                match TcpStream::connect_timeout(addr, connect_timeout) {
                    Ok(stream) => {
                        stream.set_nodelay(true)?;
                        tracing::info!("connected to {}", addr);
                        return Ok(ChannelTransport::new(Box::new(TcpChannel::new(stream))));
                    }
                    Err(e) => {
                        tracing::debug!("connect to {} failed: {}", addr, e);
                        last_err = Some(e);
                    }
                }
            }

            Err(ProtocolError::ConnectionFailed(match last_err {
                Some(e) => format!("{}: {}", target, e),
                None => format!("{}: no addresses resolved", target),
            }))
        }
        TransportTarget::Serial { path, baud_rate } => {
            let port = open_port(path, Some(*baud_rate))?;
            tracing::info!("opened serial target {}", target);
            Ok(ChannelTransport::new(Box::new(SerialChannel::new(port))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_target_from_tcp_address() {
        let target = TransportTarget::from_address("127.0.0.1", 65432).unwrap();
        assert_eq!(
            target,
            TransportTarget::Tcp {
                host: "127.0.0.1".into(),
                port: 65432
            }
        );
        assert_eq!(target.to_string(), "127.0.0.1:65432");
    }

    #[test]
    fn test_target_from_serial_address() {
        let target = TransportTarget::from_address("COM2", 9600).unwrap();
        assert_eq!(
            target,
            TransportTarget::Serial {
                path: "COM2".into(),
                baud_rate: 9600
            }
        );
    }

    #[test]
    fn test_target_rejects_bad_port() {
        assert!(TransportTarget::from_address("localhost", 0).is_err());
        assert!(TransportTarget::from_address("localhost", 70000).is_err());
        assert!(TransportTarget::from_address("", 80).is_err());
    }

    #[test]
    fn test_connect_refused_is_connection_failure() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let target = TransportTarget::Tcp {
            host: "127.0.0.1".into(),
            port,
        };
        let result = connect(&target, Duration::from_millis(500));
        assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
    }
}
