//! Serial targets
//!
//! Opening a device as an 8N1 byte stream, and discovering candidate devices.

use serde::Serialize;
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{ProtocolError, DEFAULT_BAUD_RATE};

/// How a serial device is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    Usb,
    Pci,
    Bluetooth,
    Unknown,
}

/// A serial device found on this machine
#[derive(Debug, Clone, Serialize)]
pub struct PortInfo {
    /// Device path or name (`/dev/ttyUSB0`, `COM3`)
    pub name: String,
    pub kind: PortKind,
    /// USB vendor ID
    pub vid: Option<u16>,
    /// USB product ID
    pub pid: Option<u16>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            kind: PortKind::Unknown,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let mut port = PortInfo::bare(info.port_name);
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                port.kind = PortKind::Usb;
                port.vid = Some(usb.vid);
                port.pid = Some(usb.pid);
                port.manufacturer = usb.manufacturer;
                port.product = usb.product;
            }
            SerialPortType::PciPort => port.kind = PortKind::Pci,
            SerialPortType::BluetoothPort => port.kind = PortKind::Bluetooth,
            SerialPortType::Unknown => {}
        }
        port
    }
}

/// Ordering key: USB adapters first, then by name with trailing numbers
/// compared numerically (`COM2` before `COM10`)
fn port_order(port: &PortInfo) -> (bool, String, u64) {
    let name = port.name.rsplit('/').next().unwrap_or(&port.name);
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let number = name[stem.len()..].parse().unwrap_or(0);
    (port.kind != PortKind::Usb, stem.to_string(), number)
}

/// Serial devices visible to this machine, in a stable order.
///
/// On Linux, `/dev/ttyUSB*` and `/dev/ttyACM*` nodes missed by enumeration
/// are included as well.
pub fn list_ports() -> Vec<PortInfo> {
    let mut found: BTreeMap<String, PortInfo> = BTreeMap::new();

    match serialport::available_ports() {
        Ok(ports) => {
            for info in ports {
                let port = PortInfo::from(info);
                found.entry(port.name.clone()).or_insert(port);
            }
        }
        Err(e) => tracing::warn!("serial port enumeration failed: {}", e),
    }

    #[cfg(target_os = "linux")]
    if let Ok(entries) = std::fs::read_dir("/dev") {
        let nodes = entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with("ttyUSB") || name.starts_with("ttyACM"));
        for node in nodes {
            let path = format!("/dev/{}", node);
            found
                .entry(path.clone())
                .or_insert_with(|| PortInfo::bare(path));
        }
    }

    let mut ports: Vec<PortInfo> = found.into_values().collect();
    ports.sort_by_key(port_order);
    ports
}

/// Open a serial device as 8N1 without flow control, with stale input dropped
pub fn open_port(name: &str, baud_rate: Option<u32>) -> Result<Box<dyn SerialPort>, ProtocolError> {
    let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);

    let port = serialport::new(name, baud)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(Duration::from_millis(100))
        .open()
        .map_err(|e| match e.kind() {
            serialport::ErrorKind::NoDevice => {
                ProtocolError::ConnectionFailed(format!("serial port {} not found", name))
            }
            _ => ProtocolError::SerialError(format!("{}: {}", name, e)),
        })?;

    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;

    tracing::debug!("opened serial port {} at {} baud", name, baud);
    Ok(port)
}

/// Whether a configured address names a serial device rather than a host
pub fn looks_like_serial_port(address: &str) -> bool {
    if address.starts_with("/dev/") {
        return true;
    }
    match address.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("COM") => {
            let digits = &address[3..];
            !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}
