//! Serial port handling
//!
//! Provides low-level serial port access for the board UART.

use serde::Serialize;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType, StopBits};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;

use super::ProtocolError;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// Human readable description of the port
    pub description: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Serial number (if available)
    pub serial_number: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            description: "n/a".to_string(),
            vid: None,
            pid: None,
            manufacturer: None,
            serial_number: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb_info) => Self {
                name: info.port_name,
                description: usb_info
                    .product
                    .clone()
                    .unwrap_or_else(|| format!("USB {:04x}:{:04x}", usb_info.vid, usb_info.pid)),
                vid: Some(usb_info.vid),
                pid: Some(usb_info.pid),
                manufacturer: usb_info.manufacturer,
                serial_number: usb_info.serial_number,
            },
            SerialPortType::BluetoothPort => Self {
                description: "Bluetooth".to_string(),
                ..Self::bare(info.port_name)
            },
            SerialPortType::PciPort => Self {
                description: "PCI".to_string(),
                ..Self::bare(info.port_name)
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Sort key so that:
///  - ttyACM* ports come first (sorted numerically by suffix)
///  - then ttyUSB* ports (sorted numerically)
///  - then COMn ports (sorted numerically)
///  - then other ports (sorted by name)
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    let numbered = [("ttyACM", 0u8), ("ttyUSB", 1), ("COM", 2)];
    for (prefix, rank) in numbered {
        if let Some(rest) = basename.strip_prefix(prefix) {
            if let Ok(num) = rest.parse::<usize>() {
                return (rank, num, basename.to_string());
            }
        }
    }
    (3, 0, basename.to_string())
}

fn sorted(map: HashMap<String, PortInfo>) -> Vec<PortInfo> {
    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    match serialport::available_ports() {
        Ok(ports) => {
            for info in ports {
                let p = PortInfo::from(info);
                map.entry(p.name.clone()).or_insert(p);
            }
        }
        Err(e) => tracing::warn!("serial port enumeration failed: {e}"),
    }

    // Linux-only: add /dev/ttyACM* and /dev/ttyUSB* entries the API missed
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone())
                        .or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let ports = sorted(map);
    tracing::debug!(count = ports.len(), "enumerated serial ports");
    ports
}

/// Open a serial port configured 8N1 without flow control
pub fn open_port(
    name: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, ProtocolError> {
    serialport::new(name, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(timeout)
        .open()
        .map_err(|e| ProtocolError::from_open(name, e))
}

/// Discard unread input and unsent output
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports() {
        // Only checks that enumeration does not panic on this host
        let ports = list_ports();
        for port in &ports {
            assert!(!port.name.is_empty());
        }
    }

    #[test]
    fn test_port_sorting() {
        let names = vec![
            "/dev/ttyUSB1",
            "/dev/ttyACM1",
            "COM10",
            "/dev/ttyUSB0",
            "/dev/ttyACM0",
            "/dev/someport",
            "COM3",
            "/dev/ttyACM10",
        ];
        let map: HashMap<String, PortInfo> = names
            .into_iter()
            .map(|n| (n.to_string(), PortInfo::bare(n.to_string())))
            .collect();

        let ordered: Vec<String> = sorted(map).into_iter().map(|p| p.name).collect();

        assert_eq!(
            ordered,
            vec![
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/ttyACM10",
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "COM3",
                "COM10",
                "/dev/someport",
            ]
        );
    }

    #[test]
    fn test_open_missing_port() {
        let err = open_port("/dev/desuart-does-not-exist", 115200, Duration::from_millis(10))
            .err()
            .expect("opening a nonexistent device must fail");
        assert_eq!(err.kind(), super::super::ErrorKind::Connection);
    }
}
