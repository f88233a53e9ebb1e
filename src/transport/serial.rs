//! Serial transport implementation

use super::{LinkOpener, Transport};
use crate::error::{Error, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Baud rate of the pedal firmware's USB serial console
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Serial transport for the pedal's USB CDC port
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialTransport {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Baud rate (e.g., 115200)
    /// * `read_timeout` - Initial blocking budget for a single read
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialTransport {
            port,
            path: path.to_string(),
        })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.port.write(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port.set_timeout(timeout)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // The port handle is released on drop; make sure nothing is left queued
        self.port.flush()?;
        log::debug!("Closing serial port {}", self.path);
        Ok(())
    }
}

/// Opens the serial port chosen by configuration or command line.
///
/// An opener without a path means no device has been selected yet.
#[derive(Debug, Clone)]
pub struct SerialLinkOpener {
    path: Option<String>,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialLinkOpener {
    pub fn new(path: Option<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            path,
            baud_rate,
            read_timeout,
        }
    }
}

impl LinkOpener for SerialLinkOpener {
    fn open_link(&mut self) -> Result<Box<dyn Transport>> {
        let Some(path) = self.path.as_deref() else {
            return Err(Error::LinkUnavailable("no device selected".to_string()));
        };
        let transport = SerialTransport::open(path, self.baud_rate, self.read_timeout)
            .map_err(|e| Error::LinkUnavailable(format!("{}: {}", path, e)))?;
        Ok(Box::new(transport))
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("{} @ {} baud", path, self.baud_rate),
            None => "no device selected".to_string(),
        }
    }
}

/// List candidate serial ports as `(path, description)` pairs
pub fn list_ports() -> Result<Vec<(String, String)>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let description = match p.port_type {
                SerialPortType::UsbPort(info) => format!(
                    "USB {:04x}:{:04x} {}",
                    info.vid,
                    info.pid,
                    info.product.unwrap_or_default()
                ),
                SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                SerialPortType::PciPort => "PCI".to_string(),
                SerialPortType::Unknown => "Unknown".to_string(),
            };
            (p.port_name, description)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opener_without_path_is_unavailable() {
        let mut opener = SerialLinkOpener::new(None, DEFAULT_BAUD_RATE, Duration::from_millis(200));
        match opener.open_link() {
            Err(Error::LinkUnavailable(msg)) => assert_eq!(msg, "no device selected"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("open without a device must fail"),
        }
        assert_eq!(opener.describe(), "no device selected");
    }

    #[test]
    fn test_opener_missing_device_is_unavailable() {
        let mut opener = SerialLinkOpener::new(
            Some("/dev/pada-io-does-not-exist".to_string()),
            DEFAULT_BAUD_RATE,
            Duration::from_millis(200),
        );
        assert!(matches!(opener.open_link(), Err(Error::LinkUnavailable(_))));
    }
}
