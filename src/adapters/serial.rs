//! Serial port adapter.
//!
//! Implements [`Connector`] / [`Transport`] on top of the `serialport`
//! crate.  A read that times out is reported as `Ok(0)`, which is what the
//! I/O thread expects from an idle link.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use log::{debug, info};
use serialport::{ClearBuffer, SerialPort, SerialPortType};

use crate::config::SystemConfig;
use crate::error::ConnectionError;
use crate::link::{Connector, Transport};

/// Opens the configured serial device on demand.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port: String,
    baud_rate: u32,
    read_timeout: Duration,
    settle: Duration,
}

impl SerialConnector {
    pub fn new(port: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            read_timeout,
            settle: Duration::ZERO,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(config.port.clone(), config.baud_rate, config.read_timeout())
            .with_settle(config.reset_settle())
    }

    /// Wait this long after opening before trusting the input.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

impl Connector for SerialConnector {
    type Transport = SerialTransport;

    fn connect(&mut self) -> Result<SerialTransport, ConnectionError> {
        let port = serialport::new(&self.port, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| ConnectionError::OpenFailed {
                port: self.port.clone(),
                reason: e.to_string(),
            })?;

        if !self.settle.is_zero() {
            debug!("SERIAL: waiting {:?} for {} to reset", self.settle, self.port);
            std::thread::sleep(self.settle);
            // Boot chatter from before the reset is not telemetry.
            if let Err(e) = port.clear(ClearBuffer::Input) {
                debug!("SERIAL: could not clear input buffer: {e}");
            }
        }
        Ok(SerialTransport { port })
    }

    fn endpoint(&self) -> &str {
        &self.port
    }
}

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConnectionError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(ConnectionError::Lost(e)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ConnectionError> {
        self.port.write_all(data).map_err(ConnectionError::Lost)
    }

    fn flush(&mut self) -> Result<(), ConnectionError> {
        self.port.flush().map_err(ConnectionError::Lost)
    }
}

/// One entry of [`list_ports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

/// Enumerate serial devices the OS knows about.
pub fn list_ports() -> Result<Vec<PortInfo>, ConnectionError> {
    let ports = serialport::available_ports().map_err(|e| ConnectionError::OpenFailed {
        port: "*".into(),
        reason: e.to_string(),
    })?;
    info!("SERIAL: {} port(s) found", ports.len());
    Ok(ports
        .into_iter()
        .map(|p| PortInfo {
            description: describe(&p.port_type),
            name: p.port_name,
        })
        .collect())
}

fn describe(kind: &SerialPortType) -> String {
    match kind {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB serial");
            format!("{product} [{:04x}:{:04x}]", usb.vid, usb.pid)
        }
        SerialPortType::BluetoothPort => "Bluetooth".into(),
        SerialPortType::PciPort => "PCI".into(),
        SerialPortType::Unknown => "unknown".into(),
    }
}
