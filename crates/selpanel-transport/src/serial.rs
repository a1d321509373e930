use std::path::{Path, PathBuf};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::SerialStream;

/// Default line speed of the button panel firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default blocking-read timeout. Doubles as the reader's poll tick.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Line settings for the serial endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device node, e.g. `/dev/serial/by-id/usb-Espressif_...-if00`.
    pub path: PathBuf,
    /// Line speed in baud.
    pub baud_rate: u32,
    /// Maximum time a single read blocks before reporting `TimedOut`.
    pub read_timeout: Duration,
}

impl SerialConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/ttyACM0"),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// A configured, not-yet-opened serial endpoint.
///
/// Opening applies raw 8N1 framing without flow control, asserts DTR so
/// USB-CDC devices start transmitting, and discards bytes buffered before
/// the open.
#[derive(Debug, Clone)]
pub struct SerialEndpoint {
    config: SerialConfig,
}

impl SerialEndpoint {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }

    /// Open and configure the endpoint (blocking).
    pub fn open(&self) -> Result<SerialStream> {
        let path = self.config.path.clone();
        if !path.exists() {
            return Err(TransportError::NotFound { path });
        }

        let name = path.to_string_lossy().into_owned();
        let mut port = serialport::new(name, self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(self.config.read_timeout)
            .open()
            .map_err(|source| open_error(&path, source))?;

        port.write_data_terminal_ready(true)
            .map_err(|source| TransportError::Configure {
                path: path.clone(),
                source,
            })?;
        if let Err(err) = port.clear(ClearBuffer::Input) {
            debug!(?path, error = %err, "could not discard stale input");
        }

        info!(?path, baud = self.config.baud_rate, "serial port opened");
        Ok(SerialStream::from_port(port))
    }

    /// Configured device node.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Endpoint configuration.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

fn open_error(path: &Path, source: serialport::Error) -> TransportError {
    match source.kind() {
        serialport::ErrorKind::NoDevice
        | serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => TransportError::NotFound {
            path: path.to_path_buf(),
        },
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            TransportError::PermissionDenied {
                path: path.to_path_buf(),
            }
        }
        serialport::ErrorKind::InvalidInput => TransportError::Configure {
            path: path.to_path_buf(),
            source,
        },
        _ => TransportError::Open {
            path: path.to_path_buf(),
            source,
        },
    }
}

/// One serial port visible to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub kind: &'static str,
    pub description: Option<String>,
}

/// List serial ports visible to the host.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, description) = match port.port_type {
                SerialPortType::UsbPort(usb) => {
                    let label = [usb.manufacturer, usb.product]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(" ");
                    let description = format!("{:04x}:{:04x} {label}", usb.vid, usb.pid);
                    ("usb", Some(description.trim_end().to_string()))
                }
                SerialPortType::PciPort => ("pci", None),
                SerialPortType::BluetoothPort => ("bluetooth", None),
                SerialPortType::Unknown => ("unknown", None),
            };
            PortInfo {
                name: port.port_name,
                kind,
                description,
            }
        })
        .collect())
}
