use std::fmt;

use crate::id::MediaId;

/// Host-to-panel commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Light exactly one indicator.
    LedSet(MediaId),
    /// Turn all indicators off.
    LedClear,
    /// Liveness check; the panel answers `PONG`.
    Ping,
    Status,
    Version,
}

impl DeviceCommand {
    /// Wire form, including the trailing newline.
    pub fn encode(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCommand::LedSet(id) => write!(f, "LEDSET {id}"),
            DeviceCommand::LedClear => f.write_str("LEDCLR"),
            DeviceCommand::Ping => f.write_str("PING"),
            DeviceCommand::Status => f.write_str("STATUS"),
            DeviceCommand::Version => f.write_str("VERSION"),
        }
    }
}
