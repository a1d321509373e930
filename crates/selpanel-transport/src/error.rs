use std::path::PathBuf;

/// Errors that can occur while opening or using the serial endpoint.
///
/// Every variant is recoverable from the bridge's point of view: the
/// supervisor treats all of them as a reason to disconnect and retry.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The device node does not exist (unplugged, wrong path).
    #[error("serial port not found: {path}")]
    NotFound { path: PathBuf },

    /// The process may not open the device node.
    #[error("permission denied for {path} (is the user in the dialout group?)")]
    PermissionDenied { path: PathBuf },

    /// Opening the port failed for another reason.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: serialport::Error,
    },

    /// Applying line settings to an open port failed.
    #[error("failed to configure {path}: {source}")]
    Configure {
        path: PathBuf,
        source: serialport::Error,
    },

    /// Listing the host's serial ports failed.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(serialport::Error),

    /// An I/O error occurred on the open stream.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// The underlying I/O error kind, if this error carries one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            TransportError::NotFound { .. } => Some(std::io::ErrorKind::NotFound),
            TransportError::PermissionDenied { .. } => Some(std::io::ErrorKind::PermissionDenied),
            TransportError::Open { source, .. } | TransportError::Configure { source, .. } => {
                match source.kind() {
                    serialport::ErrorKind::Io(kind) => Some(kind),
                    _ => None,
                }
            }
            TransportError::Io(err) => Some(err.kind()),
            TransportError::Enumerate(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
