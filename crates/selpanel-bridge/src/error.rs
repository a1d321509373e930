use std::net::SocketAddr;

/// Errors that can occur in bridge operations.
///
/// Transport and frame errors never stop the bridge; the supervisor logs
/// them and reconnects. Only startup errors (bind, worker spawn) surface to
/// the caller of [`Bridge::run`](crate::Bridge::run).
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] selpanel_transport::TransportError),

    /// Line-level error on the serial stream.
    #[error("frame error: {0}")]
    Frame(#[from] selpanel_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A device command was issued while no device is connected.
    #[error("no device connected")]
    DeviceUnavailable,

    /// A device write failed; the link is reset by the supervisor.
    #[error("device write failed")]
    DeviceFault,

    /// The HTTP listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("http server error: {0}")]
    Serve(std::io::Error),

    /// A background worker could not be started or panicked.
    #[error("worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
