/// Errors that can occur while reading lines or writing device commands.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading or writing the serial stream.
    #[error("serial frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device closed the stream (EOF or zero-length write).
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True for the read-timeout tick of a port opened with a read timeout.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err) if matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
