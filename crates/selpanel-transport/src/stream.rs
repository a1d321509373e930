use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A connected serial stream (Read + Write).
///
/// This is the I/O type handed out by [`SerialEndpoint::open`](crate::SerialEndpoint::open).
/// On real hardware it wraps a `serialport` handle. On Unix it can also wrap a
/// connected `UnixStream`, which is how device simulators and tests attach.
pub struct SerialStream {
    inner: SerialStreamInner,
}

enum SerialStreamInner {
    Port(Box<dyn serialport::SerialPort>),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Port(port) => port.read(buf),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Port(port) => port.write(buf),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            SerialStreamInner::Port(port) => port.flush(),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl SerialStream {
    pub(crate) fn from_port(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: SerialStreamInner::Port(port),
        }
    }

    /// Wrap a connected Unix stream (device simulator, socat bridge, tests).
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: SerialStreamInner::Unix(stream),
        }
    }

    /// Set how long a read may block before returning `TimedOut`.
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        match &mut self.inner {
            SerialStreamInner::Port(port) => port
                .set_timeout(timeout)
                .map_err(|err| std::io::Error::from(err).into()),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => {
                stream.set_read_timeout(Some(timeout)).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream (duplicates the file descriptor).
    ///
    /// The supervisor reads from one handle and writes through the other.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            SerialStreamInner::Port(port) => {
                let cloned = port
                    .try_clone()
                    .map_err(std::io::Error::from)?;
                Ok(Self::from_port(cloned))
            }
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_unix(cloned))
            }
        }
    }

    /// Device name as reported by the OS, if known.
    pub fn name(&self) -> Option<String> {
        match &self.inner {
            SerialStreamInner::Port(port) => port.name(),
            #[cfg(unix)]
            SerialStreamInner::Unix(_) => Some("unix-stream".to_string()),
        }
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            SerialStreamInner::Port(port) => f
                .debug_struct("SerialStream")
                .field("type", &"serial")
                .field("name", &port.name())
                .finish(),
            #[cfg(unix)]
            SerialStreamInner::Unix(_) => f.debug_struct("SerialStream").field("type", &"unix").finish(),
        }
    }
}
