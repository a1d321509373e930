use std::io::{ErrorKind, Write};

use tracing::trace;

use crate::command::DeviceCommand;
use crate::error::{FrameError, Result};

/// Writes encoded [`DeviceCommand`]s to any `Write` stream.
///
/// Each command is written in full and flushed before `send` returns, so a
/// writer behind a lock never interleaves partial lines.
pub struct CommandWriter<T> {
    inner: T,
}

impl<T: Write> CommandWriter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Encode and send one command (blocking).
    pub fn send(&mut self, command: DeviceCommand) -> Result<()> {
        let line = command.encode();
        self.write_all(line.as_bytes())?;
        self.flush()?;
        trace!(%command, "device command sent");
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
