use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use selpanel_transport::{SerialStream, TransportError};

use crate::error::{FrameError, Result};
use crate::reassembler::{FrameReassembler, Reassembled, ReassemblerConfig};

const READ_CHUNK_SIZE: usize = 256;

/// Reads reassembled lines from any blocking `Read` stream.
///
/// Partial and coalesced reads are handled by the inner
/// [`FrameReassembler`]. When the stream reports a read timeout the
/// reassembler is polled, so fragments without a delimiter are still
/// delivered once the fragment timeout elapses.
pub struct LineReader<T> {
    inner: T,
    reassembler: FrameReassembler,
    ready: VecDeque<Reassembled>,
}

impl<T: Read> LineReader<T> {
    /// Create a line reader with the default reassembler configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, ReassemblerConfig::default())
    }

    pub fn with_config(inner: T, config: ReassemblerConfig) -> Self {
        Self {
            inner,
            reassembler: FrameReassembler::with_config(config),
            ready: VecDeque::new(),
        }
    }

    /// Read the next reassembled item (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` at EOF. A read timeout
    /// with nothing to deliver is returned as an I/O error for which
    /// [`FrameError::is_idle`] is true; callers treat it as a tick.
    pub fn read_item(&mut self) -> Result<Reassembled> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Ok(item);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    self.ready
                        .extend(self.reassembler.poll_timeout(Instant::now()));
                    if self.ready.is_empty() {
                        return Err(FrameError::Io(err));
                    }
                    continue;
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            // A blocking stream may return after a gap longer than the
            // fragment timeout without ever reporting a timeout.
            let now = Instant::now();
            self.ready.extend(self.reassembler.poll_timeout(now));
            self.ready
                .extend(self.reassembler.push(&chunk[..read], now));
        }
    }

    /// True while input is buffered that has not been delivered yet.
    pub fn has_partial(&self) -> bool {
        !self.ready.is_empty() || self.reassembler.has_partial()
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &ReassemblerConfig {
        self.reassembler.config()
    }
}

impl LineReader<SerialStream> {
    /// Create a line reader for a serial stream, setting its read timeout to
    /// half the fragment timeout so idle ticks arrive in time to flush
    /// fragments.
    pub fn with_config_serial(mut inner: SerialStream, config: ReassemblerConfig) -> Result<Self> {
        let tick = (config.fragment_timeout / 2).max(Duration::from_millis(1));
        inner
            .set_read_timeout(tick)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) => FrameError::Io(io),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn read_single_line() {
        let mut reader = LineReader::new(Cursor::new(b"PRESS 001\n".to_vec()));
        assert_eq!(
            reader.read_item().unwrap(),
            Reassembled::Line("PRESS 001".into())
        );
        assert!(matches!(
            reader.read_item().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn read_multiple_lines_from_one_chunk() {
        let mut reader = LineReader::new(Cursor::new(b"READY\nPONG\nOK\n".to_vec()));
        let items: Vec<_> = (0..3).map(|_| reader.read_item().unwrap()).collect();
        assert_eq!(
            items,
            vec![
                Reassembled::Line("READY".into()),
                Reassembled::Line("PONG".into()),
                Reassembled::Line("OK".into()),
            ]
        );
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: b"RELEASE 004\n".to_vec(),
            pos: 0,
        };
        let mut reader = LineReader::new(byte_reader);
        assert_eq!(
            reader.read_item().unwrap(),
            Reassembled::Line("RELEASE 004".into())
        );
    }

    #[test]
    fn connection_closed_mid_line() {
        let mut reader = LineReader::new(Cursor::new(b"PRES".to_vec()));
        let err = reader.read_item().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert!(reader.has_partial());
    }

    #[test]
    fn idle_timeout_is_reported_as_idle() {
        let reader = ScriptedReader::new(vec![Step::Fail(ErrorKind::TimedOut)]);
        let mut lines = LineReader::new(reader);
        let err = lines.read_item().unwrap_err();
        assert!(err.is_idle());
    }

    #[test]
    fn fragment_flushed_on_idle_tick() {
        let reader = ScriptedReader::new(vec![
            Step::Data(b"004"),
            Step::Sleep(Duration::from_millis(60)),
            Step::Fail(ErrorKind::TimedOut),
        ]);
        let mut lines = LineReader::new(reader);
        assert_eq!(
            lines.read_item().unwrap(),
            Reassembled::Fragment("004".into())
        );
    }

    #[test]
    fn would_block_without_partial_propagates() {
        let reader = ScriptedReader::new(vec![
            Step::Fail(ErrorKind::WouldBlock),
            Step::Data(b"PONG\n"),
        ]);
        let mut lines = LineReader::new(reader);
        let err = lines.read_item().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
        assert_eq!(
            lines.read_item().unwrap(),
            Reassembled::Line("PONG".into())
        );
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = ScriptedReader::new(vec![
            Step::Fail(ErrorKind::Interrupted),
            Step::Data(b"READY\n"),
        ]);
        let mut lines = LineReader::new(reader);
        assert_eq!(lines.read_item().unwrap(), Reassembled::Line("READY".into()));
    }

    #[test]
    fn other_io_errors_propagate() {
        let reader = ScriptedReader::new(vec![Step::Fail(ErrorKind::BrokenPipe)]);
        let mut lines = LineReader::new(reader);
        let err = lines.read_item().unwrap_err();
        assert!(!err.is_idle());
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    #[cfg(unix)]
    fn serial_reader_ticks_on_idle_stream() {
        use std::io::Write;
        use std::os::unix::net::UnixStream;

        let (host, mut device) = UnixStream::pair().unwrap();
        let mut reader = LineReader::with_config_serial(
            SerialStream::from_unix(host),
            ReassemblerConfig::default(),
        )
        .unwrap();

        assert!(reader.read_item().unwrap_err().is_idle());

        device.write_all(b"PRESS 002\n").unwrap();
        assert_eq!(
            reader.read_item().unwrap(),
            Reassembled::Line("PRESS 002".into())
        );
    }

    #[test]
    fn partial_tail_is_kept_behind_delivered_line() {
        let config = ReassemblerConfig::with_fragment_timeout(Duration::from_millis(80));
        let mut reader = LineReader::with_config(Cursor::new(b"READY\nPRE".to_vec()), config);
        assert_eq!(reader.config().fragment_timeout, Duration::from_millis(80));

        assert_eq!(reader.read_item().unwrap(), Reassembled::Line("READY".into()));
        assert_eq!(reader.get_ref().position(), 10);
        assert!(reader.has_partial());

        assert!(matches!(reader.read_item(), Err(FrameError::ConnectionClosed)));
        assert_eq!(reader.into_inner().into_inner(), b"READY\nPRE");
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    enum Step {
        Data(&'static [u8]),
        Sleep(Duration),
        Fail(ErrorKind),
    }

    struct ScriptedReader {
        steps: VecDeque<Step>,
    }

    impl ScriptedReader {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            loop {
                match self.steps.pop_front() {
                    None => return Ok(0),
                    Some(Step::Sleep(d)) => std::thread::sleep(d),
                    Some(Step::Fail(kind)) => return Err(std::io::Error::from(kind)),
                    Some(Step::Data(bytes)) => {
                        let n = bytes.len().min(buf.len());
                        buf[..n].copy_from_slice(&bytes[..n]);
                        return Ok(n);
                    }
                }
            }
        }
    }
}
