//! Serial connection lifecycle.
//!
//! The supervisor runs on a dedicated OS thread because the serial read
//! blocks. It opens the endpoint, feeds a [`LineReader`], forwards decoded
//! events to the async side, and on any fault waits out the backoff and
//! reconnects. Only cancellation ends it.

use std::fmt;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use selpanel_frame::{
    interpret, interpret_fragment, Catalog, DeviceCommand, LineReader, ProtocolEvent, Reassembled,
    ReassemblerConfig,
};
use selpanel_transport::{SerialConfig, SerialEndpoint, SerialStream};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::DeviceHandle;
use crate::error::{BridgeError, Result};

/// Default delay between a fault and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

const BACKOFF_STEP: Duration = Duration::from_millis(50);

/// Opens a fresh connection to the device.
///
/// Implemented for real ports by [`SerialConnector`]; tests and simulators
/// hand out Unix socket pairs instead.
pub trait Connector: Send + 'static {
    fn connect(&mut self) -> selpanel_transport::Result<SerialStream>;

    /// Human-readable endpoint name for logs and status.
    fn describe(&self) -> String;
}

/// [`Connector`] for a serial device node.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    endpoint: SerialEndpoint,
}

impl SerialConnector {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            endpoint: SerialEndpoint::new(config),
        }
    }
}

impl Connector for SerialConnector {
    fn connect(&mut self) -> selpanel_transport::Result<SerialStream> {
        self.endpoint.open()
    }

    fn describe(&self) -> String {
        self.endpoint.path().display().to_string()
    }
}

/// Connection state published by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Disconnected,
    Configuring,
    Connected,
}

impl LinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Configuring => "configuring",
            LinkState::Connected => "connected",
        }
    }

    pub fn is_connected(self) -> bool {
        self == LinkState::Connected
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub catalog: Catalog,
    pub reassembler: ReassemblerConfig,
    pub reconnect_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            catalog: Catalog::default(),
            reassembler: ReassemblerConfig::default(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

pub struct Supervisor<C> {
    connector: C,
    config: SupervisorConfig,
    device: DeviceHandle,
    events: mpsc::UnboundedSender<ProtocolEvent>,
    state: watch::Sender<LinkState>,
    cancel: CancellationToken,
}

impl<C: Connector> Supervisor<C> {
    pub fn new(
        connector: C,
        config: SupervisorConfig,
        device: DeviceHandle,
        events: mpsc::UnboundedSender<ProtocolEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(LinkState::Disconnected);
        Self {
            connector,
            config,
            device,
            events,
            state,
            cancel,
        }
    }

    /// Receiver for link state changes.
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    /// Run [`Supervisor::run`] on a named OS thread.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("selpanel-serial".to_string())
            .spawn(move || self.run())
            .map_err(|err| BridgeError::Worker(format!("serial thread: {err}")))
    }

    /// Connect, read, reconnect until cancelled (blocking).
    pub fn run(mut self) {
        let endpoint = self.connector.describe();
        info!(%endpoint, "serial supervisor started");

        while !self.cancel.is_cancelled() {
            self.set_state(LinkState::Configuring);
            let result = self.connection();
            self.device.detach();
            self.set_state(LinkState::Disconnected);

            match result {
                Ok(()) => break,
                Err(err) => warn!(%endpoint, error = %err, "serial link down"),
            }

            info!(
                %endpoint,
                delay = ?self.config.reconnect_delay,
                "reconnecting after backoff"
            );
            if !self.backoff() {
                break;
            }
        }

        info!(%endpoint, "serial supervisor stopped");
    }

    /// One connection lifetime. `Ok` means shutdown was requested.
    fn connection(&mut self) -> Result<()> {
        let stream = self.connector.connect()?;
        let writer = stream.try_clone()?;
        let mut reader = LineReader::with_config_serial(stream, self.config.reassembler.clone())?;

        self.device.attach(Box::new(writer));
        self.device.send(DeviceCommand::Ping)?;
        self.set_state(LinkState::Connected);
        info!(endpoint = %self.connector.describe(), "serial link connected");

        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            if self.device.take_fault() {
                return Err(BridgeError::DeviceFault);
            }

            let item = match reader.read_item() {
                Ok(item) => item,
                Err(err) if err.is_idle() => continue,
                Err(err) => return Err(err.into()),
            };

            let event = match &item {
                Reassembled::Line(line) => interpret(line, self.config.catalog),
                Reassembled::Fragment(fragment) => {
                    interpret_fragment(fragment, self.config.catalog)
                }
            };
            let Some(event) = event else {
                continue;
            };

            debug!(kind = event.kind(), text = item.text(), "device event");
            if self.events.send(event).is_err() {
                debug!("event loop gone, stopping serial reader");
                return Ok(());
            }
        }
    }

    /// Sleep for the reconnect delay. Returns false if cancelled meanwhile.
    fn backoff(&self) -> bool {
        let deadline = Instant::now() + self.config.reconnect_delay;
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(BACKOFF_STEP.min(deadline - now));
        }
    }

    fn set_state(&self, state: LinkState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "link state changed");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::collections::VecDeque;
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;
    use std::path::PathBuf;

    use super::*;

    /// Hands out queued socket pairs; an empty slot or exhausted queue fails
    /// like an unplugged device.
    struct PairConnector {
        hosts: VecDeque<Option<UnixStream>>,
    }

    impl Connector for PairConnector {
        fn connect(&mut self) -> selpanel_transport::Result<SerialStream> {
            match self.hosts.pop_front().flatten() {
                Some(host) => Ok(SerialStream::from_unix(host)),
                None => Err(selpanel_transport::TransportError::NotFound {
                    path: PathBuf::from("/dev/ttyTEST"),
                }),
            }
        }

        fn describe(&self) -> String {
            "test-pair".to_string()
        }
    }

    struct Harness {
        events: mpsc::UnboundedReceiver<ProtocolEvent>,
        state: watch::Receiver<LinkState>,
        device: DeviceHandle,
        cancel: CancellationToken,
        thread: JoinHandle<()>,
    }

    fn start(hosts: Vec<Option<UnixStream>>, reconnect_delay: Duration) -> Harness {
        let (tx, events) = mpsc::unbounded_channel();
        let device = DeviceHandle::new();
        let cancel = CancellationToken::new();
        let config = SupervisorConfig {
            catalog: Catalog::new(10).unwrap(),
            reconnect_delay,
            ..SupervisorConfig::default()
        };
        let supervisor = Supervisor::new(
            PairConnector {
                hosts: hosts.into(),
            },
            config,
            device.clone(),
            tx,
            cancel.clone(),
        );
        let state = supervisor.subscribe();
        let thread = supervisor.spawn().unwrap();
        Harness {
            events,
            state,
            device,
            cancel,
            thread,
        }
    }

    impl Harness {
        fn wait_for(&self, expected: LinkState) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while *self.state.borrow() != expected {
                assert!(Instant::now() < deadline, "timed out waiting for {expected}");
                std::thread::sleep(Duration::from_millis(5));
            }
        }

        fn stop(self) {
            self.cancel.cancel();
            self.thread.join().unwrap();
        }
    }

    fn read_line(stream: &UnixStream) -> String {
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).unwrap();
        line
    }

    #[test]
    fn connects_pings_and_forwards_events() {
        let (host, mut device) = UnixStream::pair().unwrap();
        let mut h = start(vec![Some(host)], Duration::from_millis(50));

        assert_eq!(read_line(&device), "PING\n");
        h.wait_for(LinkState::Connected);
        assert!(h.device.is_attached());

        device.write_all(b"READY\nPRESS 003\nPRESS 042\n").unwrap();
        assert_eq!(h.events.blocking_recv(), Some(ProtocolEvent::Ready));
        let expected = Catalog::default().media_id(3).unwrap();
        assert_eq!(h.events.blocking_recv(), Some(ProtocolEvent::Press(expected)));

        h.stop();
    }

    #[test]
    fn reconnects_after_stream_closes() {
        let (host1, device1) = UnixStream::pair().unwrap();
        let (host2, mut device2) = UnixStream::pair().unwrap();
        let mut h = start(vec![Some(host1), Some(host2)], Duration::from_millis(20));

        assert_eq!(read_line(&device1), "PING\n");
        drop(device1);

        assert_eq!(read_line(&device2), "PING\n");
        h.wait_for(LinkState::Connected);
        device2.write_all(b"PONG\n").unwrap();
        assert_eq!(h.events.blocking_recv(), Some(ProtocolEvent::HeartbeatReply));

        h.stop();
    }

    #[test]
    fn retries_after_open_failure() {
        let (host, device) = UnixStream::pair().unwrap();
        let h = start(vec![None, Some(host)], Duration::from_millis(20));

        assert_eq!(read_line(&device), "PING\n");
        h.wait_for(LinkState::Connected);
        h.stop();
    }

    #[test]
    fn write_fault_resets_link() {
        let (host1, device1) = UnixStream::pair().unwrap();
        let (host2, device2) = UnixStream::pair().unwrap();
        let h = start(vec![Some(host1), Some(host2)], Duration::from_millis(20));

        assert_eq!(read_line(&device1), "PING\n");
        h.wait_for(LinkState::Connected);

        h.device.attach(Box::new(BrokenSink));
        assert!(h.device.send(DeviceCommand::LedClear).is_err());

        assert_eq!(read_line(&device2), "PING\n");
        h.wait_for(LinkState::Connected);
        h.stop();
    }

    #[test]
    fn cancel_interrupts_backoff() {
        let h = start(Vec::new(), Duration::from_secs(30));
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(*h.state.borrow(), LinkState::Disconnected);

        let started = Instant::now();
        h.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
