//! Composition root.
//!
//! [`Bridge`] wires the components together and owns their lifetimes:
//!
//! ```text
//! serial thread ──ProtocolEvent──▶ event loop ──▶ PressDispatcher ──▶ ConsumerHub
//!                                      ▲                          └──▶ DeviceQueue ──▶ DeviceHandle
//! HTTP / WebSocket ──BridgeCommand─────┘
//! ```
//!
//! The event loop is the only task that touches the dispatcher, so presses,
//! completions and test commands are applied one at a time in arrival order.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use selpanel_frame::{Catalog, DeviceCommand, MediaId, ProtocolEvent, ReassemblerConfig};
use selpanel_transport::SerialConfig;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::{DeviceHandle, DeviceQueue};
use crate::dispatcher::PressDispatcher;
use crate::error::{BridgeError, Result};
use crate::hub::ConsumerHub;
use crate::media::MediaLibrary;
use crate::server::{self, AppState};
use crate::status::StatusSource;
use crate::supervisor::{
    Connector, LinkState, SerialConnector, Supervisor, SupervisorConfig, DEFAULT_RECONNECT_DELAY,
};

/// Default HTTP bind address.
pub const DEFAULT_LISTEN: ([u8; 4], u16) = ([0, 0, 0, 0], 8080);

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub catalog: Catalog,
    pub serial: SerialConfig,
    /// Firmware lights its own LED on press; the host sends no `LEDSET`.
    pub device_managed_leds: bool,
    pub reassembler: ReassemblerConfig,
    pub reconnect_delay: Duration,
    pub listen: SocketAddr,
    pub media_dir: PathBuf,
    /// Interval for `PING` while connected. `None` disables it.
    pub heartbeat: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            catalog: Catalog::default(),
            serial: SerialConfig::default(),
            device_managed_leds: true,
            reassembler: ReassemblerConfig::default(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            listen: SocketAddr::from(DEFAULT_LISTEN),
            media_dir: PathBuf::from("media"),
            heartbeat: None,
        }
    }
}

/// Requests from the HTTP/WebSocket surface to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeCommand {
    /// Simulated press (`/test/play/{id}`).
    Press(u32),
    /// A consumer finished playing `id`.
    PlaybackEnded(u32),
    /// Stop playback (`/test/stop`).
    Stop,
}

/// Single consumer of device events and bridge commands.
pub struct EventLoop {
    dispatcher: PressDispatcher,
    session: watch::Sender<Option<MediaId>>,
}

impl EventLoop {
    pub fn new(dispatcher: PressDispatcher, session: watch::Sender<Option<MediaId>>) -> Self {
        Self {
            dispatcher,
            session,
        }
    }

    /// Process events and commands until cancelled or both sources close.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ProtocolEvent>,
        mut commands: mpsc::UnboundedReceiver<BridgeCommand>,
        cancel: CancellationToken,
    ) {
        let mut events_open = true;
        let mut commands_open = true;

        while events_open || commands_open {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event),
                    None => events_open = false,
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => commands_open = false,
                },
            }
        }

        debug!("event loop stopped");
    }

    pub fn handle_event(&mut self, event: ProtocolEvent) {
        match event {
            ProtocolEvent::Press(id) => {
                self.dispatcher.on_press(u32::from(id.get()));
            }
            ProtocolEvent::Release(id) => debug!(%id, "button released"),
            ProtocolEvent::Ready => {
                info!("device ready");
                self.dispatcher.queue_device_command(DeviceCommand::Version);
                self.dispatcher.queue_device_command(DeviceCommand::Status);
            }
            ProtocolEvent::HeartbeatReply => debug!("heartbeat reply"),
            ProtocolEvent::DeviceError(text) => warn!(error = %text, "device reported error"),
            ProtocolEvent::FirmwareInfo(text) => info!(firmware = %text, "device firmware"),
            ProtocolEvent::ModeInfo(text) => info!(mode = %text, "device mode"),
            ProtocolEvent::StatusInfo(text) => debug!(status = %text, "device status"),
            ProtocolEvent::Unknown(text) => debug!(line = %text, "unknown device line"),
        }
        self.publish();
    }

    pub fn handle_command(&mut self, command: BridgeCommand) {
        match command {
            BridgeCommand::Press(id) => {
                info!(id, "test press");
                self.dispatcher.on_press(id);
            }
            BridgeCommand::PlaybackEnded(id) => {
                self.dispatcher.on_playback_ended(id);
            }
            BridgeCommand::Stop => {
                self.dispatcher.stop();
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.session.send_if_modified(|current| {
            let session = self.dispatcher.session();
            let changed = *current != session;
            *current = session;
            changed
        });
    }
}

/// The serial-to-WebSocket bridge.
pub struct Bridge {
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Bind the configured address and run against the configured serial
    /// port until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let addr = self.config.listen;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BridgeError::Bind { addr, source })?;
        let connector = SerialConnector::new(self.config.serial.clone());
        self.run_with(listener, connector, cancel).await
    }

    /// Run with an already bound listener and an explicit connector.
    pub async fn run_with<C: Connector>(
        self,
        listener: TcpListener,
        connector: C,
        cancel: CancellationToken,
    ) -> Result<()> {
        let config = self.config;
        let serial_port = connector.describe();

        let library = MediaLibrary::new(&config.media_dir);
        let media = Arc::new(library.validate_and_log(config.catalog));

        let hub = Arc::new(ConsumerHub::new());
        let device = DeviceHandle::new();
        let (queue, writer_thread) = DeviceQueue::spawn(device.clone())?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = watch::channel(None);

        let supervisor = Supervisor::new(
            connector,
            SupervisorConfig {
                catalog: config.catalog,
                reassembler: config.reassembler.clone(),
                reconnect_delay: config.reconnect_delay,
            },
            device,
            event_tx,
            cancel.clone(),
        );
        let link_rx = supervisor.subscribe();
        let serial_thread = supervisor.spawn()?;

        let dispatcher = PressDispatcher::new(
            config.catalog,
            Arc::clone(&hub),
            queue.clone(),
            Arc::clone(&media),
            config.device_managed_leds,
        );
        let event_loop = tokio::spawn(EventLoop::new(dispatcher, session_tx).run(
            event_rx,
            command_rx,
            cancel.clone(),
        ));

        let heartbeat_task = config.heartbeat.map(|period| {
            tokio::spawn(heartbeat(
                queue.clone(),
                link_rx.clone(),
                period,
                cancel.clone(),
            ))
        });

        info!(
            catalog_size = config.catalog.size(),
            %serial_port,
            device_managed_leds = config.device_managed_leds,
            media_complete = media.is_complete(),
            "bridge started"
        );

        let state = AppState {
            hub: Arc::clone(&hub),
            commands: command_tx,
            status: StatusSource {
                catalog: config.catalog,
                serial_port,
                host_leds: !config.device_managed_leds,
                media,
                hub,
                link: link_rx,
                session: session_rx,
            },
            cancel: cancel.clone(),
        };
        let served = server::serve(listener, state).await;

        // The server also returns on error; everything else follows it down.
        cancel.cancel();
        if let Err(err) = event_loop.await {
            warn!(error = %err, "event loop task failed");
        }
        if let Some(task) = heartbeat_task {
            let _ = task.await;
        }
        // Last sender; the writer drains what is queued and exits.
        drop(queue);
        join_thread("device writer", writer_thread).await?;
        join_thread("serial", serial_thread).await?;

        info!("bridge stopped");
        served
    }
}

async fn join_thread(name: &str, thread: std::thread::JoinHandle<()>) -> Result<()> {
    let joined = tokio::task::spawn_blocking(move || thread.join())
        .await
        .map_err(|err| BridgeError::Worker(err.to_string()))?;
    joined.map_err(|_| BridgeError::Worker(format!("{name} thread panicked")))
}

/// Queue `PING` every `period` while the link is up.
async fn heartbeat(
    queue: DeviceQueue,
    link: watch::Receiver<LinkState>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately; the supervisor already pings on connect.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !link.borrow().is_connected() {
                    continue;
                }
                match queue.push(DeviceCommand::Ping).wait().await {
                    Ok(()) => debug!("heartbeat sent"),
                    Err(err) => warn!(error = %err, "heartbeat failed"),
                }
            }
        }
    }
}
