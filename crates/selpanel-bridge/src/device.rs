use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use selpanel_frame::{CommandWriter, DeviceCommand};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};

type BoxedWriter = CommandWriter<Box<dyn Write + Send>>;

/// Shared write path to the panel.
///
/// The supervisor attaches the write half of each connection and detaches it
/// when the connection ends. Any number of callers may send concurrently; the
/// writer is behind a mutex, so commands never interleave on the wire.
///
/// A failed write detaches the writer and raises a fault flag that the
/// supervisor picks up on its next tick to tear the connection down.
#[derive(Clone, Default)]
pub struct DeviceHandle {
    inner: Arc<DeviceInner>,
}

#[derive(Default)]
struct DeviceInner {
    writer: Mutex<Option<BoxedWriter>>,
    faulted: AtomicBool,
}

impl DeviceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the write half of a new connection.
    pub fn attach(&self, writer: Box<dyn Write + Send>) {
        *self.lock() = Some(CommandWriter::new(writer));
        self.inner.faulted.store(false, Ordering::SeqCst);
    }

    /// Drop the write half, if any.
    pub fn detach(&self) {
        if self.lock().take().is_some() {
            debug!("device writer detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.lock().is_some()
    }

    /// Send one command (blocking).
    pub fn send(&self, command: DeviceCommand) -> Result<()> {
        let mut guard = self.lock();
        let Some(writer) = guard.as_mut() else {
            return Err(BridgeError::DeviceUnavailable);
        };
        match writer.send(command) {
            Ok(()) => {
                debug!(%command, "device command sent");
                Ok(())
            }
            Err(err) => {
                warn!(%command, error = %err, "device write failed");
                *guard = None;
                self.inner.faulted.store(true, Ordering::SeqCst);
                Err(err.into())
            }
        }
    }

    /// Return and clear the write-fault flag.
    pub fn take_fault(&self) -> bool {
        self.inner.faulted.swap(false, Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Option<BoxedWriter>> {
        self.inner
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ordered outbound command queue in front of a [`DeviceHandle`].
///
/// Commands are written by a single `selpanel-writer` thread in the order
/// they were queued, so an `LEDCLR` queued before an `LEDSET` can never
/// reach the panel after it. Queuing never blocks. The worker exits once
/// every clone of the queue is dropped.
#[derive(Debug, Clone)]
pub struct DeviceQueue {
    tx: mpsc::UnboundedSender<Queued>,
}

#[derive(Debug)]
struct Queued {
    command: DeviceCommand,
    done: oneshot::Sender<Result<()>>,
}

/// Completion of one queued command.
#[derive(Debug)]
pub struct DeviceReceipt {
    command: DeviceCommand,
    rx: oneshot::Receiver<Result<()>>,
}

impl DeviceReceipt {
    pub fn command(&self) -> DeviceCommand {
        self.command
    }

    /// Wait until the writer has attempted the command.
    pub async fn wait(self) -> Result<()> {
        self.rx
            .await
            .map_err(|_| BridgeError::Worker("device writer stopped".to_string()))?
    }
}

impl DeviceQueue {
    /// Start the writer thread for `device`.
    pub fn spawn(device: DeviceHandle) -> Result<(Self, thread::JoinHandle<()>)> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Queued>();
        let worker = thread::Builder::new()
            .name("selpanel-writer".to_string())
            .spawn(move || {
                while let Some(Queued { command, done }) = rx.blocking_recv() {
                    let result = device.send(command);
                    if let Err(err) = &result {
                        warn!(%command, error = %err, "device command not delivered");
                    }
                    let _ = done.send(result);
                }
                debug!("device writer stopped");
            })
            .map_err(|err| BridgeError::Worker(format!("failed to spawn device writer: {err}")))?;
        Ok((Self { tx }, worker))
    }

    /// Queue `command` behind everything queued before it.
    pub fn push(&self, command: DeviceCommand) -> DeviceReceipt {
        let (done, rx) = oneshot::channel();
        if self.tx.send(Queued { command, done }).is_err() {
            warn!(%command, "device writer stopped, command dropped");
        }
        DeviceReceipt { command, rx }
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("attached", &self.is_attached())
            .field("faulted", &self.inner.faulted.load(Ordering::SeqCst))
            .finish()
    }
}
