//! Serial-to-WebSocket bridge for the selection panel.
//!
//! Button presses arrive from the panel over serial, are dispatched with a
//! "last press wins" policy, and are broadcast to every connected consumer
//! as `stop` + `play` messages. Consumers report `ended` back, which clears
//! the panel's indicator if that media is still the active one.

pub mod bridge;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod media;
pub mod message;
pub mod server;
pub mod status;
pub mod supervisor;

pub use bridge::{Bridge, BridgeCommand, BridgeConfig, EventLoop, DEFAULT_LISTEN};
pub use device::{DeviceHandle, DeviceQueue, DeviceReceipt};
pub use dispatcher::{PressDispatcher, PressOutcome};
pub use error::{BridgeError, Result};
pub use hub::{
    BroadcastReport, ConsumerChannel, ConsumerHub, ConsumerId, ConsumerReceiver, CONSUMER_QUEUE_DEPTH,
};
pub use media::{AssetState, MediaLibrary, MediaReport, MediaStatus, MISSING_PREVIEW_LEN};
pub use message::{Broadcast, ConsumerMessage};
pub use status::{HealthReport, StatusReport, StatusSource};
pub use supervisor::{
    Connector, LinkState, SerialConnector, Supervisor, SupervisorConfig, DEFAULT_RECONNECT_DELAY,
};
