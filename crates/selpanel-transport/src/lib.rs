//! Serial endpoint abstraction for the selection panel bridge.
//!
//! Opens and configures the character device the button panel is attached to
//! and hands out a [`SerialStream`] that implements `Read + Write`.
//!
//! This is the lowest layer of selpanel. Line reassembly and the device
//! protocol live in `selpanel-frame`; connection supervision lives in
//! `selpanel-bridge`.

pub mod error;
pub mod serial;
pub mod stream;

pub use error::{Result, TransportError};
pub use serial::{available_ports, PortInfo, SerialConfig, SerialEndpoint};
pub use stream::SerialStream;
