//! Bridge a serial button panel to WebSocket media players.
//!
//! A panel of illuminated buttons reports presses over USB serial. The
//! bridge turns each press into `stop` + `play` broadcasts for every
//! connected player, preempting whatever was playing, and keeps the serial
//! link alive across unplugs and resets.
//!
//! # Crate Structure
//!
//! - [`transport`]: Serial endpoint and stream abstraction
//! - [`frame`]: Line reassembly, protocol events and device commands
//! - [`bridge`]: Dispatch, consumer fan-out, supervision and HTTP surface

/// Re-export transport types.
pub mod transport {
    pub use selpanel_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use selpanel_frame::*;
}

/// Re-export bridge types.
pub mod bridge {
    pub use selpanel_bridge::*;
}
