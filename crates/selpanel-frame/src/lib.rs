//! Line reassembly and device protocol for the selection panel serial link.
//!
//! The panel speaks a newline-terminated ASCII protocol (`PRESS 007`,
//! `LEDSET 007`, ...). USB-CDC delivers it in arbitrary fragments, sometimes
//! splitting a keyword from its argument with a pause in between. This crate
//! turns that byte stream back into typed events:
//!
//! - [`FrameReassembler`] buffers chunks, splits lines and recovers fragments
//!   using a declared [`fragment`] table and a fragment timeout.
//! - [`interpret`] classifies one line into a [`ProtocolEvent`].
//! - [`DeviceCommand`] / [`CommandWriter`] encode and write host commands.
//! - [`LineReader`] drives a reassembler from any blocking `Read`.

pub mod command;
pub mod error;
pub mod event;
pub mod fragment;
pub mod id;
pub mod interpret;
pub mod reader;
pub mod reassembler;
pub mod writer;

pub use command::DeviceCommand;
pub use error::{FrameError, Result};
pub use event::ProtocolEvent;
pub use fragment::{FragmentShape, FragmentTable, KeywordShape, DEFAULT_FRAGMENT_TABLE};
pub use id::{Catalog, MediaId, MAX_CATALOG_SIZE};
pub use interpret::{interpret, interpret_fragment};
pub use reader::LineReader;
pub use reassembler::{
    FrameReassembler, Reassembled, ReassemblerConfig, DEFAULT_FRAGMENT_TIMEOUT,
    DEFAULT_MAX_LINE_LEN,
};
pub use writer::CommandWriter;
