//! Shared IO task for `;`-delimited text-protocol rig sessions.
//!
//! One tokio task owns the transport exclusively and drives a protocol
//! state machine: inbound line framing, poll timers, host-queued commands,
//! and graceful shutdown.
//!
//! # Architecture
//!
//! - [`protocol`] -- line framing, classification and command encoding
//! - [`io`] -- the [`io::LineSession`] seam, spawn, and the select loop

pub mod io;
pub mod protocol;

pub use io::{spawn_session_task, IoParts, LineSession, SessionIo};
pub use protocol::{classify_line, encode_command, InboundLine, LineBuffer};
