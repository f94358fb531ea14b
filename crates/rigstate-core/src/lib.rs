//! rigstate-core: Cells, errors and link primitives for rigstate.
//!
//! This crate defines the manufacturer-agnostic pieces every rigstate
//! backend builds on: typed observable cells that mirror the radio's state,
//! the transport abstraction, session events and the shared error type.
//!
//! # Key types
//!
//! - [`Cell`] / [`ViewCell`] -- observable state, via the common [`StateCell`] trait
//! - [`Value`] / [`ValueType`] -- cell content and its declared type
//! - [`Transport`] -- byte-level communication channel
//! - [`SessionEvent`] / [`CommHealth`] -- link lifecycle notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod cell;
pub mod clock;
pub mod error;
pub mod events;
pub mod health;
pub mod helpers;
pub mod transport;
pub mod types;
pub mod view;

// Re-export key types at crate root for ergonomic `use rigstate_core::*`.
pub use cell::{Callback, Cell, StateCell, SubscriptionId, WriteHook};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use health::CommHealth;
pub use helpers::{display_value, format_freq_mhz};
pub use transport::Transport;
pub use types::{EnumType, Range, Value, ValueType};
pub use view::ViewCell;
