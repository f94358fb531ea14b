//! Elecraft CAT backend for rigstate.
//!
//! Keeps a live, two-way mirror of an Elecraft K2/K3/KX3 transceiver's state
//! over its `;`-delimited ASCII protocol:
//!
//! - **Command table** ([`commands`]) -- code to cell mapping, field
//!   decoders and SET encoders.
//! - **Status frame** ([`status`]) -- positional decoding of `IF`.
//! - **Schema** ([`schema`]) -- the fixed cell set, including `$`
//!   sub-receiver twins.
//! - **Session** ([`session`]) -- the protocol state machine: dispatch,
//!   health tracking, polling and resync.
//! - **Radio handle** ([`radio`]) and **builder** ([`builder`]).
//!
//! # Example
//!
//! ```no_run
//! use rigstate_core::Value;
//!
//! # async fn example() -> rigstate_core::Result<()> {
//! let radio = rigstate_elecraft::connect("/dev/ttyUSB0", 38_400).await?;
//! radio.set("freq", Value::Int(14_074_000))?;
//! println!("mode = {}", radio.cell("mode")?.get());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod center;
pub mod commands;
pub mod poll;
pub mod radio;
pub mod schema;
pub mod session;
pub mod state;
pub mod status;

pub use builder::{connect, ElecraftBuilder};
pub use commands::RadioMode;
pub use radio::{ElecraftRadio, IQ_CENTER_KEY};
pub use state::SessionState;
