//! Transport implementations for rigstate.
//!
//! This crate provides [`SerialTransport`], the concrete
//! [`Transport`](rigstate_core::Transport) for serial-attached radios.

pub mod serial;

pub use serial::{
    DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits, DEFAULT_BAUD_RATE,
};
