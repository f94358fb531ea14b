//! rigstate-test-harness: Test utilities for rigstate.
//!
//! This crate provides [`MockTransport`] and its [`MockLink`] control handle
//! for deterministic testing of protocol sessions without real radio
//! hardware.

pub mod mock_serial;

pub use mock_serial::{MockLink, MockTransport};
