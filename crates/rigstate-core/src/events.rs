//! Session event types.
//!
//! Events are emitted by a protocol session through a
//! [`tokio::sync::broadcast`] channel. Per-value changes are delivered by cell
//! subscriptions instead; events cover the lifecycle of the link itself.

use crate::health::CommHealth;

/// An event emitted by a protocol session.
///
/// Delivery is best-effort through a bounded broadcast channel; slow
/// consumers may observe `RecvError::Lagged`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A transport was attached and initialization was sent.
    Connected,

    /// Communication health changed.
    HealthChanged(CommHealth),

    /// A full state request was sent to the radio.
    Resync,

    /// The link was lost or closed. Cells keep their last values.
    Disconnected,
}
