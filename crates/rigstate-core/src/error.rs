//! Error types for rigstate.
//!
//! Every fallible operation in the workspace returns [`Result<T>`]. Cell
//! validation failures, protocol decode faults, and link-level failures all
//! share the one [`Error`] enum so callers can match on a single type.

/// The error type for all rigstate operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port could not be opened or written).
    #[error("transport error: {0}")]
    Transport(String),

    /// A line or field received from the radio could not be decoded.
    ///
    /// The session contains these: the line is logged and discarded and the
    /// communication health becomes bad-data. They never reach a cell writer.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A value failed the type or range check of the cell it was written to.
    ///
    /// The cell keeps its previous value and no subscriber is notified.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A host write targeted a cell that only the radio may change.
    #[error("cell is not writable: {0}")]
    NotWritable(String),

    /// A builder or call argument was missing or inconsistent.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No cell is registered under the requested key.
    #[error("unknown cell: {0}")]
    UnknownCell(String),

    /// A transport read returned no data before its deadline.
    ///
    /// The session IO task treats this as an idle tick, not a failure.
    #[error("timeout waiting for data")]
    Timeout,

    /// The radio did not answer within the time a caller was willing to wait.
    #[error("radio not responding")]
    NotResponding,

    /// No connection to the radio has been established.
    #[error("not connected")]
    NotConnected,

    /// The link to the radio went away; a new connection is required.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
