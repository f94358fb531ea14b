//! Communication health of a protocol session.

use std::fmt;

/// How well the link to the radio is working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommHealth {
    /// Lines are arriving and decoding.
    Ok,
    /// Nothing useful has been heard within the response window.
    NotResponding,
    /// The last line could not be decoded.
    BadData,
    /// The transport reported that the link is gone.
    LinkLost,
}

impl CommHealth {
    pub fn is_ok(self) -> bool {
        self == CommHealth::Ok
    }

    /// The user-facing error text; empty when healthy.
    pub fn message(self) -> &'static str {
        match self {
            CommHealth::Ok => "",
            CommHealth::NotResponding => "Radio not responding.",
            CommHealth::BadData => "Bad data from radio.",
            CommHealth::LinkLost => "Serial link lost.",
        }
    }
}

impl fmt::Display for CommHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommHealth::Ok => "ok",
            CommHealth::NotResponding => "not-responding",
            CommHealth::BadData => "bad-data",
            CommHealth::LinkLost => "link-lost",
        };
        f.write_str(s)
    }
}
