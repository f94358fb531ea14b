//! Line framing and classification for `;`-delimited rig protocols.
//!
//! Inbound bytes are accumulated in a [`LineBuffer`] and split on the
//! terminator. Each completed line is classified by [`classify_line`]:
//! power-on NUL garbage is stripped or discarded, the bare `?` busy reply is
//! recognized, and everything else is split into a two-character command
//! code, an optional `$` sub-receiver marker, and the payload.

use bytes::{Bytes, BytesMut};
use tracing::warn;

/// The semicolon byte that terminates every line.
pub const TERMINATOR: u8 = b';';

/// The busy/error reply.
pub const BUSY: &[u8] = b"?";

/// Maximum unterminated line length before the buffer is reset.
/// Real lines are at most a few dozen bytes.
pub const MAX_LINE: usize = 8192;

/// Accumulates inbound bytes and yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    pub fn new() -> Self {
        LineBuffer {
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Append `data` and return every line it completed, without terminators.
    ///
    /// If the unterminated remainder grows past [`MAX_LINE`] it is dropped.
    pub fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(data);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == TERMINATOR) {
            let mut line = self.buf.split_to(pos + 1);
            line.truncate(pos);
            lines.push(line.freeze());
        }
        if self.buf.len() > MAX_LINE {
            warn!(len = self.buf.len(), "line buffer overflow, resetting");
            self.buf.clear();
        }
        lines
    }

    /// Discard any partial line, e.g. after the link was replaced.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// One received line, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    /// Nothing left after stripping leading NULs.
    Empty,
    /// A NUL byte remained inside the line. Power-on garbage.
    Noise,
    /// The radio replied `?`.
    Busy,
    /// The line is not printable ASCII.
    Malformed(String),
    /// A command line: `CC[$]payload`.
    Message {
        /// The command code, normally two characters (shorter only when the
        /// whole line is shorter).
        code: String,
        /// `true` when the code was followed by `$` (sub receiver).
        sub: bool,
        /// Everything after the code and marker.
        data: String,
    },
}

/// Classify one line (terminator already removed).
pub fn classify_line(line: &[u8]) -> InboundLine {
    let start = line.iter().position(|&b| b != 0).unwrap_or(line.len());
    let line = &line[start..];

    if line.is_empty() {
        return InboundLine::Empty;
    }
    if line.contains(&0) {
        return InboundLine::Noise;
    }
    if line == BUSY {
        return InboundLine::Busy;
    }
    if !line.iter().all(|b| b.is_ascii() && !b.is_ascii_control()) {
        return InboundLine::Malformed(String::from_utf8_lossy(line).into_owned());
    }

    // All bytes are ASCII, so byte offsets are char boundaries.
    let text = String::from_utf8_lossy(line);
    let code_end = text.len().min(2);
    let code = text[..code_end].to_string();
    let sub = text.as_bytes().get(2) == Some(&b'$');
    let data_start = if sub { 3 } else { code_end };
    let data = text[data_start..].to_string();

    InboundLine::Message { code, sub, data }
}

/// Encode a command as `CODE` + `payload` + `;`.
///
/// # Examples
///
/// ```
/// use rigstate_text_io::protocol::encode_command;
///
/// assert_eq!(encode_command("FA", "00014074000"), b"FA00014074000;");
/// assert_eq!(encode_command("FA", ""), b"FA;");
/// ```
pub fn encode_command(code: &str, payload: &str) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(code.len() + payload.len() + 1);
    buf.extend_from_slice(code.as_bytes());
    buf.extend_from_slice(payload.as_bytes());
    buf.extend_from_slice(&[TERMINATOR]);
    buf.to_vec()
}
