//! The `IF` status frame.
//!
//! `IF` packs several fields at fixed offsets with no delimiters, so it is
//! sliced positionally. The payload (after `IF`, before `;`) is 35 bytes:
//!
//! ```text
//! offset  width  field
//!  0      11     VFO A frequency, Hz
//! 11       5     (unused)
//! 16       5     RIT/XIT offset, signed
//! 21       1     RIT on
//! 22       1     XIT on
//! 23       3     (unused)
//! 26       1     transmitting (not tracked)
//! 27       1     mode code
//! 28       1     receive VFO
//! 29       1     scan
//! 30       1     split
//! 31       1     band changed (not tracked)
//! 32       1     data sub-mode
//! 33       2     (unused)
//! ```
//!
//! A frame decodes completely or not at all.

use rigstate_core::{Error, Result, Value};

use crate::commands::Decoder;

/// Exact payload length of an `IF` frame.
pub const IF_PAYLOAD_LEN: usize = 35;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusFrame {
    pub freq: Value,
    pub rit_offset: Value,
    pub rit_on: Value,
    pub xit_on: Value,
    pub mode: Value,
    pub vfo_rx: Value,
    pub scan: Value,
    pub split: Value,
    pub data_mode: Value,
}

impl StatusFrame {
    pub fn decode(data: &str) -> Result<Self> {
        if data.len() != IF_PAYLOAD_LEN || !data.is_ascii() {
            return Err(Error::Protocol(format!(
                "IF payload must be {IF_PAYLOAD_LEN} ASCII bytes, got {} ({data:?})",
                data.len()
            )));
        }
        let at = |start: usize, len: usize| &data[start..start + len];
        let field = |name: &str, decoder: Decoder, text: &str| {
            decoder
                .decode(text)
                .map_err(|e| Error::Protocol(format!("IF {name}: {e}")))
        };

        Ok(StatusFrame {
            freq: field("freq", Decoder::Int, at(0, 11))?,
            rit_offset: field("rit_offset", Decoder::Int, at(16, 5))?,
            rit_on: field("rit_on", Decoder::DigitBool, at(21, 1))?,
            xit_on: field("xit_on", Decoder::DigitBool, at(22, 1))?,
            mode: field("mode", Decoder::Mode, at(27, 1))?,
            vfo_rx: field("vfo_rx", Decoder::Int, at(28, 1))?,
            scan: field("scan", Decoder::DigitBool, at(29, 1))?,
            split: field("split", Decoder::DigitBool, at(30, 1))?,
            data_mode: field("data_mode", Decoder::Int, at(32, 1))?,
        })
    }

    /// The cell updates this frame carries, in frame order.
    pub fn updates(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("freq", self.freq.clone()),
            ("rit_offset", self.rit_offset.clone()),
            ("rit_on", self.rit_on.clone()),
            ("xit_on", self.xit_on.clone()),
            ("mode", self.mode.clone()),
            ("vfo_rx", self.vfo_rx.clone()),
            ("scan", self.scan.clone()),
            ("split", self.split.clone()),
            ("data_mode", self.data_mode.clone()),
        ]
    }
}

/// Build an `IF` payload. Test helper shared with the session tests.
#[cfg(test)]
pub(crate) fn if_payload(freq: u64, rit: i32, mode: char, split: bool) -> String {
    let split = if split { '1' } else { '0' };
    let sign = if rit < 0 { '-' } else { '+' };
    let rit_abs = rit.unsigned_abs();
    format!("{freq:011}     {sign}{rit_abs:04}00 000{mode}00{split}001 ")
}
