//! Elecraft CAT command table, field decoders and write encoders.
//!
//! Every recognized two-letter code maps to a [`CommandEntry`]: either
//! acknowledged-and-ignored, or a state key plus the [`Decoder`] that turns
//! the payload text into a [`Value`]. A code followed by `$` addresses the
//! sub receiver and updates `key$` instead of `key`.
//!
//! All functions here are pure; the session applies the results.
//!
//! # Elecraft CAT reference
//!
//! Based on the K2/K3/KX3 programmer's references. Frequencies are 11 ASCII
//! digits in hertz. Mode codes are single digits:
//!
//! | code | mode     |
//! |------|----------|
//! | 1    | LSB      |
//! | 2    | USB      |
//! | 3    | CW       |
//! | 4    | FM       |
//! | 5    | AM       |
//! | 6    | DATA     |
//! | 7    | CW-REV   |
//! | 9    | DATA-REV |

use rigstate_core::{Error, Result, Value};

// ---------------------------------------------------------------
// Fixed command strings
// ---------------------------------------------------------------

/// Sent on connect: auto-info mode 2 (notify every change) and extended
/// responses (needed for `FW`).
pub const SETUP: &str = "AI2;K31;";

/// The full state request: the status frame plus every tracked query,
/// including the `$` sub-receiver variants.
pub const REQUEST_ALL: &str = concat!(
    "IF;",
    "AG;AG$;AN;AP;BN;BN$;BW;BW$;CP;CW;DV;ES;FA;FB;FI;FR;FT;GT;IS;KS;",
    "LK;LK$;LN;MC;MD;MD$;MG;ML;NB;NB$;PA;PA$;PC;RA;RA$;RG;RG$;SB;SQ;",
    "SQ$;VX;XF;XF$;",
);

/// Routine poll after a response: VFO A for responsiveness, band so a band
/// change is noticed promptly.
pub const FAST_PROBE: &str = "FA;BN;";

/// Minimal liveness probe while the radio is silent.
pub const DOUBTFUL_PROBE: &str = "FA;";

/// The status frame code.
pub const STATUS_CODE: &str = "IF";

// ---------------------------------------------------------------
// Modes
// ---------------------------------------------------------------

/// Operating modes that have a defined CAT code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadioMode {
    Lsb,
    Usb,
    Cw,
    Fm,
    Am,
    Data,
    CwRev,
    DataRev,
}

/// Mode by CAT code position. Codes 0 and 8 are undefined.
const MODE_TABLE: [Option<RadioMode>; 10] = [
    None,
    Some(RadioMode::Lsb),
    Some(RadioMode::Usb),
    Some(RadioMode::Cw),
    Some(RadioMode::Fm),
    Some(RadioMode::Am),
    Some(RadioMode::Data),
    Some(RadioMode::CwRev),
    None,
    Some(RadioMode::DataRev),
];

impl RadioMode {
    /// All modes, in CAT code order.
    pub const ALL: [RadioMode; 8] = [
        RadioMode::Lsb,
        RadioMode::Usb,
        RadioMode::Cw,
        RadioMode::Fm,
        RadioMode::Am,
        RadioMode::Data,
        RadioMode::CwRev,
        RadioMode::DataRev,
    ];

    pub fn from_code(code: usize) -> Option<Self> {
        MODE_TABLE.get(code).copied().flatten()
    }

    pub fn code(self) -> u8 {
        match self {
            RadioMode::Lsb => 1,
            RadioMode::Usb => 2,
            RadioMode::Cw => 3,
            RadioMode::Fm => 4,
            RadioMode::Am => 5,
            RadioMode::Data => 6,
            RadioMode::CwRev => 7,
            RadioMode::DataRev => 9,
        }
    }

    /// Position in [`RadioMode::ALL`]; used to index per-mode tables.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            RadioMode::Lsb => "LSB",
            RadioMode::Usb => "USB",
            RadioMode::Cw => "CW",
            RadioMode::Fm => "FM",
            RadioMode::Am => "AM",
            RadioMode::Data => "DATA",
            RadioMode::CwRev => "CW-REV",
            RadioMode::DataRev => "DATA-REV",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        RadioMode::ALL.into_iter().find(|m| m.label() == label)
    }
}

/// Decode a mode code to its label.
///
/// Undefined, out-of-range and non-numeric codes come back as the raw text,
/// so firmware with modes unknown here still reports something.
pub fn decode_mode(text: &str) -> String {
    text.trim()
        .parse::<usize>()
        .ok()
        .and_then(RadioMode::from_code)
        .map(|m| m.label().to_string())
        .unwrap_or_else(|| text.to_string())
}

// ---------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------

/// Turns a payload into a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoder {
    /// Decimal integer, surrounding whitespace and a sign allowed.
    Int,
    /// Integer; non-zero is `true`.
    DigitBool,
    /// Number multiplied by the factor.
    Scaled(f64),
    /// The payload as-is.
    Text,
    /// Mode code to label, see [`decode_mode`].
    Mode,
    /// Integer made of the first `n` characters; trailing extension
    /// digits are ignored.
    LeadingInt(usize),
}

impl Decoder {
    pub fn decode(self, text: &str) -> Result<Value> {
        match self {
            Decoder::Int => parse_int(text).map(Value::Int),
            Decoder::DigitBool => parse_int(text).map(|n| Value::Bool(n != 0)),
            Decoder::Scaled(factor) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| Value::Float(v * factor))
                .ok_or_else(|| Error::Protocol(format!("invalid number: {text:?}"))),
            Decoder::Text => Ok(Value::Text(text.to_string())),
            Decoder::Mode => Ok(Value::Text(decode_mode(text))),
            Decoder::LeadingInt(n) => {
                let end = text
                    .char_indices()
                    .nth(n)
                    .map(|(i, _)| i)
                    .unwrap_or(text.len());
                parse_int(&text[..end]).map(Value::Int)
            }
        }
    }
}

fn parse_int(text: &str) -> Result<i64> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| Error::Protocol(format!("invalid integer: {text:?}")))
}

// ---------------------------------------------------------------
// Command table
// ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandEntry {
    /// Recognized; carries nothing we track.
    Ignored,
    Field {
        key: &'static str,
        decoder: Decoder,
    },
}

const fn field(key: &'static str, decoder: Decoder) -> CommandEntry {
    CommandEntry::Field { key, decoder }
}

/// Every recognized code except the `IF` status frame.
pub static COMMAND_TABLE: &[(&str, CommandEntry)] = &[
    ("AG", field("af_gain", Decoder::Int)),
    ("AI", CommandEntry::Ignored),
    ("AN", field("antenna", Decoder::Text)),
    ("AP", field("apf", Decoder::DigitBool)),
    ("BN", field("band", Decoder::Int)),
    ("BW", field("bandwidth", Decoder::Scaled(10.0))),
    ("CP", field("compression", Decoder::Int)),
    ("CW", field("sidetone", Decoder::Scaled(10.0))),
    ("DT", field("data_mode", Decoder::Int)),
    ("DV", field("diversity", Decoder::DigitBool)),
    ("ES", field("essb", Decoder::DigitBool)),
    ("FA", field("freq", Decoder::Int)),
    ("FB", field("b_freq", Decoder::Int)),
    ("FI", field("if_freq", Decoder::Int)),
    ("FR", field("vfo_rx", Decoder::Text)),
    ("FT", field("vfo_tx", Decoder::Text)),
    ("FW", field("bandwidth", Decoder::Scaled(10.0))),
    ("GT", field("agc_time", Decoder::LeadingInt(3))),
    ("ID", CommandEntry::Ignored),
    ("IS", field("if_shift", Decoder::Int)),
    ("K2", CommandEntry::Ignored),
    ("K3", CommandEntry::Ignored),
    ("KS", field("keyer_speed", Decoder::Int)),
    ("LK", field("vfo_lock", Decoder::DigitBool)),
    ("LN", field("vfo_link", Decoder::DigitBool)),
    ("MC", field("channel", Decoder::Int)),
    ("MD", field("mode", Decoder::Mode)),
    ("MG", field("mic_gain", Decoder::Int)),
    ("ML", field("monitor_level", Decoder::Int)),
    ("NB", field("noise_blanker", Decoder::DigitBool)),
    ("OM", CommandEntry::Ignored),
    ("PA", field("rx_preamp", Decoder::DigitBool)),
    ("PC", field("tx_power_set", Decoder::LeadingInt(3))),
    ("PO", field("tx_power_act", Decoder::Scaled(0.1))),
    ("RA", field("rx_atten", Decoder::Text)),
    ("RG", field("rf_gain", Decoder::Int)),
    ("RO", field("rit_offset", Decoder::Int)),
    ("RT", field("rit_on", Decoder::DigitBool)),
    ("SB", field("sub_on", Decoder::DigitBool)),
    ("SQ", field("squelch", Decoder::Int)),
    ("VX", field("vox", Decoder::DigitBool)),
    ("XF", field("XFIL", Decoder::Text)),
    ("XT", field("xit_on", Decoder::DigitBool)),
];

/// Outcome of looking up a received code.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Ignored,
    Unknown,
    /// Apply `decoder` to the payload and store under `key`.
    Field { key: String, decoder: Decoder },
}

/// Look up `code`; `sub` selects the `key$` cell.
pub fn lookup(code: &str, sub: bool) -> Dispatch {
    match COMMAND_TABLE.iter().find(|(c, _)| *c == code) {
        None => Dispatch::Unknown,
        Some((_, CommandEntry::Ignored)) => Dispatch::Ignored,
        Some((_, CommandEntry::Field { key, decoder })) => Dispatch::Field {
            key: if sub {
                format!("{key}$")
            } else {
                key.to_string()
            },
            decoder: *decoder,
        },
    }
}

// ---------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------

/// Turns a stored value into a SET payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoder {
    /// 11-digit hertz.
    Freq,
    /// Zero-padded to the given width.
    Digits(usize),
    /// `0` or `1`.
    Flag,
    /// Mode label to code.
    Mode,
}

impl Encoder {
    /// The payload for `value`, or `None` if it has no wire form.
    pub fn encode(self, value: &Value) -> Option<String> {
        match self {
            Encoder::Freq => value
                .as_i64()
                .filter(|v| *v >= 0)
                .map(|v| format!("{v:011}")),
            Encoder::Digits(width) => value
                .as_i64()
                .filter(|v| *v >= 0)
                .map(|v| format!("{v:0width$}")),
            Encoder::Flag => value.as_bool().map(|b| if b { "1" } else { "0" }.to_string()),
            Encoder::Mode => {
                let label = value.as_str()?;
                match RadioMode::from_label(label) {
                    Some(m) => Some(m.code().to_string()),
                    None if label.len() == 1 && label.bytes().all(|b| b.is_ascii_digit()) => {
                        Some(label.to_string())
                    }
                    None => None,
                }
            }
        }
    }
}
