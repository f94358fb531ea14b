//! The fixed set of cells mirrored from the radio.
//!
//! Entries flagged `sub` also get a `key$` twin for the sub receiver.
//! Entries with a write command are host-writable: a successful
//! [`Cell::set`] encodes the value and queues a [`HostCommand::Write`] for
//! the session, which stores the value and sends the SET command.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use rigstate_core::{Cell, EnumType, Range, Value, ValueType, WriteHook};
use rigstate_text_io::encode_command;

use crate::commands::{Encoder, RadioMode};
use crate::session::HostCommand;

/// One schema entry.
#[derive(Debug, Clone)]
pub struct CellSpec {
    pub key: &'static str,
    pub value_type: ValueType,
    pub sub: bool,
    /// SET code and payload encoding; `None` for read-only cells.
    pub write: Option<(&'static str, Encoder)>,
}

fn spec(key: &'static str, value_type: ValueType) -> CellSpec {
    CellSpec {
        key,
        value_type,
        sub: false,
        write: None,
    }
}

impl CellSpec {
    fn sub(mut self) -> Self {
        self.sub = true;
        self
    }

    fn write(mut self, code: &'static str, encoder: Encoder) -> Self {
        self.write = Some((code, encoder));
        self
    }
}

fn range(lo: i64, hi: i64) -> ValueType {
    ValueType::Range(Range::int(lo, hi))
}

fn vfo() -> ValueType {
    ValueType::Enum(EnumType::new(&[("0", "A"), ("1", "B")]))
}

fn mode_type() -> ValueType {
    let entries: Vec<(&str, &str)> = RadioMode::ALL.iter().map(|m| (m.label(), m.label())).collect();
    ValueType::Enum(EnumType::new(&entries).loose())
}

/// The complete schema.
pub fn schema() -> Vec<CellSpec> {
    use Encoder::{Digits, Flag, Freq};
    use ValueType::{Boolean, Integer, Text};

    vec![
        // main knobs
        spec("freq", range(100_000, 99_999_999_999)).write("FA", Freq),
        spec("b_freq", range(100_000, 99_999_999_999)).write("FB", Freq),
        spec("af_gain", range(0, 255)).sub().write("AG", Digits(3)),
        spec("rf_gain", range(0, 250)).sub().write("RG", Digits(3)),
        spec("mode", mode_type()).sub().write("MD", Encoder::Mode),
        spec("data_mode", Text).sub(),
        // VFO
        spec("channel", Integer),
        spec("vfo_lock", Boolean).sub(),
        spec("vfo_link", Boolean),
        spec("split", Boolean),
        spec("diversity", Boolean),
        spec("scan", Boolean),
        spec("sub_on", Boolean),
        spec("band", Integer).sub(),
        spec("vfo_rx", vfo()),
        spec("vfo_tx", vfo()),
        spec("rit_on", Boolean).write("RT", Flag),
        spec("xit_on", Boolean).write("XT", Flag),
        spec("rit_offset", range(-9999, 9999)),
        // receive
        spec("bandwidth", range(0, 9999)).sub(),
        spec("if_shift", range(0, 9999)),
        spec("agc_time", ValueType::Range(Range::new(&[(2.0, 2.0), (4.0, 4.0)]).integer())),
        spec("noise_blanker", Boolean).sub().write("NB", Flag),
        spec("rx_atten", Text).sub(),
        spec("rx_preamp", Boolean).sub().write("PA", Flag),
        spec("squelch", range(0, 29)).sub().write("SQ", Digits(3)),
        spec("XFIL", Text).sub(),
        spec("if_freq", range(0, 9999)),
        spec("apf", Boolean),
        // transmit
        spec("compression", range(0, 40)).write("CP", Digits(3)),
        spec("essb", Boolean),
        spec("keyer_speed", range(8, 50)).write("KS", Digits(3)),
        spec("mic_gain", range(0, 60)).write("MG", Digits(3)),
        spec("monitor_level", range(0, 60)).write("ML", Digits(3)),
        spec("sidetone", range(300, 800)),
        spec("tx_power_set", range(0, 110)).write("PC", Digits(3)),
        spec("tx_power_act", ValueType::Range(Range::new(&[(0.0, 110.0)]).loose())),
        spec("vox", Boolean).write("VX", Flag),
        // misc
        spec("antenna", ValueType::Enum(EnumType::new(&[("1", "1"), ("2", "2")]))),
    ]
}

fn write_hook(
    key: String,
    code: String,
    encoder: Encoder,
    writes: mpsc::UnboundedSender<HostCommand>,
) -> WriteHook {
    Box::new(move |value: &Value| {
        let write = HostCommand::Write {
            key: key.clone(),
            value: value.clone(),
            command: encoder
                .encode(value)
                .map(|payload| encode_command(&code, &payload)),
        };
        if writes.send(write).is_err() {
            debug!(key = %key, "session closed, write dropped");
        }
    })
}

fn build_cell(
    key: String,
    spec: &CellSpec,
    code: Option<String>,
    writes: &mpsc::UnboundedSender<HostCommand>,
) -> Arc<Cell> {
    let mut cell = Cell::new(key.clone(), spec.value_type.clone());
    if let (Some(code), Some((_, encoder))) = (code, spec.write) {
        cell = cell
            .writable(true)
            .with_hook(write_hook(key, code, encoder, writes.clone()));
    }
    Arc::new(cell)
}

/// Create every schema cell. Writable cells queue their host writes on
/// `writes`.
pub fn install(writes: &mpsc::UnboundedSender<HostCommand>) -> BTreeMap<String, Arc<Cell>> {
    let mut cells = BTreeMap::new();
    for spec in schema() {
        let code = spec.write.map(|(code, _)| code);
        cells.insert(
            spec.key.to_string(),
            build_cell(spec.key.to_string(), &spec, code.map(str::to_string), writes),
        );
        if spec.sub {
            let key = format!("{}$", spec.key);
            cells.insert(
                key.clone(),
                build_cell(key, &spec, code.map(|c| format!("{c}$")), writes),
            );
        }
    }
    cells
}
