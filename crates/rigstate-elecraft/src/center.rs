//! IQ centre frequency.
//!
//! The I/Q output of the radio is not centred on the dial frequency: in CW
//! the carrier sits at the sidetone pitch and in AM/FM at a fixed offset.
//! `iq_offset` holds the current offset and `iq_center` is a view over
//! `freq` that adds the offset for the current `mode` and `sidetone`.
//! Writing `iq_center` tunes `freq` so the centre lands where asked.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use rigstate_core::{Cell, Error, Result, Value, ValueType, ViewCell};

use crate::commands::RadioMode;

/// Offset used in AM and FM, hertz.
pub const AM_FM_OFFSET: f64 = 11_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum OffsetPolicy {
    Zero,
    Sidetone,
    NegSidetone,
    Fixed(f64),
}

/// Indexed by [`RadioMode::index`].
const OFFSET_POLICY: [OffsetPolicy; RadioMode::ALL.len()] = [
    OffsetPolicy::Zero,                // LSB
    OffsetPolicy::Zero,                // USB
    OffsetPolicy::Sidetone,            // CW
    OffsetPolicy::Fixed(AM_FM_OFFSET), // FM
    OffsetPolicy::Fixed(AM_FM_OFFSET), // AM
    OffsetPolicy::Zero,                // DATA
    OffsetPolicy::NegSidetone,         // CW-REV
    OffsetPolicy::Zero,                // DATA-REV
];

/// The IQ offset for a mode label and sidetone pitch. Unrecognized modes
/// get no offset.
pub fn iq_offset_for(mode: &Value, sidetone: &Value) -> f64 {
    let policy = mode
        .as_str()
        .and_then(RadioMode::from_label)
        .map(|m| OFFSET_POLICY[m.index()])
        .unwrap_or(OffsetPolicy::Zero);
    let pitch = sidetone.as_f64().unwrap_or(0.0);
    match policy {
        OffsetPolicy::Zero => 0.0,
        OffsetPolicy::Sidetone => pitch,
        OffsetPolicy::NegSidetone => -pitch,
        OffsetPolicy::Fixed(offset) => offset,
    }
}

fn required(cells: &BTreeMap<String, Arc<Cell>>, key: &str) -> Result<Arc<Cell>> {
    cells
        .get(key)
        .cloned()
        .ok_or_else(|| Error::UnknownCell(key.to_string()))
}

/// Create `iq_offset` and the `iq_center` view, and keep them tracking
/// `mode` and `sidetone`.
pub fn install_center(
    cells: &BTreeMap<String, Arc<Cell>>,
) -> Result<(Arc<Cell>, Arc<ViewCell>)> {
    let freq = required(cells, "freq")?;
    let mode = required(cells, "mode")?;
    let sidetone = required(cells, "sidetone")?;

    let iq_offset = Arc::new(Cell::new("iq_offset", ValueType::Float));

    // The view reads its inputs directly so it never lags `iq_offset`.
    let (fwd_mode, fwd_tone) = (mode.clone(), sidetone.clone());
    let (inv_mode, inv_tone) = (mode.clone(), sidetone.clone());
    let iq_center = ViewCell::new(
        "iq_center",
        ValueType::Float,
        freq,
        Box::new(move |v: &Value| {
            let offset = iq_offset_for(&fwd_mode.get(), &fwd_tone.get());
            Value::Float(v.as_f64().unwrap_or(0.0) + offset)
        }),
        Box::new(move |v: &Value| {
            let center = v
                .as_f64()
                .ok_or_else(|| Error::InvalidValue(format!("iq_center: not a number: {v}")))?;
            Ok(Value::Float(
                center - iq_offset_for(&inv_mode.get(), &inv_tone.get()),
            ))
        }),
    );

    let recompute = {
        let mode: Weak<Cell> = Arc::downgrade(&mode);
        let sidetone: Weak<Cell> = Arc::downgrade(&sidetone);
        let view: Weak<ViewCell> = Arc::downgrade(&iq_center);
        let offset = iq_offset.clone();
        Arc::new(move || {
            let (Some(mode), Some(sidetone)) = (mode.upgrade(), sidetone.upgrade()) else {
                return;
            };
            let value = Value::Float(iq_offset_for(&mode.get(), &sidetone.get()));
            // Float accepts any float, so this cannot fail.
            let _ = offset.set_internal(value);
            if let Some(view) = view.upgrade() {
                view.changed_transform();
            }
        })
    };
    mode.subscribe(recompute.clone());
    sidetone.subscribe(recompute.clone());
    recompute();

    Ok((iq_offset, iq_center))
}
