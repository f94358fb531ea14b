//! Formatting helpers for displaying cell values.

use crate::types::Value;

/// Format a frequency in hertz as a human-readable MHz string.
///
/// # Example
///
/// ```
/// use rigstate_core::format_freq_mhz;
///
/// assert_eq!(format_freq_mhz(14_074_000.0), "14.074000 MHz");
/// assert_eq!(format_freq_mhz(7_000_550.0), "7.000550 MHz");
/// ```
pub fn format_freq_mhz(freq_hz: f64) -> String {
    let mhz = freq_hz / 1_000_000.0;
    format!("{mhz:.6} MHz")
}

/// Render a cell value for display, treating frequency-like keys as hertz.
pub fn display_value(key: &str, value: &Value) -> String {
    let is_freq = matches!(key, "freq" | "b_freq" | "iq_center");
    match value.as_f64() {
        Some(hz) if is_freq => format_freq_mhz(hz),
        _ => value.to_string(),
    }
}
