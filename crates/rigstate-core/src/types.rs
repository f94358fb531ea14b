//! Value and value-type definitions shared by every cell.
//!
//! A [`Value`] is the dynamically typed content of a cell. A [`ValueType`]
//! is the declared type that every stored value must satisfy; it coerces
//! candidate values (clamping, rounding, widening) or rejects them with
//! [`Error::InvalidValue`].

use std::fmt;

use crate::error::{Error, Result};

/// The content of a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of the value. Floats are accepted only when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// A numeric range made of one or more closed segments.
///
/// A value is in range when it lies inside any segment. Strict ranges
/// reject anything else; non-strict ranges clamp to the nearest segment
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    segments: Vec<(f64, f64)>,
    integer: bool,
    strict: bool,
}

impl Range {
    /// A strict range over the given segments.
    ///
    /// Segments are sorted by their lower bound. An empty segment list is
    /// replaced by a single `(0, 0)` segment.
    pub fn new(segments: &[(f64, f64)]) -> Self {
        let mut segments: Vec<(f64, f64)> = segments
            .iter()
            .map(|&(a, b)| if a <= b { (a, b) } else { (b, a) })
            .collect();
        if segments.is_empty() {
            segments.push((0.0, 0.0));
        }
        segments.sort_by(|a, b| a.0.total_cmp(&b.0));
        Range {
            segments,
            integer: false,
            strict: true,
        }
    }

    /// A strict integer range with a single segment `lo..=hi`.
    pub fn int(lo: i64, hi: i64) -> Self {
        Range::new(&[(lo as f64, hi as f64)]).integer()
    }

    /// Values are rounded to whole numbers and stored as [`Value::Int`].
    pub fn integer(mut self) -> Self {
        self.integer = true;
        self
    }

    /// Out-of-range values are clamped instead of rejected.
    pub fn loose(mut self) -> Self {
        self.strict = false;
        self
    }

    pub fn is_integer(&self) -> bool {
        self.integer
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn segments(&self) -> &[(f64, f64)] {
        &self.segments
    }

    fn contains(&self, v: f64) -> bool {
        self.segments.iter().any(|&(lo, hi)| v >= lo && v <= hi)
    }

    fn clamp(&self, v: f64) -> f64 {
        let mut best = self.segments[0].0;
        let mut best_dist = f64::INFINITY;
        for &(lo, hi) in &self.segments {
            let c = v.clamp(lo, hi);
            let d = (c - v).abs();
            if d < best_dist {
                best = c;
                best_dist = d;
            }
        }
        best
    }

    fn coerce(&self, value: &Value) -> Result<Value> {
        let raw = value
            .as_f64()
            .ok_or_else(|| Error::InvalidValue(format!("expected a number, got {value:?}")))?;
        if !raw.is_finite() {
            return Err(Error::InvalidValue(format!("{raw} is not finite")));
        }
        let v = if self.integer { raw.round() } else { raw };
        let v = if self.contains(v) {
            v
        } else if self.strict {
            return Err(Error::InvalidValue(format!(
                "{raw} outside {}",
                self.describe()
            )));
        } else {
            self.clamp(v)
        };
        if self.integer {
            Ok(Value::Int(v as i64))
        } else {
            Ok(Value::Float(v))
        }
    }

    fn describe(&self) -> String {
        self.segments
            .iter()
            .map(|(lo, hi)| format!("{lo}..={hi}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The in-range value nearest to zero.
    fn default_value(&self) -> Value {
        let v = self.clamp(0.0);
        if self.integer {
            Value::Int(v as i64)
        } else {
            Value::Float(v)
        }
    }
}

/// An enumeration of text keys, each with a display label.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    entries: Vec<(String, String)>,
    strict: bool,
}

impl EnumType {
    /// A strict enumeration; only the listed keys are accepted.
    pub fn new(entries: &[(&str, &str)]) -> Self {
        EnumType {
            entries: entries
                .iter()
                .map(|(k, l)| (k.to_string(), l.to_string()))
                .collect(),
            strict: true,
        }
    }

    /// Any text is accepted; the listed keys are only suggestions.
    pub fn loose(mut self) -> Self {
        self.strict = false;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, l)| l.as_str())
    }

    fn coerce(&self, value: &Value) -> Result<Value> {
        let text = match value {
            Value::Text(s) => s.clone(),
            Value::Int(v) => v.to_string(),
            other => {
                return Err(Error::InvalidValue(format!(
                    "expected an enumeration key, got {other:?}"
                )))
            }
        };
        if self.strict && self.label(&text).is_none() {
            return Err(Error::InvalidValue(format!("{text:?} is not a known key")));
        }
        Ok(Value::Text(text))
    }
}

/// The declared type of a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Integer,
    Float,
    Range(Range),
    Enum(EnumType),
    Boolean,
    Text,
}

impl ValueType {
    /// Check `value` against this type and return the value to store.
    pub fn coerce(&self, value: &Value) -> Result<Value> {
        match self {
            ValueType::Integer => value
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| Error::InvalidValue(format!("expected an integer, got {value:?}"))),
            ValueType::Float => value
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| Error::InvalidValue(format!("expected a number, got {value:?}"))),
            ValueType::Range(range) => range.coerce(value),
            ValueType::Enum(e) => e.coerce(value),
            ValueType::Boolean => value
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| Error::InvalidValue(format!("expected a boolean, got {value:?}"))),
            ValueType::Text => match value {
                Value::Text(s) => Ok(Value::Text(s.clone())),
                Value::Int(_) | Value::Float(_) => Ok(Value::Text(value.to_string())),
                Value::Bool(_) => Err(Error::InvalidValue(format!(
                    "expected text, got {value:?}"
                ))),
            },
        }
    }

    /// The value a freshly created cell of this type holds.
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::Integer => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Range(range) => range.default_value(),
            ValueType::Enum(e) => Value::Text(e.keys().next().unwrap_or_default().to_string()),
            ValueType::Boolean => Value::Bool(false),
            ValueType::Text => Value::Text(String::new()),
        }
    }

    /// Parse user-supplied text (e.g. from a command line) into a value
    /// of this type. The result is coerced.
    pub fn parse(&self, text: &str) -> Result<Value> {
        let t = text.trim();
        let bad = || Error::InvalidValue(format!("cannot parse {t:?}"));
        let value = match self {
            ValueType::Integer => Value::Int(t.parse().map_err(|_| bad())?),
            ValueType::Float | ValueType::Range(_) => Value::Float(t.parse().map_err(|_| bad())?),
            ValueType::Boolean => match t.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Value::Bool(true),
                "0" | "false" | "off" | "no" => Value::Bool(false),
                _ => return Err(bad()),
            },
            ValueType::Enum(_) | ValueType::Text => Value::Text(t.to_string()),
        };
        self.coerce(&value)
    }
}
