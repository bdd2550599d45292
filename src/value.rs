// File: src/value.rs
//
// The single polymorphic value type usable on the task stack, in memory
// cells, and as operation operands.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// A named state value, e.g. `State("ALARM", Some(3))`, used by the host
/// framework's point/metadata model for discrete, coded states.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub name: String,
    pub code: Option<i64>,
}

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), code: None }
    }

    pub fn with_code(name: impl Into<String>, code: i64) -> Self {
        Self { name: name.into(), code: Some(code) }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}({})", self.name, code),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An insertion-ordered string-keyed map, the `Dict` container variant.
///
/// A plain `Vec<(String, Value)>` is used rather than a third-party
/// ordered-map crate; lookups are linear but containers built by RPN
/// programs are small (assembled a handful of `apply`s at a time), and this
/// mirrors the host codebase's own preference for plain collections over
/// ordered-map crates elsewhere in its value representation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dict {
    entries: Vec<(String, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Inserts or overwrites `key`. Overwriting preserves the original
    /// insertion position, matching ordinary map semantics.
    pub fn insert(&mut self, key: String, value: Value) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.entries.iter()
    }
}

/// The tagged value that flows through the stack, memory cells, inputs,
/// and parameters. See spec §3.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    BigDecimal(BigDecimal),
    Text(String),
    State(State),
    Stamp(DateTime<Utc>),
    Elapsed(Duration),
    Tuple(Vec<Value>),
    Dict(Dict),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_) | Value::BigDecimal(_))
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Value::Long(_))
    }

    pub fn is_big_decimal(&self) -> bool {
        matches!(self, Value::BigDecimal(_))
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Tuple(_) | Value::Dict(_))
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Value::Tuple(_))
    }

    pub fn is_dict(&self) -> bool {
        matches!(self, Value::Dict(_))
    }

    /// Widens toward `Double` where the spec's documented ladder allows it
    /// (`Long -> Double`). Returns `None` for non-numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(n) => Some(*n as f64),
            Value::Double(d) => Some(*d),
            Value::BigDecimal(d) => bigdecimal::ToPrimitive::to_f64(d),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Widens toward `BigDecimal`, the final rung of the ladder, used by
    /// the `bigdec`-family operations and by `Text` values parsed on demand.
    pub fn as_big_decimal(&self) -> Option<BigDecimal> {
        match self {
            Value::Long(n) => Some(BigDecimal::from(*n)),
            Value::Double(d) => BigDecimal::try_from(*d).ok(),
            Value::BigDecimal(d) => Some(d.clone()),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Long(n) => *n != 0,
            Value::Double(d) => *d != 0.0,
            _ => true,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Long(n) => write!(f, "{}", n),
            Value::Double(d) => write!(f, "{}", d),
            Value::BigDecimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "{}", s),
            Value::State(s) => write!(f, "{}", s),
            Value::Stamp(t) => write!(f, "{}", t.to_rfc3339()),
            Value::Elapsed(d) => write!(f, "{}ms", d.num_milliseconds()),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
            Value::Dict(d) => {
                write!(f, "{{")?;
                for (i, (k, v)) in d.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_ladder_long_to_double() {
        let v = Value::Long(5);
        assert_eq!(v.as_f64(), Some(5.0));
    }

    #[test]
    fn dict_preserves_insertion_order() {
        let mut d = Dict::new();
        d.insert("b".into(), Value::Long(2));
        d.insert("a".into(), Value::Long(1));
        let keys: Vec<&str> = d.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn dict_overwrite_preserves_position() {
        let mut d = Dict::new();
        d.insert("a".into(), Value::Long(1));
        d.insert("b".into(), Value::Long(2));
        d.insert("a".into(), Value::Long(9));
        let keys: Vec<&str> = d.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(d.get("a"), Some(&Value::Long(9)));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Long(0).truthy());
        assert!(Value::Long(1).truthy());
        assert!(Value::Text("".into()).truthy());
    }
}
