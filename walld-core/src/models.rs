use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Longest rotation interval accepted from the config or a client.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 3600);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    pub const ALL: &[TimeUnit] = &[TimeUnit::Seconds, TimeUnit::Minutes, TimeUnit::Hours];

    pub fn seconds(self) -> u64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3600,
        }
    }

    /// Canonical duration of `value` units, `None` above [`MAX_INTERVAL`].
    pub fn duration(self, value: u64) -> Option<Duration> {
        value
            .checked_mul(self.seconds())
            .map(Duration::from_secs)
            .filter(|d| *d <= MAX_INTERVAL)
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seconds => write!(f, "s"),
            Self::Minutes => write!(f, "m"),
            Self::Hours => write!(f, "h"),
        }
    }
}

impl std::str::FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "s" | "seconds" => Ok(Self::Seconds),
            "m" | "minutes" => Ok(Self::Minutes),
            "h" | "hours" => Ok(Self::Hours),
            other => Err(format!("unknown time units: {other}")),
        }
    }
}

/// Primitive type tag of a [`Value`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    String,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
        }
    }
}

/// A substitution value as it appears in the config document and on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
        }
    }

    /// Interpret command-line text by its literal syntax: booleans, integers,
    /// floats, and anything else as a string.
    pub fn parse_literal(s: &str) -> Self {
        if let Ok(b) = s.parse::<bool>() {
            return Self::Bool(b);
        }
        if let Ok(i) = s.parse::<i64>() {
            return Self::Int(i);
        }
        match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Self::Float(f),
            _ => Self::String(s.to_string()),
        }
    }

    /// Convert `self` so it can be stored in a slot of kind `kind`.
    /// Integers widen to floats; every other mismatch is refused.
    pub fn coerce_to(self, kind: ValueKind) -> Option<Self> {
        match (self, kind) {
            (Self::Int(i), ValueKind::Float) => Some(Self::Float(i as f64)),
            (v, k) if v.kind() == k => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            // keeps the fractional part, so 2.0 renders as "2.0"
            Self::Float(x) => write!(f, "{x:?}"),
            Self::String(s) => f.write_str(s),
        }
    }
}
