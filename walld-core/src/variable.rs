use serde::{Deserialize, Serialize};

use crate::error::{Result, WalldError};
use crate::models::{Value, ValueKind};

/// A named substitution slot of an interface command template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Variable {
    Constant { value: Value },
    Mutable { value: Value },
    /// `current` is always one of `options`; all options share one kind.
    Enumeration { current: Value, options: Vec<Value> },
}

impl Variable {
    pub fn constant(value: Value) -> Self {
        Self::Constant { value }
    }

    pub fn mutable(value: Value) -> Self {
        Self::Mutable { value }
    }

    pub fn enumeration(name: &str, current: Value, options: Vec<Value>) -> Result<Self> {
        let Some(first) = options.first() else {
            return Err(WalldError::Config(format!(
                "enumeration `{name}` must declare at least one option"
            )));
        };
        let kind = first.kind();
        if let Some(odd) = options.iter().find(|o| o.kind() != kind) {
            return Err(WalldError::Config(format!(
                "enumeration `{name}` mixes option types ({kind} and {})",
                odd.kind()
            )));
        }
        let found = current.kind();
        let current = current.coerce_to(kind).ok_or_else(|| {
            WalldError::Config(format!(
                "enumeration `{name}` of type {kind} has a current value of type {found}"
            ))
        })?;
        if !options.contains(&current) {
            return Err(WalldError::Config(format!(
                "enumeration `{name}` current value `{current}` is not among its options"
            )));
        }
        Ok(Self::Enumeration { current, options })
    }

    pub fn value(&self) -> &Value {
        match self {
            Self::Constant { value } | Self::Mutable { value } => value,
            Self::Enumeration { current, .. } => current,
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.value().kind()
    }

    /// Validate `value` against this slot and commit it. On error the
    /// variable is left untouched.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        let expected = self.kind();
        let found = value.kind();
        match self {
            Self::Constant { .. } => Err(WalldError::ImmutableVariable(name.to_string())),
            Self::Mutable { value: slot } => {
                *slot = value
                    .coerce_to(expected)
                    .ok_or_else(|| type_error(name, expected, found))?;
                Ok(())
            }
            Self::Enumeration { current, options } => {
                let value = value
                    .coerce_to(expected)
                    .ok_or_else(|| type_error(name, expected, found))?;
                if !options.contains(&value) {
                    return Err(WalldError::InvalidOption {
                        variable: name.to_string(),
                        value: value.to_string(),
                        options: options
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", "),
                    });
                }
                *current = value;
                Ok(())
            }
        }
    }
}

fn type_error(name: &str, expected: ValueKind, found: ValueKind) -> WalldError {
    WalldError::VariableTypeError {
        variable: name.to_string(),
        expected,
        found,
    }
}
