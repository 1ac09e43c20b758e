//! Debuggee value representation
//!
//! This module defines the [`Value`] enum, the structured result of evaluating an
//! expression in the attached process. Values are owned copies: once a stop
//! handler returns, nothing here refers back into the paused frame.
//!
//! # Value Types
//!
//! - [`Value::Int`]: signed integer (`int`, `long`)
//! - [`Value::Size`]: unsigned integer (`size_t`)
//! - [`Value::Pointer`]: non-null memory address
//! - [`Value::Null`]: null pointer (address 0)
//! - [`Value::Struct`]: struct with named fields

use super::SessionError;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;

/// Memory address type (64-bit)
pub type Address = u64;

/// Values read out of the debuggee
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Size(u64),
    Pointer(Address),
    #[default]
    Null,
    Struct(FxHashMap<String, Value>), // Field name -> field value
}

impl Value {
    /// Build a pointer value, folding address 0 into [`Value::Null`]
    pub fn pointer(addr: Address) -> Self {
        if addr == 0 {
            Value::Null
        } else {
            Value::Pointer(addr)
        }
    }

    /// Build a struct value from `(field, value)` pairs
    pub fn structure<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Value::Struct(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    /// Get the pointer value, returns None if not a Pointer or Null
    pub fn as_pointer(&self) -> Option<Address> {
        match self {
            Value::Pointer(addr) => Some(*addr),
            Value::Null => Some(0),
            _ => None,
        }
    }

    /// Get an unsigned reading of the value, accepting any scalar
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Size(n) => Some(*n),
            Value::Int(n) => u64::try_from(*n).ok(),
            Value::Pointer(addr) => Some(*addr),
            Value::Null => Some(0),
            Value::Struct(_) => None,
        }
    }

    /// Named-field access on a struct value
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Expect a pointer value
    pub fn expect_pointer(&self) -> Result<Address, SessionError> {
        self.as_pointer().ok_or_else(|| SessionError::TypeMismatch {
            expected: "pointer".to_string(),
            got: self.kind().to_string(),
        })
    }

    /// Expect a struct value and return the named field
    pub fn expect_field(&self, name: &str) -> Result<&Value, SessionError> {
        match self {
            Value::Struct(fields) => fields.get(name).ok_or_else(|| SessionError::NoSuchField {
                field: name.to_string(),
            }),
            other => Err(SessionError::TypeMismatch {
                expected: "struct".to_string(),
                got: other.kind().to_string(),
            }),
        }
    }

    /// Expect a non-negative integer, as a `size_t` field holds
    pub fn expect_size(&self) -> Result<u64, SessionError> {
        match self {
            Value::Size(n) => Ok(*n),
            Value::Int(n) if *n >= 0 => Ok(*n as u64),
            other => Err(SessionError::TypeMismatch {
                expected: "size".to_string(),
                got: format!("{} {}", other.kind(), other),
            }),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Size(_) => "size_t",
            Value::Pointer(_) => "pointer",
            Value::Null => "null pointer",
            Value::Struct(_) => "struct",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Size(n) => write!(f, "{}", n),
            Value::Pointer(addr) => write!(f, "0x{:x}", addr),
            Value::Null => write!(f, "0x0"),
            Value::Struct(fields) => {
                // Sorted so the rendering does not depend on hash order
                let mut names: Vec<&String> = fields.keys().collect();
                names.sort();
                write!(f, "{{")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, fields[name.as_str()])?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_folds_zero_into_null() {
        assert_eq!(Value::pointer(0), Value::Null);
        assert_eq!(Value::pointer(0x40), Value::Pointer(0x40));
    }

    #[test]
    fn test_display_matches_debugger_style() {
        assert_eq!(Value::Pointer(0x4052a0).to_string(), "0x4052a0");
        assert_eq!(Value::Null.to_string(), "0x0");
        assert_eq!(Value::Size(64).to_string(), "64");
        assert_eq!(Value::Int(-3).to_string(), "-3");

        let block = Value::structure([("size", Value::Size(8)), ("addr", Value::Null)]);
        assert_eq!(block.to_string(), "{addr = 0x0, size = 8}");
    }

    #[test]
    fn test_field_access() {
        let heap = Value::structure([("top", Value::Size(0x1000))]);
        assert_eq!(heap.field("top"), Some(&Value::Size(0x1000)));
        assert!(heap.field("free").is_none());
        assert!(matches!(
            heap.expect_field("free"),
            Err(SessionError::NoSuchField { .. })
        ));
        assert!(matches!(
            Value::Size(1).expect_field("top"),
            Err(SessionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_expect_pointer_rejects_structs() {
        let heap = Value::structure([("top", Value::Size(0))]);
        assert!(heap.expect_pointer().is_err());
        assert_eq!(Value::Null.expect_pointer().unwrap(), 0);
    }

    #[test]
    fn test_expect_size_rejects_negative_ints() {
        assert_eq!(Value::Size(24).expect_size(), Ok(24));
        assert_eq!(Value::Int(8).expect_size(), Ok(8));
        assert_eq!(
            Value::Int(-1).expect_size(),
            Err(SessionError::TypeMismatch {
                expected: "size".to_string(),
                got: "int -1".to_string(),
            })
        );
        assert!(Value::Pointer(0x10).expect_size().is_err());
    }
}
