//! Typed extraction from a step's argument bag.
//!
//! Optional getters never fail: an absent bag, an absent key or a value that
//! cannot be coerced all yield the caller's fallback. Required getters apply
//! the same coercion and fail with [`ArgError::Invalid`] instead.
//!
//! Coercion, first match wins:
//! - `String`: JSON string verbatim; number or boolean stringified.
//! - `i64` / `f64`: JSON number if representable; JSON string parsed
//!   locale-independently (surrounding whitespace ignored).
//! - `bool`: JSON boolean; JSON string `"true"`/`"false"`, any case.

use serde_json::Value;

/// The argument bag carried by a step.
pub type Args = serde_json::Map<String, Value>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArgError {
    #[error("Err.Arg.Invalid: argument '{key}' is missing or is not a valid {expected}")]
    Invalid { key: String, expected: &'static str },
}

impl ArgError {
    pub fn key(&self) -> &str {
        match self {
            Self::Invalid { key, .. } => key,
        }
    }
}

/// A target type the codec can coerce a JSON value into.
pub trait FromArg: Sized {
    /// Human name of the target, used in error messages.
    const EXPECTED: &'static str;

    fn from_arg(value: &Value) -> Option<Self>;
}

impl FromArg for String {
    const EXPECTED: &'static str = "string";

    fn from_arg(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl FromArg for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_arg(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromArg for f64 {
    const EXPECTED: &'static str = "number";

    fn from_arg(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromArg for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_arg(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("true") {
                    Some(true)
                } else if s.eq_ignore_ascii_case("false") {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

fn lookup<'a>(args: Option<&'a Args>, key: &str) -> Option<&'a Value> {
    args.and_then(|m| m.get(key))
}

/// Coerce `args[key]` into `T`, or return `fallback`.
pub fn get<T: FromArg>(args: Option<&Args>, key: &str, fallback: T) -> T {
    lookup(args, key).and_then(T::from_arg).unwrap_or(fallback)
}

/// Coerce `args[key]` into `T`, failing with [`ArgError::Invalid`].
pub fn require<T: FromArg>(args: Option<&Args>, key: &str) -> Result<T, ArgError> {
    lookup(args, key)
        .and_then(T::from_arg)
        .ok_or_else(|| ArgError::Invalid {
            key: key.to_string(),
            expected: T::EXPECTED,
        })
}

pub fn get_string(args: Option<&Args>, key: &str, fallback: &str) -> String {
    lookup(args, key)
        .and_then(String::from_arg)
        .unwrap_or_else(|| fallback.to_string())
}

pub fn get_int(args: Option<&Args>, key: &str, fallback: i64) -> i64 {
    get(args, key, fallback)
}

pub fn get_double(args: Option<&Args>, key: &str, fallback: f64) -> f64 {
    get(args, key, fallback)
}

pub fn get_bool(args: Option<&Args>, key: &str, fallback: bool) -> bool {
    get(args, key, fallback)
}

/// The raw value, only when it is an object or an array.
pub fn get_node<'a>(args: Option<&'a Args>, key: &str) -> Option<&'a Value> {
    lookup(args, key).filter(|v| v.is_object() || v.is_array())
}

pub fn get_required_string(args: Option<&Args>, key: &str) -> Result<String, ArgError> {
    require(args, key)
}

pub fn get_required_int(args: Option<&Args>, key: &str) -> Result<i64, ArgError> {
    require(args, key)
}
