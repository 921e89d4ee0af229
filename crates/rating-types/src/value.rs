use serde::{Deserialize, Serialize};
use std::fmt;

/// The tagged scalar value threaded through the rating DSL's lexer, parser,
/// evaluator and host interfaces.
///
/// A value is either void (absent) or exactly one of a boolean, a 64-bit
/// float, or a UTF-8 string. Booleans and numbers are distinct tags: a
/// boolean is never treated as a number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Absent value. Equality with anything (including another void) is
    /// `false`; ordering against a void operand is undefined and must be
    /// rejected by callers before reaching `PartialOrd`.
    Void,
    /// Boolean value.
    Bool(bool),
    /// 64-bit float. Equality uses an absolute tolerance of `1e-11`.
    Number(f64),
    /// UTF-8 string value.
    String(String),
}

/// Absolute tolerance used when comparing two numbers for equality.
pub const NUMBER_EQUALITY_TOLERANCE: f64 = 0.00000000001;

impl Value {
    /// Construct a void value.
    #[must_use]
    pub const fn void() -> Self {
        Self::Void
    }

    /// Construct a number value.
    #[must_use]
    pub const fn number(value: f64) -> Self {
        Self::Number(value)
    }

    /// Construct a boolean value.
    #[must_use]
    pub const fn bool(value: bool) -> Self {
        Self::Bool(value)
    }

    /// Construct a string value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// `true` if this value is void.
    #[must_use]
    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// `true` if this value is a boolean.
    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// `true` if this value is a number.
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// `true` if this value is a string.
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Unchecked boolean accessor.
    ///
    /// # Panics
    ///
    /// Panics if the value is not a `Bool`. Callers are expected to have
    /// checked `is_bool` (or to have typed-checked the producing operator)
    /// beforehand; this mirrors the source's `asBool`/`CP_REQUIRE` contract.
    #[must_use]
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            other => panic!("Value::as_bool called on a {}", other.type_name()),
        }
    }

    /// Unchecked number accessor.
    ///
    /// # Panics
    ///
    /// Panics if the value is not a `Number`.
    #[must_use]
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            other => panic!("Value::as_number called on a {}", other.type_name()),
        }
    }

    /// Unchecked string accessor.
    ///
    /// # Panics
    ///
    /// Panics if the value is not a `String`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::String(s) => s,
            other => panic!("Value::as_str called on a {}", other.type_name()),
        }
    }

    /// The type name used in evaluation-error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }

    /// Render this value the way the `+` operator does when one side is a
    /// string: raw, unquoted, integral numbers printed without a trailing
    /// `.0`. This is distinct from the quoted `Display` form used for debug
    /// output and logging.
    ///
    /// # Panics
    ///
    /// Panics if called on a void value; `+` must reject void operands
    /// before reaching this conversion.
    #[must_use]
    pub fn concat_string(&self) -> String {
        match self {
            Self::Void => panic!("Value::concat_string called on void"),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
        }
    }
}

/// Format a number without a trailing `.0` when it is mathematically
/// integral, otherwise with the default decimal representation.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e18 {
        #[allow(clippy::cast_possible_truncation)]
        let as_int = n as i64;
        as_int.to_string()
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "VOID"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::String(s) => write!(f, "'{s}'"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Void, _) | (_, Self::Void) => false,
            (Self::Number(a), Self::Number(b)) => (a - b).abs() < NUMBER_EQUALITY_TOLERANCE,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

// -------------------------------------------------------------------------------------------------
// Conversions between `Value` and `serde_json::Value`, for hosts that want to move rating
// inputs/outputs across a JSON boundary (e.g. a config file, an HTTP payload) without hand-rolled
// mapping code at every call site. Narrower than a general JSON mapping: `Value` has no array or
// object variant, so a JSON array/object has no corresponding `Value` and is rejected on the way in.
// -------------------------------------------------------------------------------------------------

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Void => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n).map_or(Self::Null, Self::Number),
            Value::String(s) => Self::String(s.clone()),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}

impl TryFrom<&serde_json::Value> for Value {
    type Error = anyhow::Error;

    /// Fails for `Array`/`Object`, neither of which has a corresponding `Value` variant.
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Null => Ok(Self::Void),
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Self::Number)
                .ok_or_else(|| anyhow::anyhow!("number {n} has no f64 representation")),
            serde_json::Value::String(s) => Ok(Self::String(s.clone())),
            other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Err(anyhow::anyhow!("JSON value has no corresponding rating Value: {other}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_equality_uses_tolerance() {
        assert_eq!(Value::number(1.0), Value::number(1.0 + 1e-12));
        assert_ne!(Value::number(1.0), Value::number(1.0 + 1e-9));
    }

    #[test]
    fn void_never_equals_anything() {
        assert_ne!(Value::void(), Value::void());
        assert_ne!(Value::void(), Value::number(0.0));
    }

    #[test]
    fn display_strips_trailing_zero_for_integral_numbers() {
        assert_eq!(Value::number(4.0).to_string(), "4");
        assert_eq!(Value::number(4.5).to_string(), "4.5");
        assert_eq!(Value::string("hi").to_string(), "'hi'");
        assert_eq!(Value::bool(true).to_string(), "true");
        assert_eq!(Value::void().to_string(), "VOID");
    }

    #[test]
    fn concat_string_is_raw_and_unquoted() {
        assert_eq!(Value::string("A").concat_string() + &Value::number(50.0).concat_string(), "A50");
    }

    #[test]
    fn round_trips_through_serde_json_for_each_scalar_tag() {
        // `Value::Void` is deliberately excluded: per its `PartialEq`, void never equals
        // anything, including another void, so a round-trip can't be asserted via `==`.
        for value in [Value::bool(true), Value::number(42.5), Value::string("hi")] {
            let json: serde_json::Value = (&value).into();
            let back = Value::try_from(&json).unwrap();
            assert_eq!(back, value);
        }
        assert!(matches!(Value::try_from(&serde_json::Value::Null).unwrap(), Value::Void));
    }

    #[test]
    fn json_arrays_and_objects_have_no_corresponding_value() {
        assert!(Value::try_from(&serde_json::json!([1, 2])).is_err());
        assert!(Value::try_from(&serde_json::json!({"a": 1})).is_err());
    }
}
