//! Dynamic SQL values exchanged with the driver.

use serde::{Deserialize, Serialize};

/// A dynamically-typed SQL value.
///
/// Used both for positional parameter binding and for the cells of fetched
/// rows. Temporal and other non-numeric server types arrive as `Text` in the
/// server's own text representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 16-bit signed integer
    SmallInt(i16),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 32-bit floating point
    Float(f32),

    /// 64-bit floating point
    Double(f64),

    /// Arbitrary precision decimal (stored as string)
    Decimal(String),

    /// Text string
    Text(String),

    /// JSON document
    Json(serde_json::Value),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Render this value as a JSON value for transport.
    ///
    /// Decimals stay strings so no precision is lost; non-finite floats
    /// become `null` because JSON cannot carry them.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(v) => Json::Bool(*v),
            Value::SmallInt(v) => Json::from(*v),
            Value::Int(v) => Json::from(*v),
            Value::BigInt(v) => Json::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(f64::from(*v))
                .map_or(Json::Null, Json::Number),
            Value::Double(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Value::Decimal(s) | Value::Text(s) => Json::String(s.clone()),
            Value::Json(v) => v.clone(),
        }
    }

    /// Build a bind parameter from a JSON value supplied by a caller.
    ///
    /// Integers map to `BigInt`, other numbers to `Double`; arrays and objects
    /// are bound as JSON documents.
    pub fn from_json(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::BigInt(i)
                } else {
                    n.as_f64().map_or_else(|| Value::Decimal(n.to_string()), Value::Double)
                }
            }
            Json::String(s) => Value::Text(s.clone()),
            Json::Array(_) | Json::Object(_) => Value::Json(json.clone()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_rendering_keeps_decimal_precision() {
        assert_eq!(
            Value::Decimal("12345678901234567890.123".into()).to_json(),
            json!("12345678901234567890.123")
        );
        assert_eq!(Value::Int(7).to_json(), json!(7));
        assert_eq!(Value::Null.to_json(), json!(null));
        assert_eq!(Value::Double(f64::NAN).to_json(), json!(null));
    }

    #[test]
    fn test_params_from_json() {
        assert_eq!(Value::from_json(&json!(1)), Value::BigInt(1));
        assert_eq!(Value::from_json(&json!(1.5)), Value::Double(1.5));
        assert_eq!(
            Value::from_json(&json!("Test Record")),
            Value::Text("Test Record".into())
        );
        assert_eq!(Value::from_json(&json!(null)), Value::Null);
        assert_eq!(
            Value::from_json(&json!({"a": 1})),
            Value::Json(json!({"a": 1}))
        );
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(Value::SmallInt(3).as_i64(), Some(3));
        assert_eq!(Value::Text("x".into()).as_i64(), None);
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert!(Value::Null.is_null());
        assert_eq!(Value::from("x"), Value::Text("x".into()));
    }
}
