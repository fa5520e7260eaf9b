//! Conversion between `Value` and the server's text wire format.
//!
//! The driver always binds parameters and requests results in text format,
//! so only text encodings are handled here.

#![allow(clippy::result_large_err)]

use sqlgate_core::Error;
use sqlgate_core::Value;
use sqlgate_core::error::TypeError;

/// Type OIDs the driver recognises.
pub mod oid {
    /// Let the server infer the parameter type
    pub const UNSPECIFIED: u32 = 0;
    pub const BOOL: u32 = 16;
    pub const CHAR: u32 = 18;
    pub const NAME: u32 = 19;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const OID: u32 = 26;
    pub const JSON: u32 = 114;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const BPCHAR: u32 = 1042;
    pub const VARCHAR: u32 = 1043;
    pub const NUMERIC: u32 = 1700;
    pub const JSONB: u32 = 3802;
    /// Redshift SUPER (semi-structured)
    pub const SUPER: u32 = 4000;
}

/// Wire format code for text.
pub const TEXT_FORMAT: i16 = 0;

/// Decode one text-format cell. `None` is SQL NULL.
///
/// Types without a dedicated mapping (dates, timestamps, intervals, ...) are
/// returned as `Value::Text` in the server's own representation.
pub fn decode_text(type_oid: u32, data: Option<&[u8]>) -> Result<Value, Error> {
    let Some(data) = data else {
        return Ok(Value::Null);
    };
    let s = std::str::from_utf8(data).map_err(|e| {
        Error::Type(TypeError {
            expected: "UTF-8 text",
            actual: e.to_string(),
            column: None,
        })
    })?;

    let value = match type_oid {
        oid::BOOL => match s {
            "t" | "true" => Value::Bool(true),
            "f" | "false" => Value::Bool(false),
            other => return Err(mismatch("boolean", other)),
        },
        oid::INT2 => Value::SmallInt(s.parse().map_err(|_| mismatch("smallint", s))?),
        oid::INT4 => Value::Int(s.parse().map_err(|_| mismatch("integer", s))?),
        oid::INT8 => Value::BigInt(s.parse().map_err(|_| mismatch("bigint", s))?),
        oid::OID => Value::BigInt(s.parse().map_err(|_| mismatch("oid", s))?),
        oid::FLOAT4 => Value::Float(s.parse().map_err(|_| mismatch("real", s))?),
        oid::FLOAT8 => Value::Double(s.parse().map_err(|_| mismatch("double precision", s))?),
        oid::NUMERIC => Value::Decimal(s.to_string()),
        oid::JSON | oid::JSONB | oid::SUPER => serde_json::from_str(s)
            .map_or_else(|_| Value::Text(s.to_string()), Value::Json),
        _ => Value::Text(s.to_string()),
    };
    Ok(value)
}

/// Encode a bind parameter as `(text bytes, type oid)`; NULL encodes as `None`.
pub fn encode_text(value: &Value) -> (Option<Vec<u8>>, u32) {
    let (text, type_oid) = match value {
        Value::Null => return (None, oid::UNSPECIFIED),
        Value::Bool(b) => (if *b { "t" } else { "f" }.to_string(), oid::BOOL),
        Value::SmallInt(v) => (v.to_string(), oid::INT2),
        Value::Int(v) => (v.to_string(), oid::INT4),
        Value::BigInt(v) => (v.to_string(), oid::INT8),
        Value::Float(v) => (float_text(f64::from(*v)), oid::FLOAT4),
        Value::Double(v) => (float_text(*v), oid::FLOAT8),
        Value::Decimal(s) => (s.clone(), oid::NUMERIC),
        Value::Text(s) => (s.clone(), oid::UNSPECIFIED),
        Value::Json(j) => (j.to_string(), oid::UNSPECIFIED),
    };
    (Some(text.into_bytes()), type_oid)
}

fn float_text(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        v.to_string()
    }
}

fn mismatch(expected: &'static str, actual: &str) -> Error {
    Error::Type(TypeError {
        expected,
        actual: format!("{actual:?}"),
        column: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode_text(oid::BOOL, Some(b"t")).unwrap(), Value::Bool(true));
        assert_eq!(decode_text(oid::INT2, Some(b"-3")).unwrap(), Value::SmallInt(-3));
        assert_eq!(decode_text(oid::INT4, Some(b"42")).unwrap(), Value::Int(42));
        assert_eq!(
            decode_text(oid::INT8, Some(b"9000000000")).unwrap(),
            Value::BigInt(9_000_000_000)
        );
        assert_eq!(decode_text(oid::FLOAT8, Some(b"1.5")).unwrap(), Value::Double(1.5));
        assert_eq!(
            decode_text(oid::NUMERIC, Some(b"123.4500")).unwrap(),
            Value::Decimal("123.4500".into())
        );
        assert_eq!(decode_text(oid::INT4, None).unwrap(), Value::Null);
    }

    #[test]
    fn test_decode_fallbacks() {
        assert_eq!(
            decode_text(1114, Some(b"2024-01-02 03:04:05")).unwrap(),
            Value::Text("2024-01-02 03:04:05".into())
        );
        assert_eq!(
            decode_text(oid::SUPER, Some(b"{\"a\":1}")).unwrap(),
            Value::Json(json!({"a": 1}))
        );
        assert_eq!(
            decode_text(oid::SUPER, Some(b"not json")).unwrap(),
            Value::Text("not json".into())
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(decode_text(oid::INT4, Some(b"abc")).is_err());
        assert!(decode_text(oid::BOOL, Some(b"maybe")).is_err());
        assert!(decode_text(oid::TEXT, Some(&[0xff, 0xfe])).is_err());
    }

    #[test]
    fn test_encode_params() {
        assert_eq!(encode_text(&Value::Null), (None, oid::UNSPECIFIED));
        assert_eq!(encode_text(&Value::Bool(false)), (Some(b"f".to_vec()), oid::BOOL));
        assert_eq!(encode_text(&Value::BigInt(7)), (Some(b"7".to_vec()), oid::INT8));
        assert_eq!(
            encode_text(&Value::Text("Test Record".into())),
            (Some(b"Test Record".to_vec()), oid::UNSPECIFIED)
        );
        assert_eq!(
            encode_text(&Value::Double(f64::NEG_INFINITY)),
            (Some(b"-Infinity".to_vec()), oid::FLOAT8)
        );
    }
}
