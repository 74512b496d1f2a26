//! Value-tree serialization (spec 6.3). Both renderers realize instance
//! accessors in declaration order (spec 6.3, spec 3.5) by going through
//! [`Obj::iter_realized`]; a failing realization aborts rendering with that
//! instance's own error, per spec 7's "errors are not recovered
//! internally".
//!
//! JSON and YAML diverge on exactly one point (spec 6.3): JSON has no
//! arbitrary-precision integer type, so `u8`/`s8` values are rendered as
//! decimal string literals; YAML's integer literals have no practical size
//! ceiling for this system's purposes, so the same values render as plain
//! YAML integers there.

use binfmt_error::Error;
use binfmt_expr::{Obj, Value};

pub fn to_json(value: &Value) -> Result<serde_json::Value, Error> {
    Ok(match value {
        Value::Int(n) => serde_json::Value::Number((*n).into()),
        Value::BigInt(n) => serde_json::Value::String(n.to_string()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Bytes(b) => serde_json::Value::Array(
            b.iter().map(|byte| serde_json::Value::Number((*byte).into())).collect(),
        ),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Seq(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        Value::Obj(obj) => obj_to_json(obj)?,
        Value::Io(_) => serde_json::Value::Null,
        Value::Null => serde_json::Value::Null,
    })
}

pub fn obj_to_json(obj: &Obj) -> Result<serde_json::Value, Error> {
    let mut map = serde_json::Map::with_capacity(obj.len());
    for (name, result) in obj.iter_realized() {
        map.insert(name.to_string(), to_json(&result?)?);
    }
    Ok(serde_json::Value::Object(map))
}

pub fn to_yaml(value: &Value) -> Result<serde_yaml::Value, Error> {
    Ok(match value {
        Value::Int(n) => serde_yaml::Value::Number((*n).into()),
        Value::BigInt(n) => serde_yaml::Value::Number(bigint_to_yaml_number(*n)),
        Value::Float(f) => serde_yaml::Value::Number((*f).into()),
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Bytes(b) => serde_yaml::Value::Sequence(
            b.iter().map(|byte| serde_yaml::Value::Number((*byte).into())).collect(),
        ),
        Value::Str(s) => serde_yaml::Value::String(s.clone()),
        Value::Seq(items) => {
            serde_yaml::Value::Sequence(items.iter().map(to_yaml).collect::<Result<_, _>>()?)
        }
        Value::Obj(obj) => obj_to_yaml(obj)?,
        Value::Io(_) => serde_yaml::Value::Null,
        Value::Null => serde_yaml::Value::Null,
    })
}

pub fn obj_to_yaml(obj: &Obj) -> Result<serde_yaml::Value, Error> {
    let mut map = serde_yaml::Mapping::with_capacity(obj.len());
    for (name, result) in obj.iter_realized() {
        map.insert(serde_yaml::Value::String(name.to_string()), to_yaml(&result?)?);
    }
    Ok(serde_yaml::Value::Mapping(map))
}

/// `u8`/`s8` products only ever reach here by way of a native `u64` or
/// `i64` read widened into `i128` (spec 4.1's "64-bit integers must be
/// surfaced in a type that preserves full range") — so one of these two
/// casts is always exact.
fn bigint_to_yaml_number(n: i128) -> serde_yaml::Number {
    if let Ok(n) = i64::try_from(n) {
        n.into()
    } else if let Ok(n) = u64::try_from(n) {
        n.into()
    } else {
        (n as f64).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bigint_renders_as_decimal_string_in_json() {
        let v = Value::BigInt(1_099_511_627_776);
        assert_eq!(to_json(&v).unwrap(), serde_json::json!("1099511627776"));
    }

    #[test]
    fn bigint_renders_as_plain_integer_in_yaml() {
        let v = Value::BigInt(1_099_511_627_776);
        match to_yaml(&v).unwrap() {
            serde_yaml::Value::Number(n) => assert_eq!(n.as_i64(), Some(1_099_511_627_776)),
            other => panic!("expected a Number, got {other:?}"),
        }
    }

    #[test]
    fn bytes_render_as_arrays_of_small_integers() {
        let v = Value::Bytes(bytes_of(&[0, 255, 128]));
        assert_eq!(to_json(&v).unwrap(), serde_json::json!([0, 255, 128]));
    }

    fn bytes_of(b: &[u8]) -> binfmt_stream::Bytes {
        let mut s = binfmt_stream::Stream::from_bytes(b.to_vec());
        s.read_bytes(b.len()).unwrap()
    }
}
