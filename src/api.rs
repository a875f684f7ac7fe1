//! Public API for moving values between the host and the guest.
//!
//! Scalars map directly; dynamic and static arrays map to JSON arrays;
//! records and objects map to JSON objects keyed by field name; enums and
//! subranges map to their ordinal/integer value. Reference-only values
//! (interfaces, routine pointers, class references) have no JSON shape and
//! refuse with a structured error.

use std::rc::Rc;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::ExecError;
use crate::symbol::Symbol;
use crate::value::{ArrayValue, RecordInstance, Value};

/// Record type name given to JSON objects imported via
/// [`value_from_json`].
pub const JSON_RECORD_TYPE: &str = "TJsonObject";

/// Convert a guest value to JSON.
pub fn value_to_json(value: &Value) -> Result<serde_json::Value, ExecError> {
    use serde_json::Value as Json;
    let json = match value {
        Value::Nil => Json::Null,
        Value::Int(v) => Json::from(*v),
        Value::Float(v) => serde_json::Number::from_f64(*v)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Bool(b) => Json::from(*b),
        Value::Str(s) => Json::from(s.as_ref()),
        Value::Enum(e) => Json::from(e.ordinal),
        Value::Subrange(s) => Json::from(s.value),
        Value::Variant(inner) => value_to_json(inner)?,
        Value::Array(arr) => {
            let arr = arr.borrow();
            let mut items = Vec::with_capacity(arr.elems.len());
            for elem in &arr.elems {
                items.push(value_to_json(elem)?);
            }
            Json::Array(items)
        }
        Value::Record(rec) => {
            let mut map = serde_json::Map::new();
            for (name, field) in rec.fields().iter() {
                map.insert(name.as_str().to_owned(), value_to_json(field)?);
            }
            Json::Object(map)
        }
        Value::Object(obj) => {
            let mut map = serde_json::Map::new();
            for (name, field) in obj.fields().iter() {
                map.insert(name.as_str().to_owned(), value_to_json(field)?);
            }
            Json::Object(map)
        }
        other => {
            return Err(ExecError::unsupported(format!(
                "cannot represent {} as JSON",
                other.type_name()
            )));
        }
    };
    Ok(json)
}

/// Build a guest value from JSON: null/bool/number/string map to scalars,
/// arrays to dynamic arrays, objects to [`JSON_RECORD_TYPE`] records.
pub fn value_from_json(json: &serde_json::Value) -> Value {
    use serde_json::Value as Json;
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::Str(Rc::from(s.as_str())),
        Json::Array(items) => {
            let elems = items.iter().map(value_from_json).collect();
            Value::Array(ArrayValue::new_dynamic(None, elems))
        }
        Json::Object(map) => {
            let fields = map
                .iter()
                .map(|(k, v)| (Symbol::new(k), value_from_json(v)))
                .collect();
            Value::Record(RecordInstance::with_fields(
                Symbol::new(JSON_RECORD_TYPE),
                fields,
            ))
        }
    }
}

impl Serialize for Value {
    /// Serialize with the same shape as [`value_to_json`]; unrepresentable
    /// kinds become serialization errors.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Enum(e) => serializer.serialize_i64(e.ordinal),
            Value::Subrange(s) => serializer.serialize_i64(s.value),
            Value::Variant(inner) => inner.serialize(serializer),
            Value::Array(arr) => {
                let arr = arr.borrow();
                let mut seq = serializer.serialize_seq(Some(arr.elems.len()))?;
                for elem in &arr.elems {
                    seq.serialize_element(elem)?;
                }
                seq.end()
            }
            Value::Record(rec) => {
                let fields = rec.fields();
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, field) in fields.iter() {
                    map.serialize_entry(name.as_str(), field)?;
                }
                map.end()
            }
            Value::Object(obj) => {
                let fields = obj.fields();
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, field) in fields.iter() {
                    map.serialize_entry(name.as_str(), field)?;
                }
                map.end()
            }
            other => Err(serde::ser::Error::custom(format!(
                "cannot represent {} as JSON",
                other.type_name()
            ))),
        }
    }
}
