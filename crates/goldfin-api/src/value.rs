// ── Typed wire values ──
//
// Firestore REST wraps every value in a single-key object naming its type
// (`{"stringValue": "x"}`, `{"mapValue": {"fields": {...}}}`). Documents
// travel as plain JSON everywhere else in the workspace; these helpers
// convert at the HTTP boundary.

use serde_json::{Map, Number, Value, json};

use crate::error::Error;

/// Encode a plain JSON value into its typed wire form.
pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or_default() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            if items.is_empty() {
                json!({ "arrayValue": {} })
            } else {
                let values: Vec<Value> = items.iter().map(encode).collect();
                json!({ "arrayValue": { "values": values } })
            }
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode every entry of a JSON object.
pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), encode(v))).collect()
}

/// Decode a typed wire value back into plain JSON.
pub fn decode(value: &Value) -> Result<Value, Error> {
    let Some(obj) = value.as_object() else {
        return Err(Error::InvalidValue(format!("expected object, got {value}")));
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Err(Error::InvalidValue("empty value object".into()));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| Error::InvalidValue(format!("bad booleanValue: {inner}"))),
        "integerValue" => decode_integer(inner),
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| Error::InvalidValue(format!("bad doubleValue: {inner}"))),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_owned()))
            .ok_or_else(|| Error::InvalidValue(format!("bad {kind}: {inner}"))),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            values
                .iter()
                .map(decode)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "mapValue" => {
            let fields = inner.get("fields").and_then(Value::as_object);
            match fields {
                Some(fields) => decode_fields(fields).map(Value::Object),
                None => Ok(Value::Object(Map::new())),
            }
        }
        "geoPointValue" => Ok(inner.clone()),
        other => Err(Error::InvalidValue(format!("unknown value kind: {other}"))),
    }
}

/// Decode every entry of a wire `fields` object.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, Error> {
    fields
        .iter()
        .map(|(k, v)| decode(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

// int64 values are transmitted as decimal strings; tolerate bare numbers too.
fn decode_integer(inner: &Value) -> Result<Value, Error> {
    match inner {
        Value::String(s) => s
            .parse::<i64>()
            .map(|i| Value::Number(i.into()))
            .map_err(|e| Error::InvalidValue(format!("bad integerValue {s:?}: {e}"))),
        Value::Number(n) => Ok(Value::Number(n.clone())),
        other => Err(Error::InvalidValue(format!("bad integerValue: {other}"))),
    }
}
