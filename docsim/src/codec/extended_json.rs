use crate::collection::{Document, ObjectId};
use crate::common::{parse_millis, Value};
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Map, Number, Value as JsonValue};

/// Encodes a value into its canonical form.
pub fn encode_value(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(v) => JsonValue::Bool(*v),
        Value::Int64(v) => JsonValue::Number(Number::from(*v)),
        Value::Float64(v) => match Number::from_f64(*v) {
            Some(number) => JsonValue::Number(number),
            None => json!({ "$numberDouble": non_finite_text(*v) }),
        },
        Value::String(v) => JsonValue::String(v.clone()),
        Value::Array(items) => JsonValue::Array(items.iter().map(encode_value).collect()),
        Value::Document(doc) => encode_document(doc),
        Value::ObjectId(id) => json!({ "$oid": id.to_hex() }),
        Value::DateTime(millis) => json!({ "$date": millis }),
        Value::Timestamp { seconds, increment } => {
            json!({ "$timestamp": { "t": seconds, "i": increment } })
        }
        Value::Binary { subtype, bytes } => json!({
            "$binary": {
                "base64": BASE64.encode(bytes),
                "subType": format!("{:02x}", subtype)
            }
        }),
        Value::Decimal(text) => json!({ "$numberDecimal": text }),
        Value::MinKey => json!({ "$minKey": 1 }),
        Value::MaxKey => json!({ "$maxKey": 1 }),
        Value::Regex { pattern, options } => json!({
            "$regularExpression": { "pattern": pattern, "options": options }
        }),
    }
}

/// Encodes a document, keeping its field order.
pub fn encode_document(doc: &Document) -> JsonValue {
    let mut map = Map::with_capacity(doc.size());
    for (key, value) in doc.iter() {
        map.insert(key.clone(), encode_value(value));
    }
    JsonValue::Object(map)
}

/// Decodes a canonical-form value. Never fails.
pub fn decode_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(v) => Value::Bool(*v),
        JsonValue::Number(number) => decode_number(number),
        JsonValue::String(v) => Value::String(v.clone()),
        JsonValue::Array(items) => Value::Array(items.iter().map(decode_value).collect()),
        JsonValue::Object(map) => {
            if map.len() == 1 {
                if let Some(value) = decode_wrapper(map) {
                    return value;
                }
            }
            Value::Document(decode_map(map))
        }
    }
}

/// Decodes a canonical-form object into a document.
pub fn decode_document(json: &JsonValue) -> DocsimResult<Document> {
    match decode_value(json) {
        Value::Document(doc) => Ok(doc),
        other => {
            log::error!("Expected a document but found {}", other.type_alias());
            Err(DocsimError::new(
                &format!("expected a document but found {}", other.type_alias()),
                ErrorKind::ValidationError,
            ))
        }
    }
}

impl Document {
    /// Renders the document as canonical-form JSON text.
    pub fn to_json(&self) -> String {
        encode_document(self).to_string()
    }

    /// Parses canonical-form JSON text into a document.
    pub fn from_json(text: &str) -> DocsimResult<Document> {
        let json: JsonValue = serde_json::from_str(text)?;
        decode_document(&json)
    }
}

fn decode_map(map: &Map<String, JsonValue>) -> Document {
    map.iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect()
}

fn decode_number(number: &Number) -> Value {
    if let Some(v) = number.as_i64() {
        Value::Int64(v)
    } else if let Some(v) = number.as_u64() {
        Value::Float64(v as f64)
    } else {
        Value::Float64(number.as_f64().unwrap_or(f64::NAN))
    }
}

fn non_finite_text(v: f64) -> &'static str {
    if v.is_nan() {
        "NaN"
    } else if v > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn decode_wrapper(map: &Map<String, JsonValue>) -> Option<Value> {
    let (key, inner) = map.iter().next()?;
    match key.as_str() {
        "$oid" => ObjectId::parse_str(inner.as_str()?).ok().map(Value::ObjectId),
        "$date" => decode_date(inner),
        "$timestamp" => {
            let fields = inner.as_object()?;
            if fields.len() != 2 {
                return None;
            }
            Some(Value::Timestamp {
                seconds: fields.get("t")?.as_i64()?,
                increment: fields.get("i")?.as_i64()?,
            })
        }
        "$binary" => {
            let fields = inner.as_object()?;
            if fields.len() != 2 {
                return None;
            }
            let bytes = BASE64.decode(fields.get("base64")?.as_str()?).ok()?;
            let subtype_text = fields.get("subType")?.as_str()?;
            if subtype_text.is_empty() || subtype_text.len() > 2 {
                return None;
            }
            let subtype = u8::from_str_radix(subtype_text, 16).ok()?;
            Some(Value::Binary { subtype, bytes })
        }
        "$numberDecimal" => Some(Value::Decimal(inner.as_str()?.to_string())),
        "$numberLong" | "$numberInt" => inner.as_str()?.parse::<i64>().ok().map(Value::Int64),
        "$numberDouble" => {
            let text = inner.as_str()?;
            match text {
                "NaN" => Some(Value::Float64(f64::NAN)),
                "Infinity" => Some(Value::Float64(f64::INFINITY)),
                "-Infinity" => Some(Value::Float64(f64::NEG_INFINITY)),
                _ => text.parse::<f64>().ok().map(Value::Float64),
            }
        }
        "$minKey" if inner.as_i64() == Some(1) => Some(Value::MinKey),
        "$maxKey" if inner.as_i64() == Some(1) => Some(Value::MaxKey),
        "$regularExpression" => {
            let fields = inner.as_object()?;
            if fields.len() != 2 {
                return None;
            }
            Some(Value::Regex {
                pattern: fields.get("pattern")?.as_str()?.to_string(),
                options: fields.get("options")?.as_str()?.to_string(),
            })
        }
        _ => None,
    }
}

fn decode_date(inner: &JsonValue) -> Option<Value> {
    match inner {
        JsonValue::Number(number) => number.as_i64().map(Value::DateTime),
        JsonValue::String(text) => parse_millis(text).map(Value::DateTime),
        JsonValue::Object(fields) if fields.len() == 1 => fields
            .get("$numberLong")?
            .as_str()?
            .parse::<i64>()
            .ok()
            .map(Value::DateTime),
        _ => None,
    }
}
