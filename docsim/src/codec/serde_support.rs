use super::{decode_value, encode_document, encode_value};
use crate::collection::Document;
use crate::common::Value;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_value(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        Ok(decode_value(&json))
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_document(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Document(doc) => Ok(doc),
            other => Err(D::Error::custom(format!(
                "expected a document but found {}",
                other.type_alias()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::collection::{Document, ObjectId};
    use crate::common::Value;
    use crate::doc;

    #[test]
    fn serde_json_uses_canonical_form() {
        let id = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        let doc = doc! { _id: id, when: (Value::DateTime(0)) };
        let text = serde_json::to_string(&doc).unwrap();
        assert_eq!(text, r#"{"_id":{"$oid":"507f1f77bcf86cd799439011"},"when":{"$date":0}}"#);

        let back: Document = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn deserializing_non_object_document_fails() {
        let result: Result<Document, _> = serde_json::from_str("3");
        assert!(result.is_err());
    }
}
