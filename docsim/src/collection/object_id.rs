use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use crate::ID_GENERATOR;
use std::fmt::{Debug, Display};
use std::str::FromStr;

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// A 12-byte document identifier.
///
/// The layout is a 4-byte big-endian Unix timestamp in seconds, a 5-byte
/// per-process random salt and a 3-byte big-endian counter. Identifiers compare
/// byte-wise, so they sort by creation time.
///
/// # Examples
///
/// ```rust,ignore
/// use docsim::collection::ObjectId;
///
/// let id = ObjectId::new();
/// let parsed = ObjectId::parse_str("507f1f77bcf86cd799439011")?;
/// assert_eq!(parsed.to_hex(), "507f1f77bcf86cd799439011");
/// ```
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy)]
pub struct ObjectId {
    bytes: [u8; 12],
}

impl ObjectId {
    /// Generates a new identifier from the process-wide generator.
    pub fn new() -> Self {
        ID_GENERATOR.generate()
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId { bytes }
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.bytes
    }

    /// Parses a 24-character hexadecimal string.
    pub fn parse_str(hex: &str) -> DocsimResult<ObjectId> {
        if hex.len() != 24 {
            log::error!("Invalid object id length {} for {:?}", hex.len(), hex);
            return Err(DocsimError::new(
                &format!("'{}' is not a valid ObjectId, it must be a 24 character hex string", hex),
                ErrorKind::InvalidIdentifier,
            ));
        }

        let mut bytes = [0u8; 12];
        let raw = hex.as_bytes();
        for (i, byte) in bytes.iter_mut().enumerate() {
            match (hex_value(raw[2 * i]), hex_value(raw[2 * i + 1])) {
                (Some(high), Some(low)) => *byte = (high << 4) | low,
                _ => {
                    log::error!("Invalid hex character in object id {:?}", hex);
                    return Err(DocsimError::new(
                        &format!("'{}' is not a valid ObjectId, it contains non-hex characters", hex),
                        ErrorKind::InvalidIdentifier,
                    ));
                }
            }
        }
        Ok(ObjectId { bytes })
    }

    /// Lowercase hexadecimal form.
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(24);
        for byte in self.bytes {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
        }
        hex
    }

    /// Creation time in seconds since the Unix epoch.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl FromStr for ObjectId {
    type Err = DocsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s)
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId(\"{}\")", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_round_trip() {
        let id = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(id.to_hex(), "507f1f77bcf86cd799439011");
        assert_eq!(id.to_string(), "507f1f77bcf86cd799439011");
    }

    #[test]
    fn parse_upper_case_normalizes_to_lower() {
        let id = ObjectId::parse_str("507F1F77BCF86CD799439011").unwrap();
        assert_eq!(id.to_hex(), "507f1f77bcf86cd799439011");
    }

    #[test]
    fn parse_wrong_length_fails() {
        let err = ObjectId::parse_str("507f1f77bcf86cd79943901").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidIdentifier);
        let err = ObjectId::parse_str("").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidIdentifier);
    }

    #[test]
    fn parse_non_hex_fails() {
        let err = ObjectId::parse_str("507f1f77bcf86cd79943901z").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidIdentifier);
    }

    #[test]
    fn timestamp_is_leading_bytes() {
        let id = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(id.timestamp(), 0x507f1f77);
    }

    #[test]
    fn ordering_is_byte_wise() {
        let a = ObjectId::parse_str("000000000000000000000001").unwrap();
        let b = ObjectId::parse_str("000000000000000000000100").unwrap();
        let c = ObjectId::parse_str("ff0000000000000000000000").unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn from_str_parses() {
        let id: ObjectId = "507f1f77bcf86cd799439011".parse().unwrap();
        assert_eq!(id.bytes()[0], 0x50);
    }

    #[test]
    fn new_ids_are_distinct() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
    }
}
