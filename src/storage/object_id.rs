use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Per-process random bytes shared by every generated id
static PROCESS_UNIQUE: Lazy<[u8; 5]> = Lazy::new(|| rand::thread_rng().r#gen());

static COUNTER: Lazy<AtomicU32> =
    Lazy::new(|| AtomicU32::new(rand::thread_rng().gen_range(0..0x00ff_ffff)));

/// 12-byte document identifier: 4-byte timestamp, 5-byte process value, 3-byte counter.
///
/// Rendered as 24 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 12]);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid object id: {0:?}")]
pub struct InvalidObjectId(pub String);

impl ObjectId {
    /// Generate a fresh id
    pub fn generate() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn parse(s: &str) -> Result<Self, InvalidObjectId> {
        if s.len() != 24 {
            return Err(InvalidObjectId(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidObjectId(s.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_24_hex_chars_only() {
        let is_valid = |s: &str| ObjectId::parse(s).is_ok();
        assert!(is_valid("507f1f77bcf86cd799439011"));
        assert!(is_valid("507F1F77BCF86CD799439011"));
        assert!(!is_valid("507f1f77bcf86cd79943901"));
        assert!(!is_valid("507f1f77bcf86cd7994390111"));
        assert!(!is_valid("zzzf1f77bcf86cd799439011"));
        assert!(!is_valid("not-an-id"));
        assert!(!is_valid(""));
    }

    #[test]
    fn uppercase_input_is_normalized() {
        let id: ObjectId = "507F1F77BCF86CD799439011".parse().unwrap();
        assert_eq!(id.to_string(), "507f1f77bcf86cd799439011");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = ObjectId::generate();
        let b = ObjectId::generate();
        assert_ne!(a, b);
        assert_eq!(ObjectId::parse(&a.to_string()).unwrap(), a);
    }

    #[test]
    fn serializes_as_hex_string() {
        let id = ObjectId::parse("507f1f77bcf86cd799439011").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"507f1f77bcf86cd799439011\"");
        assert!(serde_json::from_str::<ObjectId>("\"bogus\"").is_err());
    }
}
