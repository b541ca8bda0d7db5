//! Record identifiers and timestamp encoding
//!
//! Ids are opaque strings: documents written elsewhere use their own
//! schemes (`id_k3j2h1a_lq2x`), so nothing here assumes a UUID. Fresh ids
//! are random UUIDs rendered as text.

use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a notebook, chapter or cell
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// A fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Id {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Id {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// `#[serde(with = ...)]` codec for timestamps. Writes RFC 3339; reads
/// either RFC 3339 text or epoch milliseconds.
pub(crate) mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        FractionalMillis(f64),
        Text(DateTime<Utc>),
    }

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        at.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let millis = match Raw::deserialize(deserializer)? {
            Raw::Text(at) => return Ok(at),
            Raw::Millis(ms) => ms,
            Raw::FractionalMillis(ms) => ms as i64,
        };
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {millis}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    #[derive(Debug, Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "timestamp")]
        at: DateTime<Utc>,
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = Id::generate();
        let b = Id::generate();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_foreign_id_round_trips() {
        let id: Id = serde_json::from_str("\"id_k3j2h1a_lq2x\"").unwrap();
        assert_eq!(id, "id_k3j2h1a_lq2x");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"id_k3j2h1a_lq2x\"");
        assert_eq!("plot-1".parse::<Id>().unwrap().as_str(), "plot-1");
    }

    #[test]
    fn test_timestamp_accepts_millis_and_text() {
        let expected = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        let from_millis: Stamped = serde_json::from_str(r#"{"at": 1700000000123}"#).unwrap();
        assert_eq!(from_millis.at, expected);

        let text = serde_json::to_string(&from_millis).unwrap();
        assert!(text.contains("2023-11-14T"));
        let from_text: Stamped = serde_json::from_str(&text).unwrap();
        assert_eq!(from_text.at, expected);

        assert!(serde_json::from_str::<Stamped>(r#"{"at": "yesterday"}"#).is_err());
    }
}
