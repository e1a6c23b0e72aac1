// common/src/feed.rs
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of the raw public key inside a feed reference.
pub const FEED_ID_LENGTH: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedRefError {
    #[error("feed reference must start with '@'")]
    MissingSigil,
    #[error("feed reference has no algorithm suffix")]
    MissingAlgo,
    #[error("feed reference key is not valid base64: {0}")]
    BadEncoding(String),
    #[error("feed reference key has wrong length: expected {FEED_ID_LENGTH} bytes, got {0}")]
    WrongLength(usize),
}

/// Public identity of a network participant: a raw public key plus the
/// algorithm tag it belongs to. The canonical text form is `@<base64>.<algo>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedRef {
    pub id: [u8; FEED_ID_LENGTH],
    pub algo: String,
}

impl FeedRef {
    pub fn new(id: [u8; FEED_ID_LENGTH], algo: impl Into<String>) -> Self {
        Self {
            id,
            algo: algo.into(),
        }
    }

    pub fn is_ed25519(&self) -> bool {
        self.algo == "ed25519"
    }
}

impl fmt::Display for FeedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}.{}", B64.encode(self.id), self.algo)
    }
}

impl FromStr for FeedRef {
    type Err = FeedRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix('@').ok_or(FeedRefError::MissingSigil)?;
        let (key, algo) = rest.rsplit_once('.').ok_or(FeedRefError::MissingAlgo)?;
        if algo.is_empty() {
            return Err(FeedRefError::MissingAlgo);
        }

        let bytes = B64
            .decode(key)
            .map_err(|e| FeedRefError::BadEncoding(e.to_string()))?;
        let id: [u8; FEED_ID_LENGTH] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| FeedRefError::WrongLength(v.len()))?;

        Ok(Self {
            id,
            algo: algo.to_string(),
        })
    }
}

impl Serialize for FeedRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FeedRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
