use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current schema version written to the session.
pub const SCHEMA_VERSION: u32 = 1;

/// Identity of one user interaction. Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The two logical entries the payment flow keeps in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    Attempt,
    Result,
}

impl SessionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::Attempt => "payment.attempt",
            SessionKey::Result => "payment.result",
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    payload: serde_json::Value,
}

/// Wraps `value` in a versioned JSON envelope.
pub fn encode<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&EnvelopeRef {
        version: SCHEMA_VERSION,
        payload: value,
    })
}

/// Reads a value written by [`encode`].
///
/// Anything that cannot be read back, including envelopes from a newer schema,
/// comes back as `None` so callers treat it like a missing entry.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    let envelope: Envelope = match serde_json::from_slice(bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable session entry");
            return None;
        }
    };
    if envelope.version > SCHEMA_VERSION {
        tracing::warn!(
            version = envelope.version,
            "discarding session entry written by a newer schema"
        );
        return None;
    }
    match serde_json::from_value(envelope.payload) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "discarding session entry with unexpected shape");
            None
        }
    }
}
