//! Credential wrappers for the source connection string and storage token
//!
//! A [`SecretString`] zeroes its buffer on drop, prints as `[REDACTED]` under
//! `Debug` and serializes as [`REDACTED`], so dumping a loaded
//! configuration never leaks a credential. The value is only reachable
//! through `expose_secret()`.
//!
//! ```rust
//! use pagefold::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let token = secret_string("ya29.token".to_string());
//! assert_eq!(token.expose_secret().as_ref(), "ya29.token");
//! assert!(!format!("{token:?}").contains("ya29"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Deref;
use zeroize::Zeroize;

/// Placeholder written wherever a secret would be serialized
pub const REDACTED: &str = "***";

/// Credential text held inside a [`SecretString`]
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Deref for SecretValue {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for SecretValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

pub type SecretString = Secret<SecretValue>;

pub fn secret_string(value: String) -> SecretString {
    Secret::new(value.into())
}

/// Empty values count as unset
pub fn secret_string_opt(value: Option<String>) -> Option<SecretString> {
    value.filter(|v| !v.is_empty()).map(secret_string)
}
