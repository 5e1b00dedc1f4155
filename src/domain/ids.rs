//! Domain identifier types with validation
//!
//! Newtype wrappers for the three levels of the source hierarchy
//! (parent entity, group, item) and the composite [`ArtifactKey`] used
//! for idempotent deduplication.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, rejecting blank values
            pub fn new(id: impl Into<String>) -> Result<Self, String> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(concat!($label, " cannot be empty").to_string());
                }
                Ok(Self(id))
            }

            /// Returns the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes self and returns the inner String
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of the top-level parent entity (e.g. a study).
    ///
    /// Text aggregation is scoped to this level.
    ParentId,
    "Parent ID"
);

string_id!(
    /// Identifier of a group within a parent (e.g. a series).
    GroupId,
    "Group ID"
);

string_id!(
    /// Identifier of a single item within a group (e.g. an instance).
    ///
    /// Also used as the file stem of staged artifacts.
    ItemId,
    "Item ID"
);

/// Composite identity of one downloadable artifact
///
/// Two source rows with equal keys describe the same artifact and fold into a
/// single output row. The canonical string form is what the ledger stores.
///
/// # Examples
///
/// ```
/// use pagefold::domain::ids::{ArtifactKey, GroupId, ItemId, ParentId};
///
/// let key = ArtifactKey::new(
///     ParentId::new("P1").unwrap(),
///     GroupId::new("G1").unwrap(),
///     ItemId::new("I1").unwrap(),
///     Some("a/b.dcm".to_string()),
/// );
/// assert_eq!(key.canonical(), r#"["P1","G1","I1","a/b.dcm"]"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    pub parent_id: ParentId,
    pub group_id: GroupId,
    pub item_id: ItemId,
    pub artifact_path: Option<String>,
}

impl ArtifactKey {
    pub fn new(
        parent_id: ParentId,
        group_id: GroupId,
        item_id: ItemId,
        artifact_path: Option<String>,
    ) -> Self {
        Self {
            parent_id,
            group_id,
            item_id,
            artifact_path,
        }
    }

    /// Canonical string form: a JSON array of the four components
    ///
    /// JSON quoting keeps the encoding injective even when components contain
    /// separator characters. A missing path encodes as `null`.
    pub fn canonical(&self) -> String {
        serde_json::json!([
            self.parent_id.as_str(),
            self.group_id.as_str(),
            self.item_id.as_str(),
            self.artifact_path,
        ])
        .to_string()
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}
