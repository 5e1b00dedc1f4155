//! Idempotency ledger of emitted artifact keys
//!
//! The ledger maps each canonical [`ArtifactKey`](crate::domain::ArtifactKey)
//! string to the time it was first emitted. It is persisted inside the
//! checkpoint and handed to units as a read-only snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Read access to a set of already-emitted keys
pub trait KeySet: Send + Sync {
    fn contains_key(&self, key: &str) -> bool;
}

impl KeySet for HashSet<String> {
    fn contains_key(&self, key: &str) -> bool {
        self.contains(key)
    }
}

/// Keys emitted across the lifetime of all runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IdempotencyLedger {
    keys: BTreeMap<String, DateTime<Utc>>,
}

impl IdempotencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Records `key`; an existing entry keeps its original timestamp
    ///
    /// Returns true if the key was not present.
    pub fn insert(&mut self, key: impl Into<String>, emitted_at: DateTime<Utc>) -> bool {
        let mut inserted = false;
        self.keys.entry(key.into()).or_insert_with(|| {
            inserted = true;
            emitted_at
        });
        inserted
    }

    /// Records every key, returning how many were new
    pub fn extend<I>(&mut self, keys: I, emitted_at: DateTime<Utc>) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        keys.into_iter()
            .filter(|k| self.insert(k.clone(), emitted_at))
            .count()
    }

    /// Drops keys first emitted before `cutoff`, returning how many were dropped
    pub fn compact_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.keys.len();
        self.keys.retain(|_, emitted_at| *emitted_at >= cutoff);
        before - self.keys.len()
    }

    pub fn first_emitted_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.keys.get(key).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeySet for IdempotencyLedger {
    fn contains_key(&self, key: &str) -> bool {
        self.contains(key)
    }
}

/// Accepts both the map form and a plain list of keys
///
/// Keys loaded from a list have no emission time and are stamped with the
/// load time.
impl<'de> Deserialize<'de> for IdempotencyLedger {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Stamped(BTreeMap<String, DateTime<Utc>>),
            Plain(Vec<String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Stamped(keys) => Self { keys },
            Repr::Plain(list) => {
                let now = Utc::now();
                Self {
                    keys: list.into_iter().map(|k| (k, now)).collect(),
                }
            }
        })
    }
}

/// The dispatch-time snapshot plus keys already emitted earlier in the same unit
pub struct RunningKeys<'a> {
    snapshot: &'a IdempotencyLedger,
    local: HashSet<String>,
}

impl<'a> RunningKeys<'a> {
    pub fn new(snapshot: &'a IdempotencyLedger) -> Self {
        Self {
            snapshot,
            local: HashSet::new(),
        }
    }

    pub fn record<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.local.extend(keys);
    }

    /// Keys recorded in this unit, not counting the snapshot
    pub fn local_len(&self) -> usize {
        self.local.len()
    }
}

impl KeySet for RunningKeys<'_> {
    fn contains_key(&self, key: &str) -> bool {
        self.local.contains(key) || self.snapshot.contains(key)
    }
}
