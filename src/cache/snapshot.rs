//! Immutable point-in-time view of one application's active entries.

use std::collections::HashMap;

use time::OffsetDateTime;
use tracing::warn;

use crate::domain::entities::ConfigEntry;

/// A complete `key -> value` map built in one pass from a durable read.
///
/// Snapshots are never mutated once published; refresh builds a new one and
/// swaps it in. `generation` starts at 1 and increases by one per swap.
/// Keys keep their stored spelling but are matched case-insensitively.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    entries: HashMap<String, String>,
    /// Case-folded key -> stored key.
    folded: HashMap<String, String>,
    generation: u64,
    loaded_at: OffsetDateTime,
}

fn fold_key(key: &str) -> String {
    key.to_lowercase()
}

impl Snapshot {
    /// Build a snapshot for `application_name`, dropping inactive and foreign entries.
    pub fn build(
        application_name: &str,
        entries: impl IntoIterator<Item = ConfigEntry>,
        generation: u64,
    ) -> Self {
        let mut map = HashMap::new();
        let mut folded: HashMap<String, String> = HashMap::new();
        let mut skipped = 0usize;

        for entry in entries {
            if !entry.is_visible_to(application_name) {
                skipped += 1;
                continue;
            }
            if let Some(previous_key) = folded.insert(fold_key(&entry.key), entry.key.clone()) {
                map.remove(&previous_key);
                warn!(
                    application = application_name,
                    key = %entry.key,
                    previous_key = %previous_key,
                    "Duplicate active key in durable result; last value wins"
                );
            }
            map.insert(entry.key, entry.value);
        }

        if skipped > 0 {
            warn!(
                application = application_name,
                skipped,
                "Durable result contained inactive or foreign entries"
            );
        }

        Self {
            entries: map,
            folded,
            generation,
            loaded_at: OffsetDateTime::now_utc(),
        }
    }

    /// Value stored under `key`, compared without regard to case.
    pub fn get(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.entries.get(key) {
            return Some(value);
        }
        self.folded
            .get(&fold_key(key))
            .and_then(|stored| self.entries.get(stored))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> OffsetDateTime {
        self.loaded_at
    }

    pub fn entries(&self) -> &HashMap<String, String> {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Keys sorted for stable output.
    pub fn sorted_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Same key/value contents, ignoring generation and load time.
    pub fn same_entries(&self, other: &Snapshot) -> bool {
        self.entries == other.entries
    }

    /// Keys present here but absent from `next`.
    pub(crate) fn removed_in<'a>(&'a self, next: &Snapshot) -> Vec<&'a str> {
        self.entries
            .keys()
            .filter(|key| !next.entries.contains_key(key.as_str()))
            .map(String::as_str)
            .collect()
    }
}
