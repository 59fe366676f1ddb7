//! Tag counters: cumulative named metrics recorded by work code.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Snapshot of tag counts at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagCounts(BTreeMap<String, u64>);

impl TagCounts {
    /// Count for `tag`, 0 when never recorded.
    pub fn get(&self, tag: &str) -> u64 {
        self.0.get(tag).copied().unwrap_or(0)
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
    pub fn into_inner(self) -> BTreeMap<String, u64> {
        self.0
    }
}

impl<K: Into<String>, const N: usize> From<[(K, u64); N]> for TagCounts {
    fn from(entries: [(K, u64); N]) -> Self {
        Self(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Increment-only handle onto a processor's counters.
///
/// Cloning shares the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct TagCounter {
    counts: Arc<Mutex<BTreeMap<String, u64>>>,
}

impl TagCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, tag: &str) {
        self.count_by(tag, 1);
    }

    pub fn count_by(&self, tag: &str, n: u64) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        match counts.get_mut(tag) {
            Some(c) => *c = c.saturating_add(n),
            None => {
                counts.insert(tag.to_string(), n);
            }
        }
    }

    pub fn snapshot(&self) -> TagCounts {
        TagCounts(
            self.counts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        )
    }
}
