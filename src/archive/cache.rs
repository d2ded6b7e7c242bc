//! In-memory provider index used to answer "already archived?" without a query per item.

use crate::types::Observation;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

/// The fields of an archived observation that participate in dedup checks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedObservation {
    /// Visibility group
    pub group: String,
    /// Canonical tag string
    pub tags: String,
    /// First-seen time
    pub firsttime: Option<DateTime<Utc>>,
    /// Last-seen time
    pub lasttime: Option<DateTime<Utc>>,
}

impl CachedObservation {
    /// Whether `candidate` repeats this cached observation
    ///
    /// Group and tags must always match. A time field only participates when
    /// the candidate supplies it, and is compared against the same cached
    /// field.
    pub fn matches(&self, candidate: &Observation) -> bool {
        self.group == candidate.group()
            && self.tags == candidate.tags()
            && candidate
                .firsttime()
                .is_none_or(|t| self.firsttime == Some(t))
            && candidate
                .lasttime()
                .is_none_or(|t| self.lasttime == Some(t))
    }
}

impl From<&Observation> for CachedObservation {
    fn from(obs: &Observation) -> Self {
        Self {
            group: obs.group().to_string(),
            tags: obs.tags().to_string(),
            firsttime: obs.firsttime(),
            lasttime: obs.lasttime(),
        }
    }
}

/// Indicator value → latest archived fields, for one provider
pub type ProviderIndex = HashMap<String, CachedObservation>;

/// Bounded least-recently-used cache of provider indexes
///
/// With a capacity of one (the default) this holds exactly the provider
/// currently being ingested. Not synchronized; owned by a single
/// [`Archive`](super::Archive).
#[derive(Debug)]
pub struct ProviderCache {
    capacity: usize,
    // Most recently used first
    entries: VecDeque<(String, ProviderIndex)>,
}

impl ProviderCache {
    /// Create a cache holding at most `capacity` providers (minimum one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Maximum number of resident providers
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident providers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no provider is resident
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `provider` is resident, without touching its recency
    pub fn contains(&self, provider: &str) -> bool {
        self.position(provider).is_some()
    }

    /// Resident providers, most recently used first
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    /// Look up a provider's index without touching its recency
    pub fn peek(&self, provider: &str) -> Option<&ProviderIndex> {
        self.position(provider).map(|i| &self.entries[i].1)
    }

    /// Look up a provider's index and mark it most recently used
    pub fn get(&mut self, provider: &str) -> Option<&ProviderIndex> {
        self.touch(provider).map(|i| &self.entries[i].1)
    }

    /// Mutable lookup that also marks the provider most recently used
    pub fn get_mut(&mut self, provider: &str) -> Option<&mut ProviderIndex> {
        self.touch(provider).map(|i| &mut self.entries[i].1)
    }

    /// Install a provider's index, replacing any previous index for it
    ///
    /// Returns the provider evicted to make room, if any.
    pub fn insert(&mut self, provider: impl Into<String>, index: ProviderIndex) -> Option<String> {
        let provider = provider.into();
        if let Some(i) = self.position(&provider) {
            self.entries.remove(i);
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_back().map(|(p, _)| p)
        } else {
            None
        };

        self.entries.push_front((provider, index));
        evicted
    }

    /// Drop a single provider's index
    pub fn remove(&mut self, provider: &str) -> Option<ProviderIndex> {
        self.position(provider)
            .and_then(|i| self.entries.remove(i))
            .map(|(_, index)| index)
    }

    /// Drop every resident index
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, provider: &str) -> Option<usize> {
        self.entries.iter().position(|(p, _)| p == provider)
    }

    fn touch(&mut self, provider: &str) -> Option<usize> {
        let i = self.position(provider)?;
        if i != 0 {
            let entry = self.entries.remove(i)?;
            self.entries.push_front(entry);
        }
        Some(0)
    }
}

impl Default for ProviderCache {
    fn default() -> Self {
        Self::new(1)
    }
}
