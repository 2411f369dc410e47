use std::collections::VecDeque;

use serde::Serialize;

use super::entry::{CategoryFilter, FeedEntry};

/// Default number of retained entries.
pub const DEFAULT_CAPACITY: usize = 20;

/// Bounded, newest-first activity log.
///
/// New entries go to the front and the oldest fall off the back once
/// `capacity` is reached. Order is insertion order, never a sort on time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLog {
    entries: VecDeque<FeedEntry>,
    capacity: usize,
}

impl Default for FeedLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl FeedLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace the whole log with `entries`, which are already newest-first.
    pub fn seed(&mut self, entries: Vec<FeedEntry>) {
        self.entries = entries.into_iter().take(self.capacity).collect();
    }

    /// Prepend `entry`, evicting from the tail past capacity. A repeat
    /// delivery of an entry already retained is ignored and `false` returned.
    pub fn push(&mut self, entry: FeedEntry) -> bool {
        if self.entries.contains(&entry) {
            return false;
        }
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedEntry> {
        self.entries.iter()
    }

    /// Entries passing `filter`, newest first. The log itself is untouched.
    #[must_use]
    pub fn visible(&self, filter: CategoryFilter) -> Vec<FeedEntry> {
        self.entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<FeedEntry> {
        self.entries.iter().cloned().collect()
    }
}

pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch logs";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error occurred";
pub const DISCONNECTED_MESSAGE: &str = "Disconnected from live updates.";

/// Progress of the one-time bulk fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    Ready,
    FetchFailed(String),
}

/// Health of the push connection, independent of [`LoadState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum StreamState {
    Connecting,
    Connected,
    Errored(String),
    Closed,
}

/// What a consumer renders: the retained log plus both states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub log: FeedLog,
    pub load: LoadState,
    pub stream: StreamState,
}

impl Default for FeedSnapshot {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl FeedSnapshot {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            log: FeedLog::new(capacity),
            load: LoadState::Loading,
            stream: StreamState::Connecting,
        }
    }

    #[must_use]
    pub fn visible(&self, filter: CategoryFilter) -> Vec<FeedEntry> {
        self.log.visible(filter)
    }
}
