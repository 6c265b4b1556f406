//! Watch registry keyed by watch id.
//!
//! Ids come from a counter that starts at 1 and is never rewound, so an
//! id seen in a late event can never name a newer watch.

use std::collections::BTreeMap;
use std::path::Path;

use super::handler::WatchId;
use super::watch::Watch;

/// Owns every active watch.
#[derive(Default)]
pub struct WatchRegistry {
    watches: BTreeMap<WatchId, Watch>,
    last_id: u64,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next id. Consumed even if the watch fails to open.
    pub(crate) fn next_id(&mut self) -> WatchId {
        self.last_id += 1;
        WatchId(self.last_id)
    }

    pub(crate) fn insert(&mut self, watch: Watch) {
        self.watches.insert(watch.id(), watch);
    }

    pub(crate) fn remove(&mut self, id: WatchId) -> Option<Watch> {
        self.watches.remove(&id)
    }

    /// Take every watch out, in id order.
    pub(crate) fn drain(&mut self) -> Vec<Watch> {
        std::mem::take(&mut self.watches).into_values().collect()
    }

    pub fn get(&self, id: WatchId) -> Option<&Watch> {
        self.watches.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: WatchId) -> Option<&mut Watch> {
        self.watches.get_mut(&id)
    }

    pub fn contains(&self, id: WatchId) -> bool {
        self.watches.contains_key(&id)
    }

    /// First watch whose directory is exactly `directory`.
    pub fn find_by_directory(&self, directory: &Path) -> Option<WatchId> {
        self.watches
            .values()
            .find(|watch| watch.directory() == directory)
            .map(Watch::id)
    }

    /// Active ids in ascending order.
    pub fn ids(&self) -> Vec<WatchId> {
        self.watches.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Watch> {
        self.watches.values()
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}
