//! InFlightSources - descriptors of sources with at least one event inside a worker

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{SourceDescriptor, SourceId};

#[derive(Debug)]
struct InFlightEntry {
    /// `None` records a lookup that found nothing
    info: Option<Arc<SourceDescriptor>>,
    owners: usize,
}

/// Reference-counted source cache
///
/// An id is present iff at least one worker owns an event from that source.
#[derive(Debug, Default)]
pub struct InFlightSources {
    entries: HashMap<SourceId, InFlightEntry>,
}

impl InFlightSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one owner to a cached source
    ///
    /// Returns the cached lookup outcome, or `None` if the id is not in flight.
    pub fn acquire(&mut self, id: SourceId) -> Option<Option<Arc<SourceDescriptor>>> {
        let entry = self.entries.get_mut(&id)?;
        entry.owners += 1;
        Some(entry.info.clone())
    }

    /// Cache a fresh lookup outcome with a single owner
    pub fn insert(&mut self, id: SourceId, info: Option<Arc<SourceDescriptor>>) {
        self.entries.insert(id, InFlightEntry { info, owners: 1 });
    }

    /// Drop one owner, removing the entry when none remain
    ///
    /// Returns `true` if the entry was removed.
    pub fn release(&mut self, id: SourceId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        entry.owners = entry.owners.saturating_sub(1);
        if entry.owners == 0 {
            self.entries.remove(&id);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of workers currently holding events from `id`
    #[cfg(test)]
    pub fn owners(&self, id: SourceId) -> usize {
        self.entries.get(&id).map_or(0, |e| e.owners)
    }

    /// Sorted ids currently in flight
    pub fn ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refcount_lifecycle() {
        let mut sources = InFlightSources::new();
        assert!(sources.acquire(1).is_none());

        sources.insert(1, Some(Arc::new(SourceDescriptor::new(1, "k8saudit", "k8s_audit"))));
        let cached = sources.acquire(1).unwrap().unwrap();
        assert_eq!(cached.name, "k8saudit");
        assert_eq!(sources.owners(1), 2);

        assert!(!sources.release(1));
        assert!(sources.contains(1));
        assert!(sources.release(1));
        assert!(!sources.contains(1));
        assert!(sources.is_empty());
    }

    #[test]
    fn test_unknown_outcome_is_cached() {
        let mut sources = InFlightSources::new();
        sources.insert(9, None);
        assert_eq!(sources.acquire(9), Some(None));
        assert_eq!(sources.ids(), vec![9]);
    }

    #[test]
    fn test_release_unknown_id_is_noop() {
        let mut sources = InFlightSources::new();
        assert!(!sources.release(42));
        assert_eq!(sources.len(), 0);
    }
}
