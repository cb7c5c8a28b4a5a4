//! Keyed in-memory stores for uploads awaiting review and for rebuilt files
//! awaiting download.
//!
//! Entries live until a caller removes or takes them; nothing expires.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::document::ReconstructedArtifact;

/// A store whose entries are addressed by fresh random identifiers.
pub trait OneShotStore<V>: Send + Sync {
    /// Stores `value` under a new identifier.
    fn insert(&self, value: V) -> Uuid;

    /// Returns a copy of the entry, leaving it in place.
    fn get(&self, id: &Uuid) -> Option<V>;

    /// Removes and returns the entry.
    fn take(&self, id: &Uuid) -> Option<V>;

    fn remove(&self, id: &Uuid) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// File uploaded during analysis, kept for the masking step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub struct MemoryStore<V> {
    name: &'static str,
    entries: Mutex<HashMap<Uuid, V>>,
}

/// Uploads waiting for the reviewer to confirm.
pub type UploadCache = MemoryStore<UploadedFile>;

/// Rebuilt files waiting to be downloaded.
pub type DownloadRegistry = MemoryStore<ReconstructedArtifact>;

impl<V> MemoryStore<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, V>> {
        // Entries are plain data, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("{} store lock was poisoned, recovering", self.name);
            poisoned.into_inner()
        })
    }
}

impl<V: Clone + Send> OneShotStore<V> for MemoryStore<V> {
    fn insert(&self, value: V) -> Uuid {
        let id = Uuid::new_v4();
        let mut entries = self.lock();
        entries.insert(id, value);
        debug!("Stored {} entry {} ({} held)", self.name, id, entries.len());
        id
    }

    fn get(&self, id: &Uuid) -> Option<V> {
        let found = self.lock().get(id).cloned();
        trace!("Lookup of {} entry {}: {}", self.name, id, found.is_some());
        found
    }

    fn take(&self, id: &Uuid) -> Option<V> {
        let taken = self.lock().remove(id);
        match &taken {
            Some(_) => debug!("Consumed {} entry {}", self.name, id),
            None => debug!("No {} entry {} to consume", self.name, id),
        }
        taken
    }

    fn remove(&self, id: &Uuid) -> bool {
        self.take(id).is_some()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Parses a client-supplied identifier; malformed ids behave like unknown
/// ones.
pub fn parse_id(raw: &str) -> Option<Uuid> {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => Some(id),
        Err(e) => {
            debug!("Ignoring malformed identifier {:?}: {}", raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            bytes: b"hello".to_vec(),
        }
    }

    #[test]
    fn test_get_does_not_consume() {
        let store = UploadCache::new("upload");
        let id = store.insert(upload("a.txt"));
        assert_eq!(store.get(&id), Some(upload("a.txt")));
        assert_eq!(store.get(&id), Some(upload("a.txt")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_take_consumes() {
        let store = UploadCache::new("upload");
        let id = store.insert(upload("a.txt"));
        assert!(store.take(&id).is_some());
        assert!(store.take(&id).is_none());
        assert!(!store.remove(&id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_ids_are_distinct() {
        let store = UploadCache::new("upload");
        let first = store.insert(upload("a.txt"));
        let second = store.insert(upload("a.txt"));
        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()), Some(id));
        assert_eq!(parse_id("not-an-id"), None);
        assert_eq!(parse_id(""), None);
    }
}
