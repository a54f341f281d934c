use std::collections::HashSet;
use std::rc::Rc;

use crate::error::StorageError;
use crate::storage::KeyValueStore;

/// Storage key holding the JSON-encoded list of liked source identifiers.
pub const STORAGE_KEY: &str = "likes";

/// Persistent set of liked source identifiers.
///
/// The stored value is a JSON array of strings. An absent key, an
/// unavailable store or a corrupt value all read back as the empty set;
/// reading never raises to the caller.
pub struct LikeLedger {
    store: Rc<dyn KeyValueStore>,
}

impl LikeLedger {
    pub fn new(store: Rc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the persisted set of liked sources.
    pub fn get(&self) -> HashSet<String> {
        let raw = match self.store.get(STORAGE_KEY) {
            Ok(Some(value)) => value,
            _ => return HashSet::new(),
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(list) => list.into_iter().collect(),
            Err(_) => HashSet::new(),
        }
    }

    /// Add or remove a source and persist the updated set.
    ///
    /// The caller keeps its in-memory liked flag even when the write
    /// fails; the error is returned so it can be reported.
    pub fn set_liked(&self, src: &str, liked: bool) -> Result<(), StorageError> {
        let mut likes = self.get();
        if liked {
            likes.insert(src.to_string());
        } else {
            likes.remove(src);
        }
        let encoded = serde_json::to_string(&likes)
            .map_err(|e| StorageError::Write(e.to_string()))?;
        self.store.set(STORAGE_KEY, &encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{FailingStore, MemoryStore};

    #[test]
    fn test_get_on_empty_store_is_empty() {
        let ledger = LikeLedger::new(Rc::new(MemoryStore::new()));
        assert!(ledger.get().is_empty());
    }

    #[test]
    fn test_get_on_corrupt_value_is_empty() {
        let store = Rc::new(MemoryStore::new());
        store.seed(STORAGE_KEY, "not json at all");
        let ledger = LikeLedger::new(store);
        assert!(ledger.get().is_empty());
    }

    #[test]
    fn test_set_liked_round_trip() {
        let store = Rc::new(MemoryStore::new());
        let ledger = LikeLedger::new(store);

        ledger.set_liked("a.jpg", true).unwrap();
        assert!(ledger.get().contains("a.jpg"));

        ledger.set_liked("b.jpg", true).unwrap();
        assert_eq!(ledger.get().len(), 2);

        ledger.set_liked("a.jpg", false).unwrap();
        let likes = ledger.get();
        assert!(!likes.contains("a.jpg"));
        assert!(likes.contains("b.jpg"));
    }

    #[test]
    fn test_set_liked_reports_write_failure() {
        let ledger = LikeLedger::new(Rc::new(FailingStore));
        let err = ledger.set_liked("a.jpg", true).unwrap_err();
        assert_eq!(err, StorageError::Write("quota exceeded".to_string()));
    }
}
