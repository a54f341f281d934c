use crate::error::StorageError;

/// String key/value storage seam over the browser's persistent storage.
///
/// Reads and writes are synchronous but may fail: storage can be denied
/// entirely (private browsing) or a write can hit a quota.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

// In-memory implementations for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod memory {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory store for testing.
    #[derive(Default)]
    pub struct MemoryStore {
        entries: RefCell<HashMap<String, String>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a raw value, bypassing the `KeyValueStore` result type.
        pub fn seed(&self, key: &str, value: &str) {
            self.entries
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
        }

        pub fn raw(&self, key: &str) -> Option<String> {
            self.entries.borrow().get(key).cloned()
        }
    }

    impl KeyValueStore for MemoryStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            Ok(self.entries.borrow().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.entries
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    /// Store whose writes always fail, for quota/denial paths.
    #[derive(Default)]
    pub struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Write("quota exceeded".to_string()))
        }
    }
}
