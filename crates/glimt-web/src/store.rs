use glimt_core::{KeyValueStore, StorageError};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Storage, Window};

/// Key/value store over the window's localStorage.
///
/// Storage can be denied outright (private browsing, sandboxed frames);
/// that surfaces as `StorageError::Unavailable` on every access.
pub struct LocalStore {
    storage: Option<Storage>,
}

impl LocalStore {
    pub fn new(window: &Window) -> Self {
        Self {
            storage: window.local_storage().ok().flatten(),
        }
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let storage = self.storage.as_ref().ok_or(StorageError::Unavailable)?;
        storage.get_item(key).map_err(|_| StorageError::Unavailable)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let storage = self.storage.as_ref().ok_or(StorageError::Unavailable)?;
        storage
            .set_item(key, value)
            .map_err(|err| StorageError::Write(js_error_message(&err)))
    }
}

/// Best-effort message extraction from a thrown JS value.
pub fn js_error_message(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        String::from(error.message())
    } else {
        format!("{value:?}")
    }
}
