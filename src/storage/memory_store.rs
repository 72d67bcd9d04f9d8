use std::collections::HashMap;

use zeroize::Zeroize;

use super::{KeyValueStore, StorageError};

/// In-process storage, lost with the process.
#[derive(Default)]
pub struct MemoryStore {
    values: parking_lot::Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let old = self.values.lock().insert(key.to_owned(), value.to_owned());
        if let Some(mut old) = old {
            old.zeroize();
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let old = self.values.lock().remove(key);
        if let Some(mut old) = old {
            old.zeroize();
        }
        Ok(())
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        for value in self.values.get_mut().values_mut() {
            value.zeroize();
        }
    }
}
