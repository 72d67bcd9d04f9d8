use std::sync::Arc;

use zeroize::Zeroizing;

pub use self::file_store::FileStore;
pub use self::memory_store::MemoryStore;
use crate::crypto::Mnemonic;

mod file_store;
mod memory_store;

/// Key under which the active phrase is persisted.
pub const STORAGE_KEY: &str = "ephemeral-mnemonic";

/// Per-origin persistent string storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replaces any previous value atomically.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        T::get(self, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        T::set(self, key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        T::remove(self, key)
    }
}

/// Holds at most one phrase per origin. Derived keys are never stored.
pub struct SecretStore<S> {
    storage: S,
}

impl<S: KeyValueStore> SecretStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn save(&self, mnemonic: &Mnemonic) -> Result<(), StorageError> {
        self.save_as_entered(mnemonic, mnemonic.phrase())
    }

    /// Stores `entered` as typed by the user. It must parse to `mnemonic`.
    pub fn save_as_entered(&self, mnemonic: &Mnemonic, entered: &str) -> Result<(), StorageError> {
        self.storage.set(STORAGE_KEY, entered)?;
        tracing::debug!(words = mnemonic.word_count().word_count(), "stored secret");
        Ok(())
    }

    /// Any storage or validation failure is reported as an absent secret.
    pub fn load(&self) -> Option<Mnemonic> {
        let raw = match self.storage.get(STORAGE_KEY) {
            Ok(Some(raw)) => Zeroizing::new(raw),
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("failed to read stored secret: {e}");
                return None;
            }
        };

        match Mnemonic::parse_phrase(&raw) {
            Ok(mnemonic) => Some(mnemonic),
            Err(e) => {
                // NOTE: the error itself may contain a stored word
                tracing::warn!(kind = error_kind(&e), "stored secret is corrupted, ignoring it");
                None
            }
        }
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(STORAGE_KEY)?;
        tracing::debug!("cleared stored secret");
        Ok(())
    }
}

fn error_kind(error: &crate::crypto::ValidationError) -> &'static str {
    use crate::crypto::ValidationError;

    match error {
        ValidationError::InvalidWordCount(_) => "invalid_word_count",
        ValidationError::UnknownWord { .. } => "unknown_word",
        ValidationError::ChecksumMismatch => "checksum_mismatch",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error")]
    Io(#[from] std::io::Error),
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
    #[error("opaque origins have no persistent storage")]
    OpaqueOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str =
        "legal winner thank year wave sausage worth useful legal winner thank yellow";

    fn store() -> SecretStore<Arc<MemoryStore>> {
        SecretStore::new(Arc::new(MemoryStore::default()))
    }

    #[test]
    fn save_then_load() {
        let store = store();
        let mnemonic = Mnemonic::parse_phrase(PHRASE).unwrap();

        assert!(store.load().is_none());
        store.save(&mnemonic).unwrap();
        assert_eq!(store.load(), Some(mnemonic));
        assert_eq!(
            store.storage().get(STORAGE_KEY).unwrap().as_deref(),
            Some(PHRASE)
        );
    }

    #[test]
    fn save_overwrites() {
        let store = store();
        store.save(&Mnemonic::parse_phrase(PHRASE).unwrap()).unwrap();

        let second = Mnemonic::generate(Default::default());
        store.save(&second).unwrap();
        assert_eq!(store.load(), Some(second));
    }

    #[test]
    fn clear_is_idempotent() {
        let store = store();
        store.save(&Mnemonic::parse_phrase(PHRASE).unwrap()).unwrap();

        store.clear().unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn corrupted_values_load_as_none() {
        let store = store();
        for corrupted in [
            "",
            "legal winner thank",
            "legal winner thank year wave sausage worth useful legal winner thank year",
            "legal winner thank year wave sausage worth useful legal winner thank xyzzy",
            "{\"not\":\"a phrase\"}",
        ] {
            store.storage().set(STORAGE_KEY, corrupted).unwrap();
            assert!(store.load().is_none(), "`{corrupted}` must be ignored");
        }
    }
}
