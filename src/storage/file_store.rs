use std::io::Write;
use std::os::unix::fs::DirBuilderExt;
use std::os::unix::prelude::OpenOptionsExt;
use std::path::{Path, PathBuf};

use url::Url;

use super::{KeyValueStore, StorageError};

/// One directory per origin, one file per key.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(&dir)?;
        }
        Ok(Self { dir })
    }

    pub fn for_origin<P: AsRef<Path>>(storage_root: P, origin: &Url) -> Result<Self, StorageError> {
        let origin = origin_dir_name(origin)?;
        Self::new(storage_root.as_ref().join(origin))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.key_path(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let file_path = self.key_path(key)?;
        let temp_file_path = self.dir.join(format!(".{key}.temp"));

        let mut temp_file = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .mode(0o600)
            .open(&temp_file_path)?;

        temp_file.write_all(value.as_bytes())?;
        temp_file.sync_all()?;
        drop(temp_file);

        std::fs::rename(&temp_file_path, &file_path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.key_path(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// `http://localhost:3000` -> `http_localhost_3000`
fn origin_dir_name(url: &Url) -> Result<String, StorageError> {
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(StorageError::OpaqueOrigin);
    }

    let is_separator = |c: char| !c.is_ascii_alphanumeric() && c != '.' && c != '-';

    let name = origin
        .ascii_serialization()
        .split(is_separator)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Mnemonic;
    use crate::storage::{SecretStore, STORAGE_KEY};

    #[test]
    fn origin_names() {
        let check = |url: &str, expected: &str| {
            let url = Url::parse(url).unwrap();
            assert_eq!(origin_dir_name(&url).unwrap(), expected);
        };

        check("http://localhost:3000/dashboard", "http_localhost_3000");
        check("https://app.example.com/set-seed?x=1", "https_app.example.com");

        let opaque = Url::parse("data:text/plain,hello").unwrap();
        assert!(matches!(
            origin_dir_name(&opaque),
            Err(StorageError::OpaqueOrigin)
        ));
    }

    #[test]
    fn origins_are_isolated() {
        let root = tempfile::tempdir().unwrap();
        let first = FileStore::for_origin(root.path(), &"http://localhost:3000".parse().unwrap())
            .unwrap();
        let second = FileStore::for_origin(root.path(), &"http://localhost:4000".parse().unwrap())
            .unwrap();

        first.set(STORAGE_KEY, "value").unwrap();
        assert_eq!(first.get(STORAGE_KEY).unwrap().as_deref(), Some("value"));
        assert_eq!(second.get(STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn set_replaces_and_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("origin")).unwrap();

        store.set("key", "first").unwrap();
        store.set("key", "second").unwrap();
        assert_eq!(store.get("key").unwrap().as_deref(), Some("second"));
        assert!(!store.dir().join(".key.temp").exists());

        store.remove("key").unwrap();
        store.remove("key").unwrap();
        assert_eq!(store.get("key").unwrap(), None);
    }

    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.set(STORAGE_KEY, "secret").unwrap();

        let mode = std::fs::metadata(dir.path().join(STORAGE_KEY))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        for key in ["", "../escape", ".hidden", "a/b"] {
            assert!(matches!(
                store.set(key, "value"),
                Err(StorageError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn secret_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let mnemonic = Mnemonic::generate(Default::default());

        SecretStore::new(FileStore::new(dir.path()).unwrap())
            .save(&mnemonic)
            .unwrap();

        let reopened = SecretStore::new(FileStore::new(dir.path()).unwrap());
        assert_eq!(reopened.load(), Some(mnemonic));
    }

    #[test]
    fn non_utf8_value_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORAGE_KEY), [0xff, 0xfe, 0x00]).unwrap();

        let store = SecretStore::new(FileStore::new(dir.path()).unwrap());
        assert!(store.load().is_none());
    }
}
