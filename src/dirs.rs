use std::path::{Path, PathBuf};

use anyhow::Result;
use url::Url;

use crate::storage::{FileStore, StorageError};

const ENV: &str = "SEEDKEEPER_ROOT";
const DEFAULT_ROOT_DIR: &str = ".seedkeeper";

pub struct ProjectDirs {
    pub app_config: PathBuf,
    pub storage_dir: PathBuf,
    pub extensions_dir: PathBuf,
    pub root: PathBuf,
}

impl ProjectDirs {
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        let root = root_dir.as_ref().to_path_buf();

        Self {
            app_config: root.join("config.toml"),
            storage_dir: root.join("storage"),
            extensions_dir: root.join("extensions"),
            root,
        }
    }

    pub fn default_root_dir() -> PathBuf {
        if let Ok(path) = std::env::var(ENV) {
            PathBuf::from(path)
        } else {
            default_root_dir()
        }
    }

    /// Persistent store of the given application origin.
    pub fn origin_store(&self, origin: &Url) -> Result<FileStore, StorageError> {
        FileStore::for_origin(&self.storage_dir, origin)
    }
}

fn default_root_dir() -> PathBuf {
    match home::home_dir() {
        Some(home) => home.join(DEFAULT_ROOT_DIR),
        None => {
            tracing::warn!("no home directory, using the current directory");
            PathBuf::from(DEFAULT_ROOT_DIR)
        }
    }
}
