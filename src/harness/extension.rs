use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use sha2::Digest;

/// Unpacked browser extension of a pinned version.
#[derive(Debug, Clone)]
pub struct ExtensionBundle {
    dir: PathBuf,
    version: String,
    key: Option<String>,
}

impl ExtensionBundle {
    /// Opens `<extensions_dir>/<name>-<version>` and checks its manifest.
    pub fn locate<P: AsRef<Path>>(extensions_dir: P, name: &str, version: &str) -> Result<Self> {
        let dir = extensions_dir.as_ref().join(format!("{name}-{version}"));
        let dir = dir
            .canonicalize()
            .with_context(|| format!("extension bundle not found at {}", dir.display()))?;

        let manifest = Manifest::load(dir.join("manifest.json"))?;
        anyhow::ensure!(
            manifest.version == version,
            "pinned {name} version is {version}, bundle has {}",
            manifest.version
        );

        tracing::debug!(path = %dir.display(), version, "found extension bundle");

        Ok(Self {
            dir,
            version: manifest.version,
            key: manifest.key,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Id the browser assigns to the unpacked extension.
    ///
    /// Derived from the manifest key when present, otherwise from the
    /// absolute bundle path.
    pub fn extension_id(&self) -> Result<String> {
        let digest = match &self.key {
            Some(key) => {
                let key = base64::decode(key.trim()).context("invalid manifest key")?;
                sha2::Sha256::digest(&key)
            }
            None => sha2::Sha256::digest(self.dir.to_string_lossy().as_bytes()),
        };
        Ok(encode_extension_id(&digest[..16]))
    }
}

#[derive(Deserialize)]
struct Manifest {
    version: String,
    #[serde(default)]
    key: Option<String>,
}

impl Manifest {
    fn load(path: PathBuf) -> Result<Self> {
        let file = std::fs::File::open(&path).context("failed to open extension manifest")?;
        let mut deserializer = serde_json::Deserializer::from_reader(std::io::BufReader::new(file));
        serde_path_to_error::deserialize(&mut deserializer)
            .context("failed to parse extension manifest")
    }
}

/// Hex digits mapped onto `a..=p`.
fn encode_extension_id(bytes: &[u8]) -> String {
    hex::encode(bytes)
        .chars()
        .map(|c| match c.to_digit(16) {
            Some(digit) => (b'a' + digit as u8) as char,
            None => c,
        })
        .collect()
}
