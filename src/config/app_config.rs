use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use broxus_util::{const_duration_ms, serde_duration_ms};
use serde::Deserialize;
use url::Url;

use crate::crypto::{DerivationPath, DeriveError, KeyDeriver};
use crate::harness::{AppSelectors, KeplrSelectors};

/// Tool config
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Chain id, selects the address prefix
    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    /// BIP-32 derivation path
    #[serde(default)]
    pub derivation_path: DerivationPath,

    /// Origin of the application holding the secret
    #[serde(default = "default_app_url")]
    pub app_url: Url,

    /// Browser automation settings
    #[serde(default)]
    pub harness: AppConfigHarness,
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path).context("failed to read app config")?;
        let mut deserializer = toml::Deserializer::new(&data);
        serde_path_to_error::deserialize(&mut deserializer).context("failed to parse app config")
    }

    /// Missing config means defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "app config not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn key_deriver(&self) -> Result<KeyDeriver, DeriveError> {
        KeyDeriver::new(self.derivation_path.clone(), &self.chain_id)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            derivation_path: Default::default(),
            app_url: default_app_url(),
            harness: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfigHarness {
    /// Directory with unpacked extension bundles, `<root>/extensions` if empty
    #[serde(default)]
    pub extensions_dir: Option<PathBuf>,

    /// Run the browser without a window
    #[serde(default)]
    pub headless: bool,

    /// Single element lookup timeout
    #[serde(with = "serde_duration_ms", default = "const_duration_ms::<10000>")]
    pub step_timeout: Duration,

    #[serde(default)]
    pub keplr: KeplrSelectors,

    #[serde(default)]
    pub app: AppSelectors,
}

impl Default for AppConfigHarness {
    fn default() -> Self {
        Self {
            extensions_dir: None,
            headless: false,
            step_timeout: const_duration_ms::<10000>(),
            keplr: Default::default(),
            app: Default::default(),
        }
    }
}

fn default_chain_id() -> String {
    "pion-1".to_owned()
}

fn default_app_url() -> Url {
    Url::parse("http://localhost:3000").expect("valid default url")
}
