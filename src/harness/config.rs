use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use super::WalletFixture;
use crate::crypto::{KeyDeriver, Mnemonic};

const DEFAULT_WEBDRIVER_URL: &str = "http://127.0.0.1:9515";
const DEFAULT_TRANSITION_TIMEOUT_MS: u64 = 30000;

/// Harness inputs supplied by the test environment.
pub struct HarnessConfig {
    pub base_url: Url,
    pub extension_version: String,
    pub wallet_mnemonic: Mnemonic,
    /// `TEST_WALLET_MNEMONIC` exactly as set, typed into the application as is
    pub wallet_phrase: String,
    pub wallet_password: String,
    pub secondary_wallet_mnemonic: Option<Mnemonic>,
    pub secondary_wallet_address: Option<String>,
    pub webdriver_url: Url,
    pub transition_timeout: Duration,
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &str| {
            optional(name).with_context(|| format!("environment variable `{name}` is not set"))
        };
        let mnemonic = |name: &str, value: String| {
            Mnemonic::parse_phrase(&value).with_context(|| format!("`{name}` is not a valid mnemonic"))
        };
        let url = |name: &str, value: String| {
            Url::parse(value.trim()).with_context(|| format!("`{name}` is not a valid URL"))
        };

        let base_url = url("TEST_BASE_URL", required("TEST_BASE_URL")?)?;
        let extension_version = required("TEST_KEPLR_EXTENSION_VERSION")?.trim().to_owned();
        let wallet_phrase = required("TEST_WALLET_MNEMONIC")?;
        let wallet_mnemonic = mnemonic("TEST_WALLET_MNEMONIC", wallet_phrase.clone())?;
        let wallet_password = required("TEST_WALLET_PASSWORD")?;

        let secondary_wallet_mnemonic = optional("TEST_SECONDARY_WALLET_MNEMONIC")
            .map(|value| mnemonic("TEST_SECONDARY_WALLET_MNEMONIC", value))
            .transpose()?;
        let secondary_wallet_address =
            optional("TEST_SECONDARY_WALLET_ADDRESS").map(|value| value.trim().to_owned());

        let webdriver_url = match optional("TEST_WEBDRIVER_URL") {
            Some(value) => url("TEST_WEBDRIVER_URL", value)?,
            None => Url::parse(DEFAULT_WEBDRIVER_URL)?,
        };

        let transition_timeout = match optional("TEST_TRANSITION_TIMEOUT_MS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .context("`TEST_TRANSITION_TIMEOUT_MS` must be a number of milliseconds")?,
            None => DEFAULT_TRANSITION_TIMEOUT_MS,
        };

        Ok(Self {
            base_url,
            extension_version,
            wallet_mnemonic,
            wallet_phrase,
            wallet_password,
            secondary_wallet_mnemonic,
            secondary_wallet_address,
            webdriver_url,
            transition_timeout: Duration::from_millis(transition_timeout),
        })
    }

    pub fn primary_fixture(&self) -> WalletFixture {
        WalletFixture {
            extension_version: self.extension_version.clone(),
            password: self.wallet_password.clone(),
            mnemonic: self.wallet_mnemonic.clone(),
            app_url: self.base_url.clone(),
        }
    }

    /// Checks that the secondary wallet fixtures describe the same account.
    pub fn check_secondary_wallet(&self, deriver: &KeyDeriver) -> Result<()> {
        let (Some(mnemonic), Some(expected)) = (
            &self.secondary_wallet_mnemonic,
            &self.secondary_wallet_address,
        ) else {
            return Ok(());
        };

        let keypair = deriver
            .derive(mnemonic)
            .context("failed to derive the secondary wallet")?;
        anyhow::ensure!(
            keypair.address() == expected,
            "secondary wallet mnemonic derives {}, expected {expected}",
            keypair.address()
        );
        Ok(())
    }
}

impl std::fmt::Debug for HarnessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("base_url", &self.base_url.as_str())
            .field("extension_version", &self.extension_version)
            .field("secondary_wallet_address", &self.secondary_wallet_address)
            .field("webdriver_url", &self.webdriver_url.as_str())
            .field("transition_timeout", &self.transition_timeout)
            .finish_non_exhaustive()
    }
}
