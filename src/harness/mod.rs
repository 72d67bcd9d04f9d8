use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use url::Url;

pub use self::config::HarnessConfig;
pub use self::extension::ExtensionBundle;
pub use self::keplr::{KeplrDriver, KeplrSelectors};
pub use self::scenario::{AppPage, AppSelectors, BrowserApp, LocalApp, ScenarioReport};
pub use self::webdriver::{By, ElementId, WebDriver, WebDriverError};

use crate::crypto::{DeriveError, KeyDeriver, Mnemonic};

mod config;
mod extension;
mod keplr;
pub mod scenario;
mod webdriver;

/// Wallet extension progress, in transition order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum WalletFixtureState {
    Uninstalled,
    Installed,
    Unlocked,
    Imported,
    Connected,
}

impl std::fmt::Display for WalletFixtureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Uninstalled => "uninstalled",
            Self::Installed => "installed",
            Self::Unlocked => "unlocked",
            Self::Imported => "imported",
            Self::Connected => "connected",
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transition {
    Install,
    Unlock,
    Import,
    Connect,
}

impl Transition {
    fn from_state(self) -> WalletFixtureState {
        match self {
            Self::Install => WalletFixtureState::Uninstalled,
            Self::Unlock => WalletFixtureState::Installed,
            Self::Import => WalletFixtureState::Unlocked,
            Self::Connect => WalletFixtureState::Imported,
        }
    }

    fn to_state(self) -> WalletFixtureState {
        match self {
            Self::Install => WalletFixtureState::Installed,
            Self::Unlock => WalletFixtureState::Unlocked,
            Self::Import => WalletFixtureState::Imported,
            Self::Connect => WalletFixtureState::Connected,
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Install => "install extension",
            Self::Unlock => "unlock",
            Self::Import => "import account",
            Self::Connect => "connect",
        })
    }
}

/// Automation backend for a wallet extension.
///
/// Implementations only perform the UI work. Ordering, timeouts and
/// the address cross-check are enforced by [`WalletHarness`].
#[async_trait::async_trait]
pub trait WalletDriver: Send {
    /// Loads the extension bundle of the pinned version.
    async fn install_extension(&mut self, version: &str) -> Result<()>;

    /// Returns `false` if the extension rejected the password.
    async fn unlock(&mut self, password: &str) -> Result<bool>;

    /// Returns the address the extension reports for the imported account.
    async fn import_account(&mut self, mnemonic: &Mnemonic) -> Result<String>;

    /// Returns the address the application session reports after approval.
    async fn connect(&mut self, app_url: &Url) -> Result<String>;
}

/// Known-good inputs for a full run.
pub struct WalletFixture {
    pub extension_version: String,
    pub password: String,
    pub mnemonic: Mnemonic,
    pub app_url: Url,
}

pub struct WalletHarness<D> {
    driver: D,
    deriver: KeyDeriver,
    transition_timeout: Duration,
    state: WalletFixtureState,
    expected_address: Option<String>,
    aborted: bool,
}

impl<D: WalletDriver> WalletHarness<D> {
    pub fn new(driver: D, deriver: KeyDeriver, transition_timeout: Duration) -> Self {
        Self {
            driver,
            deriver,
            transition_timeout,
            state: WalletFixtureState::Uninstalled,
            expected_address: None,
            aborted: false,
        }
    }

    pub fn state(&self) -> WalletFixtureState {
        self.state
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    pub async fn install_extension(&mut self, version: &str) -> Result<(), FixtureError> {
        self.begin(Transition::Install)?;
        let res = with_timeout(self.transition_timeout, self.driver.install_extension(version)).await;
        self.finish(Transition::Install, res)
    }

    pub async fn unlock(&mut self, password: &str) -> Result<(), FixtureError> {
        self.begin(Transition::Unlock)?;
        let res = with_timeout(self.transition_timeout, self.driver.unlock(password)).await;
        let unlocked = self.finish(Transition::Unlock, res)?;
        if !unlocked {
            self.state = WalletFixtureState::Installed;
            return Err(self.fail(Transition::Unlock, FixtureErrorKind::UnlockFailed));
        }
        Ok(())
    }

    /// Imports the account and checks that the extension derived the same address.
    pub async fn import_account(&mut self, mnemonic: &Mnemonic) -> Result<String, FixtureError> {
        self.begin(Transition::Import)?;

        let expected = match self.deriver.derive(mnemonic) {
            Ok(keypair) => keypair.address().to_owned(),
            Err(e) => return Err(self.fail(Transition::Import, e.into())),
        };

        let res = with_timeout(self.transition_timeout, self.driver.import_account(mnemonic)).await;
        let actual = self.finish(Transition::Import, res)?;
        self.check_address(Transition::Import, &expected, actual)?;

        tracing::info!(address = %expected, "account imported");
        self.expected_address = Some(expected.clone());
        Ok(expected)
    }

    pub async fn connect(&mut self, app_url: &Url) -> Result<String, FixtureError> {
        self.begin(Transition::Connect)?;

        let res = with_timeout(self.transition_timeout, self.driver.connect(app_url)).await;
        let actual = self.finish(Transition::Connect, res)?;

        let expected = self.expected_address.clone().unwrap_or_default();
        self.check_address(Transition::Connect, &expected, actual)?;

        tracing::info!(address = %expected, %app_url, "application connected");
        Ok(expected)
    }

    /// Drives the extension from a fresh install to a connected session.
    pub async fn run_to_connected(&mut self, fixture: &WalletFixture) -> Result<String, FixtureError> {
        self.install_extension(&fixture.extension_version).await?;
        self.unlock(&fixture.password).await?;
        self.import_account(&fixture.mnemonic).await?;
        self.connect(&fixture.app_url).await
    }

    fn begin(&mut self, step: Transition) -> Result<(), FixtureError> {
        if self.aborted || self.state != step.from_state() {
            return Err(self.fail(step, FixtureErrorKind::InvalidTransition));
        }
        tracing::debug!(%step, from = %self.state, "transition started");
        Ok(())
    }

    fn finish<T>(
        &mut self,
        step: Transition,
        res: Result<T, FixtureErrorKind>,
    ) -> Result<T, FixtureError> {
        match res {
            Ok(value) => {
                self.state = step.to_state();
                Ok(value)
            }
            Err(kind) => Err(self.fail(step, kind)),
        }
    }

    fn check_address(
        &mut self,
        step: Transition,
        expected: &str,
        actual: String,
    ) -> Result<(), FixtureError> {
        if actual != expected {
            self.state = step.from_state();
            return Err(self.fail(
                step,
                FixtureErrorKind::AddressMismatch {
                    expected: expected.to_owned(),
                    actual,
                },
            ));
        }
        Ok(())
    }

    fn fail(&mut self, step: Transition, kind: FixtureErrorKind) -> FixtureError {
        self.aborted = true;
        tracing::warn!(%step, last_state = %self.state, "transition failed: {kind}");
        FixtureError {
            step,
            last_state: self.state,
            kind,
        }
    }
}

async fn with_timeout<F, T>(timeout: Duration, f: F) -> Result<T, FixtureErrorKind>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(res) => res.map_err(FixtureErrorKind::Driver),
        Err(_) => Err(FixtureErrorKind::Timeout(timeout)),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{step} failed, last successful state is `{last_state}`")]
pub struct FixtureError {
    pub step: Transition,
    pub last_state: WalletFixtureState,
    #[source]
    pub kind: FixtureErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureErrorKind {
    #[error("extension rejected the unlock password")]
    UnlockFailed,
    #[error("address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: String, actual: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("transition is not allowed in the current state")]
    InvalidTransition,
    #[error("failed to derive the expected address")]
    Derive(#[from] DeriveError),
    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}
