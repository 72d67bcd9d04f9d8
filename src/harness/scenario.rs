//! Seed phrase scenarios, written once against the [`AppPage`] port.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use super::webdriver::{By, WebDriver};
use crate::crypto::{KeyDeriver, Mnemonic};
use crate::session::{Route, Session, TracingPort};
use crate::storage::{KeyValueStore, MemoryStore, SecretStore, STORAGE_KEY};

/// What a scenario needs from the application under test.
#[async_trait::async_trait]
pub trait AppPage: Send {
    /// Accepts the generated phrase on the seed page, or enters `phrase` instead.
    async fn set_seed_phrase(&mut self, phrase: Option<&str>) -> Result<()>;

    /// Reads a value from the origin's persistent storage.
    async fn stored_value(&mut self, key: &str) -> Result<Option<String>>;

    async fn reload(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub address: String,
}

/// Accepting the generated phrase stores it, and a reload derives the same address.
pub async fn autogenerated_seed_phrase<P>(page: &mut P, deriver: &KeyDeriver) -> Result<ScenarioReport>
where
    P: AppPage + ?Sized,
{
    page.set_seed_phrase(None).await?;
    let address = stored_address(page, deriver)
        .await
        .context("no usable seed phrase after accepting the generated one")?;

    page.reload().await?;
    let reloaded = stored_address(page, deriver)
        .await
        .context("seed phrase did not survive a reload")?;

    anyhow::ensure!(
        reloaded == address,
        "address changed after reload: {address} != {reloaded}"
    );

    Ok(ScenarioReport {
        name: "autogenerated seed phrase",
        address,
    })
}

/// A phrase entered by the user is stored exactly as typed.
pub async fn custom_seed_phrase<P>(
    page: &mut P,
    deriver: &KeyDeriver,
    phrase: &str,
) -> Result<ScenarioReport>
where
    P: AppPage + ?Sized,
{
    page.set_seed_phrase(Some(phrase)).await?;

    let stored = page.stored_value(STORAGE_KEY).await?;
    anyhow::ensure!(
        stored.as_deref() == Some(phrase),
        "stored value does not match the entered seed phrase"
    );

    let address = stored_address(page, deriver).await?;
    Ok(ScenarioReport {
        name: "custom seed phrase",
        address,
    })
}

async fn stored_address<P>(page: &mut P, deriver: &KeyDeriver) -> Result<String>
where
    P: AppPage + ?Sized,
{
    let stored = page
        .stored_value(STORAGE_KEY)
        .await?
        .context("storage key is empty")?;
    let mnemonic = Mnemonic::parse_phrase(&stored).context("stored seed phrase is invalid")?;
    let keypair = deriver.derive(&mnemonic)?;
    Ok(keypair.address().to_owned())
}

/// In-process application: a [`Session`] over a [`MemoryStore`].
pub struct LocalApp {
    storage: Arc<MemoryStore>,
    deriver: KeyDeriver,
    session: Session<Arc<MemoryStore>>,
}

impl LocalApp {
    pub fn new(deriver: KeyDeriver) -> Self {
        let storage = Arc::new(MemoryStore::default());
        let session = Self::open_session(&storage, &deriver);
        Self {
            storage,
            deriver,
            session,
        }
    }

    pub fn session(&self) -> &Session<Arc<MemoryStore>> {
        &self.session
    }

    fn open_session(storage: &Arc<MemoryStore>, deriver: &KeyDeriver) -> Session<Arc<MemoryStore>> {
        Session::new(
            SecretStore::new(storage.clone()),
            deriver.clone(),
            Arc::new(TracingPort),
        )
    }
}

#[async_trait::async_trait]
impl AppPage for LocalApp {
    async fn set_seed_phrase(&mut self, phrase: Option<&str>) -> Result<()> {
        match phrase {
            Some(phrase) => {
                self.session.enter_phrase(phrase)?;
            }
            None => {
                let mnemonic = Mnemonic::generate(Default::default());
                self.session.accept_generated(&mnemonic)?;
            }
        }
        Ok(())
    }

    async fn stored_value(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.storage.get(key)?)
    }

    async fn reload(&mut self) -> Result<()> {
        self.session = Self::open_session(&self.storage, &self.deriver);
        Ok(())
    }
}

/// Seed page elements of the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSelectors {
    pub accept_generated: String,
    pub enter_own: String,
    pub phrase_input: String,
    pub phrase_submit: String,
}

impl Default for AppSelectors {
    fn default() -> Self {
        Self {
            accept_generated: "//button[contains(., 'Continue with the autogenerated seed phrase')]"
                .to_owned(),
            enter_own: "//button[contains(., 'I want to enter my own recovery phrase instead')]"
                .to_owned(),
            phrase_input: "textarea".to_owned(),
            phrase_submit: "//div[@role='dialog']//button[@type='submit']".to_owned(),
        }
    }
}

/// The deployed application, driven through a browser.
pub struct BrowserApp<'a> {
    browser: &'a WebDriver,
    base_url: Url,
    selectors: AppSelectors,
    timeout: Duration,
}

impl<'a> BrowserApp<'a> {
    pub fn new(browser: &'a WebDriver, base_url: Url, selectors: AppSelectors, timeout: Duration) -> Self {
        Self {
            browser,
            base_url,
            selectors,
            timeout,
        }
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self.browser.wait_for(By::selector(selector), self.timeout).await?;
        self.browser.click(&element).await?;
        Ok(())
    }

    async fn wait_for_route(&self, route: Route) -> Result<()> {
        let wait = async {
            loop {
                let current = self.browser.current_url().await?;
                if Url::parse(&current).map(|url| url.path() == route.path()).unwrap_or_default() {
                    return Ok::<_, anyhow::Error>(());
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };

        match tokio::time::timeout(self.timeout, wait).await {
            Ok(res) => res,
            Err(_) => anyhow::bail!("application did not navigate to {}", route.path()),
        }
    }
}

#[async_trait::async_trait]
impl AppPage for BrowserApp<'_> {
    async fn set_seed_phrase(&mut self, phrase: Option<&str>) -> Result<()> {
        let page = self.base_url.join(Route::SetSeed.path())?;
        self.browser.goto(page.as_str()).await?;

        match phrase {
            Some(phrase) => {
                self.click(&self.selectors.enter_own).await?;
                let input = self
                    .browser
                    .wait_for(By::selector(&self.selectors.phrase_input), self.timeout)
                    .await?;
                self.browser.send_keys(&input, phrase).await?;
                self.click(&self.selectors.phrase_submit).await?;
            }
            None => self.click(&self.selectors.accept_generated).await?,
        }

        self.wait_for_route(Route::Dashboard).await
    }

    async fn stored_value(&mut self, key: &str) -> Result<Option<String>> {
        let value = self
            .browser
            .execute(
                "return window.localStorage.getItem(arguments[0]);",
                vec![serde_json::json!(key)],
            )
            .await?;
        Ok(value.as_str().map(ToOwned::to_owned))
    }

    async fn reload(&mut self) -> Result<()> {
        self.browser.refresh().await?;
        Ok(())
    }
}
