use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use super::extension::ExtensionBundle;
use super::webdriver::{By, ElementId, WebDriver, WebDriverError};
use super::WalletDriver;
use crate::crypto::Mnemonic;

const EXTENSION_NAME: &str = "keplr";

/// Element selectors of the extension pages.
///
/// Selectors starting with `/` or `(` are XPath, everything else is CSS.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeplrSelectors {
    pub unlock_password: String,
    pub unlock_submit: String,
    pub unlock_error: String,
    pub home_marker: String,
    pub register_import: String,
    pub register_recovery_phrase: String,
    pub mnemonic_words: String,
    pub mnemonic_submit: String,
    pub wallet_name: String,
    pub wallet_password: String,
    pub wallet_password_confirm: String,
    pub register_submit: String,
    pub register_finish: String,
    pub account_address: String,
    pub app_connect: String,
    pub approve: String,
}

impl Default for KeplrSelectors {
    fn default() -> Self {
        Self {
            unlock_password: "input[type=password]".to_owned(),
            unlock_submit: "button[type=submit]".to_owned(),
            unlock_error: "//*[contains(text(), 'Invalid password')]".to_owned(),
            home_marker: "//*[contains(text(), 'Total Balance')]".to_owned(),
            register_import: "//button[contains(., 'Import an existing wallet')]".to_owned(),
            register_recovery_phrase: "//button[contains(., 'Use recovery phrase')]".to_owned(),
            mnemonic_words: "form input[type=password], form input[type=text]".to_owned(),
            mnemonic_submit: "//button[contains(., 'Import')]".to_owned(),
            wallet_name: "input[name=name]".to_owned(),
            wallet_password: "input[name=password]".to_owned(),
            wallet_password_confirm: "input[name=confirmPassword]".to_owned(),
            register_submit: "//button[contains(., 'Next')]".to_owned(),
            register_finish: "//button[contains(., 'Save')]".to_owned(),
            account_address: "[data-address]".to_owned(),
            app_connect: "//button[contains(., 'Connect')]".to_owned(),
            approve: "//button[contains(., 'Approve')]".to_owned(),
        }
    }
}

/// Drives an unpacked Keplr bundle in a WebDriver controlled browser.
pub struct KeplrDriver {
    webdriver_url: Url,
    extensions_dir: PathBuf,
    chain_id: String,
    selectors: KeplrSelectors,
    headless: bool,
    step_timeout: Duration,
    password: Option<String>,
    session: Option<KeplrSession>,
}

struct KeplrSession {
    browser: WebDriver,
    extension_id: String,
}

impl KeplrSession {
    fn page(&self, page: &str) -> String {
        format!("chrome-extension://{}/{page}", self.extension_id)
    }
}

impl KeplrDriver {
    pub fn new(
        webdriver_url: Url,
        extensions_dir: PathBuf,
        chain_id: &str,
        selectors: KeplrSelectors,
    ) -> Self {
        Self {
            webdriver_url,
            extensions_dir,
            chain_id: chain_id.to_owned(),
            selectors,
            headless: false,
            step_timeout: Duration::from_secs(10),
            password: None,
            session: None,
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Upper bound for a single element lookup inside a transition.
    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    /// Browser of the installed extension.
    pub fn browser(&self) -> Option<&WebDriver> {
        self.session.as_ref().map(|session| &session.browser)
    }

    pub async fn close(mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.browser.quit().await?;
        }
        Ok(())
    }

    fn session(&self) -> Result<&KeplrSession> {
        self.session.as_ref().context("extension is not installed")
    }

    async fn wait(&self, selector: &str) -> Result<ElementId> {
        let browser = &self.session()?.browser;
        browser
            .wait_for(By::selector(selector), self.step_timeout)
            .await
            .map_err(From::from)
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self.wait(selector).await?;
        self.session()?.browser.click(&element).await?;
        Ok(())
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.wait(selector).await?;
        self.session()?.browser.send_keys(&element, text).await?;
        Ok(())
    }

    /// Returns the index of the first selector that matches.
    async fn wait_any(&self, selectors: &[&str]) -> Result<usize> {
        let browser = &self.session()?.browser;
        let poll = async {
            loop {
                for (i, selector) in selectors.iter().enumerate() {
                    match browser.find(By::selector(selector)).await {
                        Ok(_) => return Ok::<_, WebDriverError>(i),
                        Err(e) if e.is_no_such_element() => continue,
                        Err(e) => return Err(e),
                    }
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };

        match tokio::time::timeout(self.step_timeout, poll).await {
            Ok(res) => res.map_err(From::from),
            Err(_) => anyhow::bail!("none of {selectors:?} appeared"),
        }
    }

    fn capabilities(&self, bundle: &ExtensionBundle) -> serde_json::Value {
        let dir = bundle.dir().display();
        let mut args = vec![
            format!("--disable-extensions-except={dir}"),
            format!("--load-extension={dir}"),
        ];
        if self.headless {
            args.push("--headless=new".to_owned());
        }

        serde_json::json!({
            "browserName": "chrome",
            "goog:chromeOptions": { "args": args },
        })
    }
}

#[async_trait::async_trait]
impl WalletDriver for KeplrDriver {
    async fn install_extension(&mut self, version: &str) -> Result<()> {
        let bundle = ExtensionBundle::locate(&self.extensions_dir, EXTENSION_NAME, version)?;
        let extension_id = bundle.extension_id()?;

        let browser = WebDriver::new_session(&self.webdriver_url, self.capabilities(&bundle))
            .await
            .context("failed to start browser")?;

        tracing::info!(version, %extension_id, "keplr extension loaded");
        self.session = Some(KeplrSession {
            browser,
            extension_id,
        });
        Ok(())
    }

    async fn unlock(&mut self, password: &str) -> Result<bool> {
        let session = self.session()?;
        session.browser.goto(&session.page("popup.html")).await?;

        let selectors = &self.selectors;
        match self
            .wait_any(&[
                selectors.unlock_password.as_str(),
                selectors.register_import.as_str(),
            ])
            .await?
        {
            0 => {
                self.type_into(&selectors.unlock_password, password).await?;
                self.click(&selectors.unlock_submit).await?;
                let outcome = self
                    .wait_any(&[
                        selectors.home_marker.as_str(),
                        selectors.unlock_error.as_str(),
                    ])
                    .await?;
                Ok(outcome == 0)
            }
            _ => {
                tracing::debug!("fresh keyring, password is set during import");
                self.password = Some(password.to_owned());
                Ok(true)
            }
        }
    }

    async fn import_account(&mut self, mnemonic: &Mnemonic) -> Result<String> {
        let session = self.session()?;
        let browser = &session.browser;
        let selectors = &self.selectors;

        browser.goto(&session.page("register.html")).await?;
        self.click(&selectors.register_import).await?;
        self.click(&selectors.register_recovery_phrase).await?;

        self.wait(&selectors.mnemonic_words).await?;
        let inputs = browser
            .find_all(By::selector(&selectors.mnemonic_words))
            .await?;
        anyhow::ensure!(
            inputs.len() >= mnemonic.word_count().word_count(),
            "expected {} word inputs, found {}",
            mnemonic.word_count().word_count(),
            inputs.len()
        );
        for (input, word) in inputs.iter().zip(mnemonic.words()) {
            browser.send_keys(input, word).await?;
        }
        self.click(&selectors.mnemonic_submit).await?;

        if let Some(password) = &self.password {
            self.type_into(&selectors.wallet_name, "seedkeeper").await?;
            self.type_into(&selectors.wallet_password, password).await?;
            self.type_into(&selectors.wallet_password_confirm, password)
                .await?;
        }
        self.click(&selectors.register_submit).await?;
        self.click(&selectors.register_finish).await?;

        browser.goto(&session.page("popup.html")).await?;
        let element = self.wait(&selectors.account_address).await?;
        let address = browser
            .execute(
                "return arguments[0].getAttribute('data-address') || arguments[0].textContent;",
                vec![element.to_json()],
            )
            .await?;

        address
            .as_str()
            .map(|address| address.trim().to_owned())
            .context("extension did not report an address")
    }

    async fn connect(&mut self, app_url: &Url) -> Result<String> {
        let browser = &self.session()?.browser;
        let selectors = &self.selectors;

        let main_window = browser.window_handle().await?;
        browser.goto(app_url.as_str()).await?;

        let known = browser.window_handles().await?;
        self.click(&selectors.app_connect).await?;

        let popup = browser
            .wait_for_new_window(&known, self.step_timeout)
            .await?;
        browser.switch_to_window(&popup).await?;
        self.click(&selectors.approve).await?;
        browser.switch_to_window(&main_window).await?;

        let address = browser
            .execute_async(
                r#"
                const done = arguments[arguments.length - 1];
                window.keplr.getKey(arguments[0])
                    .then((key) => done(key.bech32Address))
                    .catch(() => done(null));
                "#,
                vec![serde_json::json!(self.chain_id)],
            )
            .await?;

        address
            .as_str()
            .map(ToOwned::to_owned)
            .context("application session has no account")
    }
}
