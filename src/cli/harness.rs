use std::str::FromStr;

use anyhow::{Context, Result};
use argh::FromArgs;
use seedkeeper::config::AppConfig;
use seedkeeper::crypto::{KeyDeriver, Mnemonic};
use seedkeeper::harness::scenario::{autogenerated_seed_phrase, custom_seed_phrase};
use seedkeeper::harness::{
    AppPage, BrowserApp, HarnessConfig, KeplrDriver, LocalApp, ScenarioReport, WalletHarness,
};

use super::CliContext;
use crate::util::*;

#[derive(FromArgs)]
/// End-to-end wallet scenarios
#[argh(subcommand, name = "harness")]
pub struct Cmd {
    #[argh(subcommand)]
    subcommand: SubCmd,
}

impl Cmd {
    pub async fn run(self, ctx: CliContext) -> Result<()> {
        match self.subcommand {
            SubCmd::Run(cmd) => cmd.run(ctx).await,
        }
    }
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCmd {
    Run(CmdRun),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Scenario {
    Import,
    SeedPhrase,
    All,
}

impl Scenario {
    fn seed_phrase(self) -> bool {
        matches!(self, Self::SeedPhrase | Self::All)
    }
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "import" => Self::Import,
            "seed-phrase" => Self::SeedPhrase,
            "all" => Self::All,
            _ => anyhow::bail!("unknown scenario `{s}`, expected import, seed-phrase or all"),
        })
    }
}

#[derive(Debug, PartialEq, FromArgs)]
/// Runs scenarios against the application and the wallet extension
#[argh(subcommand, name = "run")]
struct CmdRun {
    /// scenario to run: import, seed-phrase or all
    #[argh(option, default = "Scenario::All")]
    scenario: Scenario,

    /// run seed phrase scenarios against an in-process application
    #[argh(switch)]
    local: bool,
}

impl CmdRun {
    async fn run(self, ctx: CliContext) -> Result<()> {
        let config = ctx.load_config()?;
        let deriver = ctx.key_deriver(&config)?;

        let output = if self.local {
            let phrase = Mnemonic::generate(Default::default());
            let mut app = LocalApp::new(deriver.clone());
            let reports =
                run_seed_phrase(&mut app, &deriver, phrase.phrase(), &mut Steps::new(2)).await?;
            serde_json::json!({ "scenarios": reports })
        } else {
            self.run_browser(&ctx, &config, deriver).await?
        };

        print_output(output);
        Ok(())
    }

    async fn run_browser(
        &self,
        ctx: &CliContext,
        config: &AppConfig,
        deriver: KeyDeriver,
    ) -> Result<serde_json::Value> {
        let env = HarnessConfig::from_env()?;
        tracing::debug!(?env, "harness config loaded");
        env.check_secondary_wallet(&deriver)?;

        let settings = &config.harness;
        let extensions_dir = settings
            .extensions_dir
            .clone()
            .unwrap_or_else(|| ctx.dirs().extensions_dir.clone());

        let driver = KeplrDriver::new(
            env.webdriver_url.clone(),
            extensions_dir,
            deriver.chain_id(),
            settings.keplr.clone(),
        )
        .with_headless(settings.headless)
        .with_step_timeout(settings.step_timeout);

        let mut steps = Steps::new(if self.scenario.seed_phrase() { 3 } else { 1 });

        steps.next("Preparing wallet extension");
        let mut harness = WalletHarness::new(driver, deriver.clone(), env.transition_timeout);
        let connected = harness.run_to_connected(&env.primary_fixture()).await;
        let driver = harness.into_driver();

        let result = match connected {
            Ok(address) if self.scenario.seed_phrase() => {
                let browser = driver.browser().context("browser is not running")?;
                let mut app = BrowserApp::new(
                    browser,
                    env.base_url.clone(),
                    settings.app.clone(),
                    settings.step_timeout,
                );
                run_seed_phrase(&mut app, &deriver, &env.wallet_phrase, &mut steps)
                    .await
                    .map(|reports| serde_json::json!({ "address": address, "scenarios": reports }))
            }
            Ok(address) => Ok(serde_json::json!({ "address": address })),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = driver.close().await {
            tracing::warn!("failed to close browser: {e:?}");
        }
        result
    }
}

async fn run_seed_phrase<P>(
    app: &mut P,
    deriver: &KeyDeriver,
    phrase: &str,
    steps: &mut Steps,
) -> Result<Vec<ScenarioReport>>
where
    P: AppPage,
{
    steps.next("Using the autogenerated seed phrase");
    let generated = autogenerated_seed_phrase(app, deriver).await?;

    steps.next("Entering a custom seed phrase");
    let custom = custom_seed_phrase(app, deriver, phrase).await?;

    Ok(vec![generated, custom])
}
