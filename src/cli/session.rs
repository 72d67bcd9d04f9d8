use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;
use dialoguer::theme::Theme;
use dialoguer::{Input, Select};
use seedkeeper::crypto::Mnemonic;
use seedkeeper::session::{Session, TracingPort};
use seedkeeper::storage::{FileStore, SecretStore};

use super::CliContext;
use crate::util::*;

#[derive(FromArgs)]
/// Active seed phrase of the application origin
#[argh(subcommand, name = "session")]
pub struct Cmd {
    #[argh(subcommand)]
    subcommand: SubCmd,
}

impl Cmd {
    pub async fn run(self, ctx: CliContext) -> Result<()> {
        let config = ctx.load_config()?;
        let deriver = ctx.key_deriver(&config)?;

        let store = ctx
            .dirs()
            .origin_store(&config.app_url)
            .context("failed to open origin storage")?;
        let session = Session::new(SecretStore::new(store), deriver, Arc::new(TracingPort));

        match self.subcommand {
            SubCmd::Set(cmd) => cmd.run(&session),
            SubCmd::Show(cmd) => cmd.run(&session),
            SubCmd::Clear(cmd) => cmd.run(&session),
        }
    }
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCmd {
    Set(CmdSet),
    Show(CmdShow),
    Clear(CmdClear),
}

#[derive(Debug, PartialEq, FromArgs)]
/// Accepts a generated seed phrase or a custom one
#[argh(subcommand, name = "set")]
struct CmdSet {
    /// custom seed phrase, skips the prompt
    #[argh(option)]
    phrase: Option<String>,
}

impl CmdSet {
    fn run(self, session: &Session<FileStore>) -> Result<()> {
        if let Some(phrase) = self.phrase {
            session.enter_phrase(&phrase)?;
        } else if is_terminal() {
            let theme = &dialoguer::theme::ColorfulTheme::default();
            choose_phrase(theme, session)?;
        } else {
            session.accept_generated(&Mnemonic::generate(Default::default()))?;
        }

        print_session(session)
    }
}

fn choose_phrase(theme: &dyn Theme, session: &Session<FileStore>) -> Result<()> {
    let mnemonic = Mnemonic::generate(Default::default());

    eprintln!("This will be your recovery seed phrase for your public/private keys:");
    eprintln!("{}\n", console::style(mnemonic.phrase()).bold());

    match Select::with_theme(theme)
        .item("Continue with the autogenerated seed phrase")
        .item("I want to enter my own recovery phrase instead")
        .default(0)
        .interact()?
    {
        0 => session.accept_generated(&mnemonic)?,
        _ => {
            let phrase: String = Input::with_theme(theme)
                .with_prompt("Recovery phrase")
                .validate_with(|input: &String| -> Result<(), String> {
                    Mnemonic::parse_phrase(input)
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .interact_text()?;
            session.enter_phrase(&phrase)?;
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, FromArgs)]
/// Shows the address of the active seed phrase
#[argh(subcommand, name = "show")]
struct CmdShow {}

impl CmdShow {
    fn run(self, session: &Session<FileStore>) -> Result<()> {
        print_session(session)
    }
}

#[derive(Debug, PartialEq, FromArgs)]
/// Removes the active seed phrase
#[argh(subcommand, name = "clear")]
struct CmdClear {
    /// skip the confirmation prompt
    #[argh(switch, short = 'f')]
    force: bool,
}

impl CmdClear {
    fn run(self, session: &Session<FileStore>) -> Result<()> {
        if !self.force && is_terminal() {
            let theme = &dialoguer::theme::ColorfulTheme::default();
            if !confirm(theme, false, "Remove the active seed phrase?")? {
                return Ok(());
            }
        }

        session.logout()?;
        print_output(serde_json::json!({ "active": false }));
        Ok(())
    }
}

fn print_session(session: &Session<FileStore>) -> Result<()> {
    let deriver = session.deriver();
    let address = session
        .restore()
        .context("no active seed phrase, run `session set` first")?;

    print_output(serde_json::json!({
        "active": true,
        "address": address,
        "chain_id": deriver.chain_id(),
        "path": deriver.path().as_str(),
    }));
    Ok(())
}
