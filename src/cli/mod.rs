use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use seedkeeper::config::AppConfig;
use seedkeeper::crypto::KeyDeriver;
use seedkeeper::dirs::ProjectDirs;

use crate::util::*;

pub mod harness;
pub mod seed;
pub mod session;

/// Ephemeral seed phrase keeper and wallet test harness
#[derive(FromArgs)]
pub struct App {
    #[argh(subcommand)]
    command: Command,

    /// path to the root directory
    #[argh(option, default = "ProjectDirs::default_root_dir()")]
    root: PathBuf,
}

impl App {
    pub async fn run(self) -> Result<()> {
        tracing::debug!("root dir {:?}", self.root);

        let ctx = CliContext {
            dirs: ProjectDirs::new(self.root),
        };

        match self.command {
            Command::Seed(cmd) => cmd.run(ctx),
            Command::Session(cmd) => invoke_as_cli(cmd.run(ctx)).await,
            Command::Harness(cmd) => cmd.run(ctx).await,
        }
    }
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Seed(seed::Cmd),
    Session(session::Cmd),
    Harness(harness::Cmd),
}

pub struct CliContext {
    dirs: ProjectDirs,
}

impl CliContext {
    pub fn load_config(&self) -> Result<AppConfig> {
        AppConfig::load_or_default(&self.dirs.app_config)
    }

    pub fn key_deriver(&self, config: &AppConfig) -> Result<KeyDeriver> {
        config
            .key_deriver()
            .with_context(|| format!("invalid config {}", note(self.dirs.app_config.display())))
    }

    pub fn dirs(&self) -> &ProjectDirs {
        &self.dirs
    }
}
