use anyhow::{Context, Result};
use argh::FromArgs;
use seedkeeper::crypto::{DerivationPath, KeyDeriver, Mnemonic, WordCount};

use super::CliContext;
use crate::util::*;

#[derive(FromArgs)]
/// Seed utils
#[argh(subcommand, name = "seed")]
pub struct Cmd {
    #[argh(subcommand)]
    subcommand: SubCmd,
}

impl Cmd {
    pub fn run(self, ctx: CliContext) -> Result<()> {
        match self.subcommand {
            SubCmd::Generate(cmd) => cmd.run(),
            SubCmd::Validate(cmd) => cmd.run(),
            SubCmd::Derive(cmd) => cmd.run(ctx),
        }
    }
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCmd {
    Generate(CmdGenerate),
    Validate(CmdValidate),
    Derive(CmdDerive),
}

#[derive(Debug, PartialEq, FromArgs)]
/// Generates new seed
#[argh(subcommand, name = "generate")]
struct CmdGenerate {
    /// number of words (12, 15, 18, 21 or 24)
    #[argh(option, short = 'w', default = "WordCount::default()")]
    words: WordCount,
}

impl CmdGenerate {
    fn run(self) -> Result<()> {
        let mnemonic = Mnemonic::generate(self.words);
        print_output(mnemonic.phrase());
        Ok(())
    }
}

#[derive(Debug, PartialEq, FromArgs)]
/// Checks word count, word list membership and checksum
#[argh(subcommand, name = "validate")]
struct CmdValidate {
    /// seed phrase or empty for input from stdin
    #[argh(positional)]
    seed: Option<String>,
}

impl CmdValidate {
    fn run(self) -> Result<()> {
        let seed = parse_optional_input(self.seed)?;
        let mnemonic = Mnemonic::parse_phrase(&seed).context("invalid seed phrase")?;

        print_output(serde_json::json!({
            "valid": true,
            "words": mnemonic.word_count().word_count(),
        }));
        Ok(())
    }
}

#[derive(Debug, PartialEq, FromArgs)]
/// Derives keys and address from seed
#[argh(subcommand, name = "derive")]
struct CmdDerive {
    /// seed phrase or empty for input from stdin
    #[argh(positional)]
    seed: Option<String>,

    /// derivation path, configured path by default
    #[argh(option, short = 'p')]
    path: Option<DerivationPath>,

    /// chain id, configured chain by default
    #[argh(option, short = 'c')]
    chain: Option<String>,

    /// encode keys in base64 (hex by default)
    #[argh(switch)]
    base64: bool,
}

impl CmdDerive {
    fn run(self, ctx: CliContext) -> Result<()> {
        let config = ctx.load_config()?;

        let seed = parse_optional_input(self.seed)?;
        let mnemonic = Mnemonic::parse_phrase(&seed).context("invalid seed phrase")?;

        let path = self.path.unwrap_or(config.derivation_path);
        let chain_id = self.chain.unwrap_or(config.chain_id);
        let deriver = KeyDeriver::new(path, &chain_id)?;

        let keypair = deriver.derive(&mnemonic)?;
        let secret = keypair.secret_bytes();

        let encode = |bytes: &[u8]| -> String {
            if self.base64 {
                base64::encode(bytes)
            } else {
                hex::encode(bytes)
            }
        };

        print_output(serde_json::json!({
            "secret": encode(&secret[..]),
            "public": encode(keypair.public_key()),
            "address": keypair.address(),
            "path": deriver.path().as_str(),
            "chain_id": deriver.chain_id(),
        }));
        Ok(())
    }
}
