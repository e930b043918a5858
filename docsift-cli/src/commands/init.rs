use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use docsift_core::config::{CONFIG_FILE_NAME, DocsiftConfig};

use super::Globals;
use crate::error::CliError;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to write docsift.toml into (default: current directory)
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Overwrite an existing docsift.toml
    #[arg(long)]
    pub force: bool,
}

#[allow(clippy::unused_async)]
pub async fn run(args: InitArgs, globals: Globals) -> anyhow::Result<()> {
    if !args.dir.is_dir() {
        anyhow::bail!("Cannot resolve path: {}", args.dir.display());
    }
    let path = args.dir.join(CONFIG_FILE_NAME);
    if path.exists() && !args.force {
        return Err(CliError::ConfigExists(path).into());
    }

    let text = DocsiftConfig::default()
        .to_toml()
        .context("Cannot serialize default config")?;
    std::fs::write(&path, text)
        .with_context(|| format!("Cannot write config: {}", path.display()))?;

    if !globals.quiet {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
