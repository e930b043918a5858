pub mod extract;
pub mod init;
pub mod ocr;
pub mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Subcommand};

use docsift_core::config::DocsiftConfig;
use docsift_core::llm::LlmProvider;
use docsift_core::llm::providers::provider_from_config;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run OCR, extraction, and validation over one or more documents
    Extract(extract::ExtractArgs),
    /// Print the OCR text of a document (no LLM calls)
    Ocr(ocr::OcrArgs),
    /// Write a default docsift.toml
    Init(init::InitArgs),
    /// Start MCP server for AI agent integration
    Serve(serve::ServeArgs),
}

/// Options that apply to every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Globals {
    pub quiet: bool,
}

pub async fn run(cmd: Command, globals: Globals) -> anyhow::Result<()> {
    match cmd {
        Command::Extract(args) => extract::run(args, globals).await,
        Command::Ocr(args) => ocr::run(args).await,
        Command::Init(args) => init::run(args, globals).await,
        Command::Serve(args) => serve::run(args).await,
    }
}

/// Config and LLM flags shared by commands that talk to a model.
#[derive(Args, Debug, Clone, Default)]
pub struct LlmArgs {
    /// Config file (default: ./docsift.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// API key (default: the variable named by llm.api_key_env)
    #[arg(long, env = "DOCSIFT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// LLM provider: gemini, anthropic, openai, custom
    #[arg(long)]
    pub provider: Option<String>,

    /// Model identifier
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL for the provider API
    #[arg(long)]
    pub base_url: Option<String>,
}

impl LlmArgs {
    /// Discover the config file and apply flag overrides.
    pub fn load_config(&self) -> anyhow::Result<DocsiftConfig> {
        let cwd = std::env::current_dir().context("Cannot determine current directory")?;
        let mut config = DocsiftConfig::discover(self.config.as_deref(), &cwd)
            .context("Cannot load config")?;
        if let Some(provider) = &self.provider {
            config.llm.provider.clone_from(provider);
        }
        if let Some(model) = &self.model {
            config.llm.model.clone_from(model);
        }
        if let Some(base_url) = &self.base_url {
            config.llm.base_url = Some(base_url.clone());
        }
        Ok(config)
    }

    /// Build the configured provider, failing before any network call when
    /// no API key is available.
    pub fn provider(&self, config: &DocsiftConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
        let api_key = config.llm.resolve_api_key(self.api_key.as_deref())?;
        let provider = provider_from_config(&config.llm, &api_key)
            .with_context(|| format!("Cannot create LLM provider {}", config.llm.provider))?;
        Ok(Arc::from(provider))
    }
}
