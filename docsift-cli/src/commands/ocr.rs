use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use docsift_core::config::DocsiftConfig;
use docsift_core::ocr::tesseract::TesseractEngine;
use docsift_core::pipeline::ocr_document;

#[derive(Args, Debug)]
pub struct OcrArgs {
    /// Document to read (.png, .jpg, .jpeg, .pdf)
    pub path: PathBuf,

    /// Config file (default: ./docsift.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Tesseract language code(s), e.g. `eng` or `eng+hin`
    #[arg(long)]
    pub language: Option<String>,
}

pub async fn run(args: OcrArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("Cannot determine current directory")?;
    let mut config =
        DocsiftConfig::discover(args.config.as_deref(), &cwd).context("Cannot load config")?;
    if let Some(language) = args.language {
        config.ocr.language = language;
    }

    let engine = TesseractEngine::from_config(&config.ocr);
    let text = ocr_document(&engine, &args.path).await?;
    println!("{text}");
    Ok(())
}
