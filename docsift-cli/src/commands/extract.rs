use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use docsift_core::error::InputError;
use docsift_core::extract::json::to_pretty_json;
use docsift_core::ocr::tesseract::TesseractEngine;
use docsift_core::pipeline::{DocsiftPipeline, PipelineResult};
use docsift_core::progress::{IndicatifReporter, ProgressReporter};

use super::{Globals, LlmArgs};
use crate::error::CliError;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Documents to process (.png, .jpg, .jpeg, .pdf); glob patterns allowed
    #[arg(required = true)]
    pub paths: Vec<String>,

    #[command(flatten)]
    pub llm: LlmArgs,

    /// Skip the validator agent (rule checks still run)
    #[arg(long)]
    pub no_validate: bool,

    /// Print the OCR text of each document to stderr
    #[arg(long)]
    pub show_text: bool,

    /// Write results to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Exit non-zero when any document had a stage error
    #[arg(long)]
    pub strict: bool,

    /// Print full per-document reports instead of the final JSON
    #[arg(long)]
    pub report: bool,
}

/// One element of the array printed for multi-document runs.
#[derive(Serialize)]
struct BatchEntry {
    source: String,
    result: serde_json::Value,
}

/// Expand glob patterns; plain paths pass through untouched so that a
/// missing file is reported per document.
fn expand_paths(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            paths.push(PathBuf::from(pattern));
            continue;
        }
        let mut matched: Vec<PathBuf> = glob::glob(pattern)
            .with_context(|| format!("Invalid glob pattern: {pattern}"))?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        if matched.is_empty() {
            return Err(CliError::NoMatch(pattern.clone()).into());
        }
        matched.sort();
        paths.append(&mut matched);
    }
    Ok(paths)
}

fn render(results: &[PipelineResult], report: bool, single: bool) -> String {
    match (report, single) {
        (true, true) => to_pretty_json(&results[0]),
        (true, false) => to_pretty_json(results),
        (false, true) => to_pretty_json(&results[0].final_output()),
        (false, false) => {
            let entries: Vec<BatchEntry> = results
                .iter()
                .map(|r| BatchEntry {
                    source: r.source.display().to_string(),
                    result: r.final_output(),
                })
                .collect();
            to_pretty_json(&entries)
        }
    }
}

pub async fn run(args: ExtractArgs, globals: Globals) -> anyhow::Result<()> {
    let config = args.llm.load_config()?;
    let paths = expand_paths(&args.paths)?;
    let provider = args.llm.provider(&config)?;
    let engine = Arc::new(TesseractEngine::from_config(&config.ocr));

    let mut pipeline = DocsiftPipeline::new(engine, provider, &config)
        .context("Cannot build pipeline from config")?;
    if args.no_validate {
        pipeline = pipeline.without_validation();
    }
    info!(
        documents = paths.len(),
        provider = %config.llm.provider,
        model = %config.llm.model,
        validate = pipeline.validates(),
        "Starting extraction"
    );

    let progress = Arc::new(if globals.quiet || !std::io::stderr().is_terminal() {
        IndicatifReporter::hidden()
    } else {
        IndicatifReporter::new()
    });

    let single = paths.len() == 1;
    let reporter: Arc<dyn ProgressReporter> = progress.clone();
    let results = Arc::new(pipeline).run_batch(paths, reporter).await;

    for result in &results {
        if args.show_text {
            if let Some(text) = &result.raw_text {
                eprintln!("--- {} ---\n{text}", result.source.display());
            }
        }
        for issue in &result.issues {
            warn!(source = %result.source.display(), "{issue}");
        }
    }

    let rendered = render(&results, args.report, single);
    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{rendered}\n"))
                .with_context(|| format!("Cannot write output: {}", path.display()))?;
            if !globals.quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
        None => println!("{rendered}"),
    }

    let total_cost: f64 = results.iter().map(|r| r.usage.estimated_cost_usd).sum();
    info!(
        failed = progress.failed(),
        cost_usd = total_cost,
        "Extraction finished"
    );

    if results.iter().all(PipelineResult::is_input_error) {
        let first = &results[0];
        let message = first.errors.first().map_or("", |e| e.message.as_str());
        let source = first.source.display().to_string();
        let err = if message == "Unsupported file format!" {
            InputError::UnsupportedFormat(source)
        } else {
            InputError::NotFound(source)
        };
        return Err(err.into());
    }

    let failed = results.iter().filter(|r| !r.is_success()).count();
    if args.strict && failed > 0 {
        return Err(CliError::PartialSuccess {
            failed,
            total: results.len(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_pass_through() {
        let paths = expand_paths(&["missing.png".to_string()]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("missing.png")]);
    }

    #[test]
    fn glob_expands_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.png"), "x").unwrap();
        std::fs::write(tmp.path().join("a.png"), "x").unwrap();
        std::fs::write(tmp.path().join("c.txt"), "x").unwrap();

        let pattern = format!("{}/*.png", tmp.path().display());
        let paths = expand_paths(&[pattern]).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }

    #[test]
    fn empty_glob_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.pdf", tmp.path().display());
        let err = expand_paths(&[pattern]).unwrap_err();
        assert!(err.to_string().contains("No documents matched"));
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::NoMatch(_))
        ));
    }
}
