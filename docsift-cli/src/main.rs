use clap::Parser;

use docsift_core::error::{ConfigError, DocsiftError, InputError, LlmError, OcrError};

use crate::error::CliError;

mod commands;
mod error;

#[derive(Parser, Debug)]
#[command(
    name = "docsift",
    version,
    about = "Extract and validate structured fields from scanned documents"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Classify an error into a process exit code.
///
/// Exit codes:
///   0   success
///   1   general/unknown error
///   2   configuration error (including a missing API key)
///   3   input not found / unsupported format
///   6   LLM API error
///   9   OCR tool missing or failing
///   10  partial success (stage errors with `--strict`)
///
/// The outermost typed error in the chain decides; message text is never
/// inspected, so user-supplied paths cannot change the code.
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CliError>() {
            return e.exit_code();
        }
        if let Some(e) = cause.downcast_ref::<DocsiftError>() {
            return core_exit_code(e);
        }
        if let Some(e) = cause.downcast_ref::<LlmError>() {
            return llm_exit_code(e);
        }
        if let Some(e) = cause.downcast_ref::<OcrError>() {
            return ocr_exit_code(e);
        }
        if cause.is::<ConfigError>() {
            return 2;
        }
        if cause.is::<InputError>() {
            return 3;
        }
    }
    1
}

fn core_exit_code(err: &DocsiftError) -> i32 {
    match err {
        DocsiftError::Config(_) => 2,
        DocsiftError::Input(_) => 3,
        DocsiftError::Llm(e) => llm_exit_code(e),
        DocsiftError::Ocr(e) => ocr_exit_code(e),
        DocsiftError::Extract(_) | DocsiftError::Validate(_) => 6,
    }
}

fn llm_exit_code(err: &LlmError) -> i32 {
    match err {
        LlmError::Config(_) => 2,
        _ => 6,
    }
}

fn ocr_exit_code(err: &OcrError) -> i32 {
    match err {
        OcrError::ImageRead(_) => 3,
        _ => 9,
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    let globals = commands::Globals { quiet: cli.quiet };
    match runtime.block_on(commands::run(cli.command, globals)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
