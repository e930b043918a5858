use std::path::PathBuf;

/// Failures raised by the CLI itself rather than by `docsift-core`.
#[derive(thiserror::Error, Debug)]
pub enum CliError {
    /// A glob pattern expanded to no files.
    #[error("No documents matched pattern: {0}")]
    NoMatch(String),

    /// `init` would overwrite an existing config file.
    #[error("Config already exists: {} (use --force to overwrite)", .0.display())]
    ConfigExists(PathBuf),

    /// `--strict` was given and some documents had stage errors.
    #[error("Partial success: {failed} of {total} documents had errors")]
    PartialSuccess {
        /// Documents with at least one stage error.
        failed: usize,
        /// Documents processed.
        total: usize,
    },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoMatch(_) => 3,
            Self::ConfigExists(_) => 2,
            Self::PartialSuccess { .. } => 10,
        }
    }
}
