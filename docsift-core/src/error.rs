/// Top-level docsift error type.
///
/// All fallible operations in `docsift-core` return [`Result<T, DocsiftError>`](Result).
/// Each variant wraps a stage-specific error enum, allowing callers to
/// match on the error source without losing type information.
#[derive(thiserror::Error, Debug)]
pub enum DocsiftError {
    /// Error while turning a document into raw text.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Error while turning raw text into a structured record.
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Error from the validator agent.
    #[error("Validation error: {0}")]
    Validate(#[from] ValidateError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error communicating with an LLM provider.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// The input document itself cannot be processed.
    #[error("Input error: {0}")]
    Input(#[from] InputError),
}

/// Errors about the input file before any stage runs.
#[derive(thiserror::Error, Debug)]
pub enum InputError {
    /// The path does not exist.
    #[error("File not found: {0}")]
    NotFound(String),

    /// The extension is not one of the supported image or PDF types.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Errors from the OCR stage (image loading, tesseract, pdftoppm).
#[derive(thiserror::Error, Debug)]
pub enum OcrError {
    /// The image could not be opened or decoded.
    #[error("Image file not found or cannot be read: {0}")]
    ImageRead(String),

    /// PDF rasterization or per-page recognition failed.
    #[error("Error extracting text from PDF: {0}")]
    Pdf(String),

    /// An external OCR tool is not installed or not on `PATH`.
    #[error("OCR tool not available: {0}")]
    ToolMissing(String),

    /// An external tool ran but exited unsuccessfully.
    #[error("{tool} failed (exit {code:?}): {stderr}")]
    ToolFailed {
        /// Binary that failed.
        tool: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// Filesystem I/O error while staging images.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from structured extraction.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// The model answered with nothing.
    #[error("{provider} API returned an empty response")]
    EmptyResponse {
        /// Display name of the provider (e.g. "Gemini").
        provider: String,
    },

    /// No `{ ... }` block was found in the response.
    #[error("{provider} API returned invalid JSON format")]
    NoJson {
        /// Display name of the provider.
        provider: String,
    },

    /// A `{ ... }` block was found but did not parse as a JSON object.
    #[error("{provider} API returned malformed JSON")]
    MalformedJson {
        /// Display name of the provider.
        provider: String,
    },
}

/// Errors from the validator agent conversation.
#[derive(thiserror::Error, Debug)]
pub enum ValidateError {
    /// The assistant never produced a non-empty reply.
    #[error("Assistant did not return a valid JSON response.")]
    NoReply,

    /// The conversation itself failed (provider or network error).
    #[error("Validation failed: {0}")]
    Failed(String),

    /// The assistant replied, but not with a JSON object.
    #[error("Invalid JSON response: {message}")]
    InvalidJson {
        /// Parser message.
        message: String,
        /// The assistant's reply verbatim.
        raw_response: String,
    },
}

impl ValidateError {
    /// Raw assistant reply, when the failure carries one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::InvalidJson { raw_response, .. } => Some(raw_response),
            Self::NoReply | Self::Failed(_) => None,
        }
    }
}

/// Errors in docsift configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors from LLM provider interactions.
#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    /// Network-level failure connecting to the LLM provider.
    #[error("Network error: {0}")]
    Network(String),

    /// LLM API returned a non-success HTTP status.
    #[error("API error (HTTP {status}): {body}")]
    ApiError {
        /// HTTP status code from the provider.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// LLM response could not be parsed into the expected format.
    #[error("Response parse error: {0}")]
    Parse(String),

    /// LLM configuration is missing or invalid (API key, model, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cumulative LLM cost has exceeded the configured budget.
    #[error("Cost budget exceeded: {0}")]
    BudgetExceeded(String),
}

/// Convenience alias for `Result<T, DocsiftError>`.
pub type Result<T> = std::result::Result<T, DocsiftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_messages_match_output_format() {
        let err = ExtractError::EmptyResponse {
            provider: "Gemini".into(),
        };
        assert_eq!(err.to_string(), "Gemini API returned an empty response");

        let err = ExtractError::MalformedJson {
            provider: "Gemini".into(),
        };
        assert_eq!(err.to_string(), "Gemini API returned malformed JSON");
    }

    #[test]
    fn validate_error_raw_response() {
        let err = ValidateError::InvalidJson {
            message: "expected value at line 1 column 1".into(),
            raw_response: "Looks good to me".into(),
        };
        assert_eq!(err.raw_response(), Some("Looks good to me"));
        assert!(err.to_string().starts_with("Invalid JSON response:"));
        assert_eq!(ValidateError::NoReply.raw_response(), None);
    }
}
