//! Error types for the composer.
//!
//! `ComposerError` is the taxonomy surfaced to callers of [`crate::Composer`].
//! Lower layers (the HTTP client, token stores, config loading) have their own
//! errors which the composer maps depending on which step failed.

use miette::Diagnostic;

use crate::types::Field;

/// Main error type for composer operations.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ComposerError {
    /// A required field is missing. Recovered locally with an inline message.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    /// Reading, fetching or encoding an image failed.
    #[error("image processing failed: {0}")]
    #[diagnostic(code(composer::image))]
    ImageProcessing(String),

    /// The board endpoint answered with a non-success status.
    #[error("submission rejected with status {status}")]
    #[diagnostic(code(composer::submission))]
    Submission {
        status: u16,
        body: serde_json::Value,
    },

    /// The request never produced a response.
    #[error("network error: {0}")]
    #[diagnostic(code(composer::network))]
    Network(String),

    /// The operation is not allowed in the composer's current state.
    #[error("cannot {action} while {state}")]
    #[diagnostic(code(composer::state))]
    InvalidState {
        action: &'static str,
        state: crate::types::ComposerState,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    /// Token storage failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Auth(#[from] AuthError),
}

/// One or more required fields were empty at submit time.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("missing required fields: {}", fields_list(.missing))]
#[diagnostic(
    code(composer::validation),
    help("fill in the title, the body and choose a category")
)]
pub struct ValidationError {
    pub missing: Vec<Field>,
}

fn fields_list(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from the board REST client.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ApiError {
    /// Non-2xx response. The body is the server's JSON payload, or a string
    /// when it was not JSON.
    #[error("server responded with {status}")]
    #[diagnostic(code(composer::api::status))]
    Status {
        status: u16,
        body: serde_json::Value,
    },

    /// Connection, TLS or protocol failure.
    #[error("transport error: {0}")]
    #[diagnostic(code(composer::api::transport))]
    Transport(#[from] reqwest::Error),

    /// The response arrived but could not be interpreted.
    #[error("unexpected response: {0}")]
    #[diagnostic(code(composer::api::decode))]
    Decode(String),
}

/// Errors from loading or saving configuration.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    #[diagnostic(code(composer::config::io))]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    #[diagnostic(code(composer::config::parse))]
    Parse(#[from] serde_json::Error),

    #[error("unsupported config format: {0}")]
    #[diagnostic(
        code(composer::config::format),
        help("config files must have a .json extension")
    )]
    UnsupportedFormat(String),

    #[error("invalid value {value:?} for {key}")]
    #[diagnostic(code(composer::config::value))]
    InvalidValue { key: &'static str, value: String },
}

/// Errors from token storage.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum AuthError {
    #[error("token storage error: {0}")]
    #[diagnostic(code(composer::auth::io))]
    Io(#[from] std::io::Error),

    #[error("corrupt token storage: {0}")]
    #[diagnostic(code(composer::auth::serde))]
    Serde(#[from] serde_json::Error),
}
