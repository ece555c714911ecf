use thiserror::Error;

/// Problems detected before any network activity starts. These are the only
/// errors that stop a run.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unknown source `{0}`")]
    UnknownSource(String),

    #[error("unknown category `{0}`")]
    UnknownCategory(String),

    #[error("malformed scrape request: {0}")]
    MalformedRequest(String),

    #[error("invalid selector `{selector}` in {source_name} adapter")]
    InvalidSelector {
        source_name: String,
        selector: String,
    },

    #[error("invalid pattern `{pattern}` in {source_name} adapter")]
    InvalidPattern {
        source_name: String,
        pattern: String,
        #[source]
        cause: regex::Error,
    },

    #[error("invalid url template `{template}` in {source_name} adapter")]
    InvalidUrlTemplate {
        source_name: String,
        template: String,
    },

    #[error("failed to read adapter override {path}")]
    AdapterOverride {
        path: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error(transparent)]
    Settings(#[from] config::ConfigError),
}

/// Failure reported by a transport for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection refused or dropped: {0}")]
    ConnectionRefused(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),
}
