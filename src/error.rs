//! Error taxonomy for the enrichment path.
//!
//! Every variant is recoverable: the worker turns each one into a degraded
//! response instead of a failing exit status.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// The request document is malformed or missing required fields.
    #[error("invalid worker request: {0}")]
    Decode(String),

    #[error("Unsupported AI provider: '{name}'. Supported: {supported}")]
    UnsupportedProvider { name: String, supported: String },

    /// A credential or setting required by the selected backend is absent.
    #[error("{0}")]
    Configuration(String),

    /// Connection, DNS, TLS, or timeout failure before an HTTP status arrived.
    #[error("Network error calling {provider}: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} API HTTP {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// The vendor replied 2xx but the envelope did not carry any text.
    #[error("Malformed {provider} response: {message}")]
    MalformedEnvelope {
        provider: &'static str,
        message: String,
    },

    /// The backend's text failed the output contract.
    #[error("{0}")]
    InvalidAiOutput(String),
}

impl WorkerError {
    pub fn missing_env(var: &str) -> Self {
        WorkerError::Configuration(format!("{var} environment variable not set"))
    }

    /// Short stable label for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Decode(_) => "decode",
            WorkerError::UnsupportedProvider { .. } => "unsupported_provider",
            WorkerError::Configuration(_) => "configuration",
            WorkerError::Network { .. } => "network",
            WorkerError::Api { .. } => "api",
            WorkerError::MalformedEnvelope { .. } => "malformed_envelope",
            WorkerError::InvalidAiOutput(_) => "invalid_ai_output",
        }
    }
}
