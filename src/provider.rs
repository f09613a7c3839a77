//! Interchangeable AI backends behind a single enrichment capability.
//!
//! A backend is selected by name at startup. The name comes from the request,
//! then the `WHY_AI_PROVIDER` override, then the `openai` default. Each backend
//! reads its credential once, at construction, from [`WorkerConfig`].

pub mod claude;
pub mod gemini;
pub mod openai;
pub mod transport;

use crate::config::{ProviderEnv, ProviderSettings, WorkerConfig, DEFAULT_PROVIDER};
use crate::error::WorkerError;
use crate::output::EnrichmentResult;
use crate::prompt::ResourceSummary;
use crate::schema::PolicyFinding;
use serde::de::DeserializeOwned;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Instant;
use transport::{HttpRequest, HttpTransport, UreqTransport};

/// Upper bound on generated tokens per call.
pub const MAX_OUTPUT_TOKENS: u32 = 1000;
/// Low sampling temperature to keep output close to deterministic.
pub const TEMPERATURE: f64 = 0.3;

/// The enrichment capability every backend implements.
pub trait EnrichmentProvider {
    fn kind(&self) -> ProviderKind;

    /// Model identifier sent to the vendor.
    fn model(&self) -> &str;

    fn generate_enrichment(
        &self,
        findings: &[PolicyFinding],
        resource: &ResourceSummary,
        locale: &str,
    ) -> Result<EnrichmentResult, WorkerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Claude,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::OpenAi,
        ProviderKind::Gemini,
        ProviderKind::Claude,
    ];

    /// Stable name used in requests and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Claude => "claude",
        }
    }

    /// Vendor label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Claude => "Claude",
        }
    }

    pub fn supported_names() -> String {
        Self::ALL
            .iter()
            .map(ProviderKind::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = WorkerError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let normalized = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| WorkerError::UnsupportedProvider {
                name: name.to_string(),
                supported: Self::supported_names(),
            })
    }
}

/// Pick the backend name: request field, then env override, then the default.
/// Blank names fall through to the next source.
pub fn resolve_provider_name<'a>(requested: Option<&'a str>, config: &'a WorkerConfig) -> &'a str {
    requested
        .filter(|name| !name.trim().is_empty())
        .or(config.provider_override.as_deref())
        .unwrap_or(DEFAULT_PROVIDER)
}

pub fn resolve_provider(
    requested: Option<&str>,
    config: &WorkerConfig,
) -> Result<ProviderKind, WorkerError> {
    resolve_provider_name(requested, config).parse()
}

/// Constructs backends; the orchestrator only talks to this seam.
pub trait ProviderFactory {
    fn create(
        &self,
        kind: ProviderKind,
        config: &WorkerConfig,
    ) -> Result<Box<dyn EnrichmentProvider>, WorkerError>;
}

/// Factory for the real backends, each talking HTTP through `ureq`.
#[derive(Debug, Default)]
pub struct HttpProviderFactory;

impl ProviderFactory for HttpProviderFactory {
    fn create(
        &self,
        kind: ProviderKind,
        config: &WorkerConfig,
    ) -> Result<Box<dyn EnrichmentProvider>, WorkerError> {
        let transport: Rc<dyn HttpTransport> = Rc::new(UreqTransport::new(config.timeout));
        create_provider(kind, config, transport)
    }
}

/// Build the backend for `kind` on top of the given transport.
pub fn create_provider(
    kind: ProviderKind,
    config: &WorkerConfig,
    transport: Rc<dyn HttpTransport>,
) -> Result<Box<dyn EnrichmentProvider>, WorkerError> {
    let provider: Box<dyn EnrichmentProvider> = match kind {
        ProviderKind::OpenAi => Box::new(openai::OpenAiProvider::from_settings(
            &config.openai,
            transport,
        )?),
        ProviderKind::Gemini => Box::new(gemini::GeminiProvider::from_settings(
            &config.gemini,
            transport,
        )?),
        ProviderKind::Claude => Box::new(claude::ClaudeProvider::from_settings(
            &config.claude,
            transport,
        )?),
    };
    Ok(provider)
}

fn require_api_key(settings: &ProviderSettings, env: ProviderEnv) -> Result<String, WorkerError> {
    settings
        .api_key
        .clone()
        .ok_or_else(|| WorkerError::missing_env(env.api_key))
}

fn model_or_default(settings: &ProviderSettings, default_model: &str) -> String {
    settings
        .model
        .clone()
        .unwrap_or_else(|| default_model.to_string())
}

/// POST a request and return the body of a 2xx reply.
fn send(
    transport: &dyn HttpTransport,
    kind: ProviderKind,
    request: &HttpRequest,
) -> Result<String, WorkerError> {
    let start = Instant::now();
    let reply = transport
        .post_json(request)
        .map_err(|err| WorkerError::Network {
            provider: kind.label(),
            message: err.to_string(),
        })?;
    tracing::info!(
        provider = kind.as_str(),
        status = reply.status,
        elapsed_ms = start.elapsed().as_millis() as u64,
        response_bytes = reply.body.len(),
        "ai call complete"
    );
    if !reply.is_success() {
        return Err(WorkerError::Api {
            provider: kind.label(),
            status: reply.status,
            body: reply.body,
        });
    }
    Ok(reply.body)
}

fn parse_envelope<T: DeserializeOwned>(kind: ProviderKind, body: &str) -> Result<T, WorkerError> {
    serde_json::from_str(body).map_err(|err| WorkerError::MalformedEnvelope {
        provider: kind.label(),
        message: format!("response body is not the expected JSON: {err}"),
    })
}

fn require_text(
    kind: ProviderKind,
    text: Option<String>,
    missing: &str,
) -> Result<String, WorkerError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(WorkerError::MalformedEnvelope {
            provider: kind.label(),
            message: missing.to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
