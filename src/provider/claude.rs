//! Anthropic Messages API backend.

use super::transport::{HttpRequest, HttpTransport};
use super::{
    model_or_default, parse_envelope, require_api_key, require_text, send, EnrichmentProvider,
    ProviderKind, MAX_OUTPUT_TOKENS, TEMPERATURE,
};
use crate::config::{ProviderSettings, CLAUDE_ENV};
use crate::error::WorkerError;
use crate::output::{validate, EnrichmentResult};
use crate::prompt::{build_enrichment_prompt, ResourceSummary};
use crate::schema::PolicyFinding;
use serde::Deserialize;
use serde_json::json;
use std::rc::Rc;

pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";
const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

pub struct ClaudeProvider {
    api_key: String,
    model: String,
    transport: Rc<dyn HttpTransport>,
}

impl ClaudeProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        transport: Rc<dyn HttpTransport>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            transport,
        }
    }

    /// Fails with a configuration error when `WHY_CLAUDE_API_KEY` is unset.
    pub fn from_settings(
        settings: &ProviderSettings,
        transport: Rc<dyn HttpTransport>,
    ) -> Result<Self, WorkerError> {
        let api_key = require_api_key(settings, CLAUDE_ENV)?;
        Ok(Self::new(
            api_key,
            model_or_default(settings, DEFAULT_MODEL),
            transport,
        ))
    }

    fn call_api(&self, prompt: &str) -> Result<String, WorkerError> {
        let request = HttpRequest {
            url: API_URL.to_string(),
            headers: vec![
                ("x-api-key", self.api_key.clone()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
            body: json!({
                "model": self.model,
                "max_tokens": MAX_OUTPUT_TOKENS,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": TEMPERATURE,
            }),
        };
        let body = send(self.transport.as_ref(), self.kind(), &request)?;
        let response: MessagesResponse = parse_envelope(self.kind(), &body)?;
        let block = response.content.into_iter().next().ok_or_else(|| {
            WorkerError::MalformedEnvelope {
                provider: self.kind().label(),
                message: "no content in Claude response".to_string(),
            }
        })?;
        require_text(
            self.kind(),
            block.text,
            "no text in Claude response content block",
        )
    }
}

impl EnrichmentProvider for ClaudeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate_enrichment(
        &self,
        findings: &[PolicyFinding],
        resource: &ResourceSummary,
        locale: &str,
    ) -> Result<EnrichmentResult, WorkerError> {
        if findings.is_empty() {
            return Ok(EnrichmentResult::no_findings());
        }
        let prompt = build_enrichment_prompt(findings, resource, locale);
        let text = self.call_api(&prompt)?;
        validate(&text)
    }
}
