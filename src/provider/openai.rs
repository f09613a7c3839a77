//! OpenAI chat completions backend.

use super::transport::{HttpRequest, HttpTransport};
use super::{
    model_or_default, parse_envelope, require_api_key, require_text, send, EnrichmentProvider,
    ProviderKind, MAX_OUTPUT_TOKENS, TEMPERATURE,
};
use crate::config::{ProviderSettings, OPENAI_ENV};
use crate::error::WorkerError;
use crate::output::{validate, EnrichmentResult};
use crate::prompt::{build_enrichment_prompt, ResourceSummary};
use crate::schema::PolicyFinding;
use serde::Deserialize;
use serde_json::json;
use std::rc::Rc;

pub const DEFAULT_MODEL: &str = "gpt-4o";
const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const SYSTEM_PROMPT: &str = "You are a Kubernetes security expert. Respond only with valid JSON.";

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    transport: Rc<dyn HttpTransport>,
}

impl OpenAiProvider {
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

    /// Fails with a configuration error when `WHY_AI_API_KEY` is unset.
    pub fn from_settings(
        settings: &ProviderSettings,
        transport: Rc<dyn HttpTransport>,
    ) -> Result<Self, WorkerError> {
        let api_key = require_api_key(settings, OPENAI_ENV)?;
        Ok(Self::new(
            api_key,
            model_or_default(settings, DEFAULT_MODEL),
            transport,
        ))
    }

    fn call_api(&self, prompt: &str) -> Result<String, WorkerError> {
        let request = HttpRequest {
            url: API_URL.to_string(),
            headers: vec![("Authorization", format!("Bearer {}", self.api_key))],
            body: json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": prompt},
                ],
                "temperature": TEMPERATURE,
                "max_tokens": MAX_OUTPUT_TOKENS,
            }),
        };
        let body = send(self.transport.as_ref(), self.kind(), &request)?;
        let completion: ChatCompletion = parse_envelope(self.kind(), &body)?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content);
        require_text(
            self.kind(),
            content,
            "no message content in OpenAI response",
        )
    }
}

impl EnrichmentProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
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
