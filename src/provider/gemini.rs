//! Google Gemini `generateContent` backend.

use super::transport::{HttpRequest, HttpTransport};
use super::{
    model_or_default, parse_envelope, require_api_key, require_text, send, EnrichmentProvider,
    ProviderKind, MAX_OUTPUT_TOKENS, TEMPERATURE,
};
use crate::config::{ProviderSettings, GEMINI_ENV};
use crate::error::WorkerError;
use crate::output::{validate, EnrichmentResult};
use crate::prompt::{build_enrichment_prompt, ResourceSummary};
use crate::schema::PolicyFinding;
use serde::Deserialize;
use serde_json::json;
use std::rc::Rc;

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const TOP_P: f64 = 0.95;

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
}

pub struct GeminiProvider {
    api_key: String,
    model: String,
    transport: Rc<dyn HttpTransport>,
}

impl GeminiProvider {
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

    /// Fails with a configuration error when `WHY_GEMINI_API_KEY` is unset.
    pub fn from_settings(
        settings: &ProviderSettings,
        transport: Rc<dyn HttpTransport>,
    ) -> Result<Self, WorkerError> {
        let api_key = require_api_key(settings, GEMINI_ENV)?;
        Ok(Self::new(
            api_key,
            model_or_default(settings, DEFAULT_MODEL),
            transport,
        ))
    }

    // The key travels in the query string, so the URL must stay out of logs.
    fn endpoint(&self) -> String {
        format!(
            "{API_BASE}/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }

    // Transport errors may quote the request URL.
    fn redact(&self, err: WorkerError) -> WorkerError {
        match err {
            WorkerError::Network { provider, message } if !self.api_key.is_empty() => {
                WorkerError::Network {
                    provider,
                    message: message.replace(&self.api_key, "***"),
                }
            }
            other => other,
        }
    }

    fn call_api(&self, prompt: &str) -> Result<String, WorkerError> {
        let request = HttpRequest {
            url: self.endpoint(),
            headers: Vec::new(),
            body: json!({
                "contents": [{"parts": [{"text": prompt}]}],
                "generationConfig": {
                    "temperature": TEMPERATURE,
                    "maxOutputTokens": MAX_OUTPUT_TOKENS,
                    "topP": TOP_P,
                },
            }),
        };
        let body = send(self.transport.as_ref(), self.kind(), &request)
            .map_err(|err| self.redact(err))?;
        let response: GenerateContentResponse = parse_envelope(self.kind(), &body)?;
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            WorkerError::MalformedEnvelope {
                provider: self.kind().label(),
                message: "no candidates in Gemini response".to_string(),
            }
        })?;
        let text = candidate
            .content
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text);
        require_text(self.kind(), text, "no text in Gemini response")
    }
}

impl EnrichmentProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
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
