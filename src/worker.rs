//! Request orchestration: decode, decide, enrich, and always respond.
//!
//! Every request ends in exactly one of three outcomes. Requests without
//! findings are skipped (no `decisionAdditions`). Successful enrichment carries
//! the validated backend output. Any failure on the way produces a degraded
//! response whose summary starts with [`UNAVAILABLE_PREFIX`].

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::output::{parse_translations, EnrichmentResult};
use crate::prompt::ResourceSummary;
use crate::provider::{resolve_provider, ProviderFactory};
use crate::schema::{self, DecisionAdditions, NextAction, RequestIds, WorkerResponse};
use serde_json::Value;

pub const UNAVAILABLE_PREFIX: &str = "AI enrichment unavailable: ";
pub const FALLBACK_ACTION_TITLE: &str = "Review findings manually";
pub const FALLBACK_ACTION_DETAIL: &str =
    "AI enrichment failed. Please review the policy findings directly.";
const MAX_ERROR_CHARS: usize = 200;
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Enriched,
    Degraded,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Skipped => "skipped",
            Outcome::Enriched => "enriched",
            Outcome::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub response: WorkerResponse,
    pub outcome: Outcome,
}

pub struct Worker<'a> {
    config: &'a WorkerConfig,
    factory: &'a dyn ProviderFactory,
}

impl<'a> Worker<'a> {
    pub fn new(config: &'a WorkerConfig, factory: &'a dyn ProviderFactory) -> Self {
        Self { config, factory }
    }

    /// Turn one raw request document into one response. Never fails.
    pub fn process(&self, input: &str) -> Processed {
        let value: Value = match serde_json::from_str(input) {
            Ok(value) => value,
            Err(err) => {
                let err = WorkerError::Decode(format!("request is not valid JSON: {err}"));
                return degraded(RequestIds::default(), &err);
            }
        };
        let ids = RequestIds::from_value(&value);
        tracing::info!(
            request_id = %ids.request_id,
            version = %ids.version,
            "processing request"
        );

        match self.enrich(value) {
            Ok(Some(additions)) => Processed {
                response: WorkerResponse::new(ids.version, ids.request_id, Some(additions)),
                outcome: Outcome::Enriched,
            },
            Ok(None) => Processed {
                response: WorkerResponse::new(ids.version, ids.request_id, None),
                outcome: Outcome::Skipped,
            },
            Err(err) => degraded(ids, &err),
        }
    }

    fn enrich(&self, value: Value) -> Result<Option<DecisionAdditions>, WorkerError> {
        let request = schema::decode_value(value)?;
        let findings = request.findings();
        if findings.is_empty() {
            tracing::info!("no policy findings, skipping AI enrichment");
            return Ok(None);
        }

        let locale = request.locale();
        let kind = resolve_provider(request.provider.as_deref(), self.config)?;
        let provider = self.factory.create(kind, self.config)?;
        tracing::info!(
            provider = kind.as_str(),
            model = provider.model(),
            "AI: provider={} model={}",
            kind,
            provider.model()
        );

        let resource = ResourceSummary::from(&request.input.resource);
        let result = provider.generate_enrichment(findings, &resource, locale)?;
        tracing::info!(
            next_actions = result.next_actions.len(),
            "AI: enrichment succeeded"
        );
        Ok(Some(build_additions(result, locale)))
    }
}

/// Map a validated backend result onto the response schema.
///
/// Translations are consulted only for non-English locales. A malformed
/// `translations` value is dropped rather than failing the enrichment.
pub fn build_additions(result: EnrichmentResult, locale: &str) -> DecisionAdditions {
    let next_actions: Vec<NextAction> = result.next_actions.into_iter().map(Into::into).collect();
    let translations = match result.translations {
        Some(value) if locale != "en" => parse_translations(&value).unwrap_or_else(|err| {
            tracing::warn!(locale, error = %err, "discarding unusable translations");
            None
        }),
        _ => None,
    };
    DecisionAdditions {
        summary: Some(result.summary),
        violations: None,
        next_actions: if next_actions.is_empty() {
            None
        } else {
            Some(next_actions)
        },
        translations,
    }
}

/// Build the degraded response for `err`, echoing `ids`.
pub fn degraded(ids: RequestIds, err: &WorkerError) -> Processed {
    tracing::warn!(
        kind = err.kind(),
        request_id = %ids.request_id,
        "Error: {err}"
    );
    Processed {
        response: WorkerResponse::new(
            ids.version,
            ids.request_id,
            Some(degraded_additions(&err.to_string())),
        ),
        outcome: Outcome::Degraded,
    }
}

pub fn degraded_additions(message: &str) -> DecisionAdditions {
    DecisionAdditions {
        summary: Some(format!("{UNAVAILABLE_PREFIX}{}", truncate_message(message))),
        violations: None,
        next_actions: Some(vec![NextAction {
            title: FALLBACK_ACTION_TITLE.to_string(),
            detail: FALLBACK_ACTION_DETAIL.to_string(),
            patch: None,
        }]),
        translations: None,
    }
}

/// Keep at most 200 characters, marking the cut with an ellipsis.
fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_CHARS {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(MAX_ERROR_CHARS).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
