//! Validation of backend text against the enrichment output contract.
//!
//! The contract is structural only: one JSON object with a `summary` key and,
//! if present, a `nextActions` array whose elements all carry `title` and
//! `detail`. `translations` is passed through untouched.

use crate::error::WorkerError;
use crate::schema::{ActionTranslation, NextAction, Translations, ViolationTranslation};
use serde_json::Value;

/// A remediation step as produced by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionText {
    pub title: String,
    pub detail: String,
}

impl From<ActionText> for NextAction {
    fn from(action: ActionText) -> Self {
        NextAction {
            title: action.title,
            detail: action.detail,
            patch: None,
        }
    }
}

impl From<ActionText> for ActionTranslation {
    fn from(action: ActionText) -> Self {
        ActionTranslation {
            title: action.title,
            detail: action.detail,
        }
    }
}

/// Backend output that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub summary: String,
    pub next_actions: Vec<ActionText>,
    pub translations: Option<Value>,
}

impl EnrichmentResult {
    /// Result returned by a backend that was handed no findings.
    pub fn no_findings() -> Self {
        Self {
            summary: "No policy violations found".to_string(),
            next_actions: Vec::new(),
            translations: None,
        }
    }
}

/// Validate backend text and normalize it into an [`EnrichmentResult`].
pub fn validate(text: &str) -> Result<EnrichmentResult, WorkerError> {
    let cleaned = strip_code_fences(text);
    let parsed: Value = serde_json::from_str(cleaned).map_err(|err| {
        WorkerError::InvalidAiOutput(format!("AI response is not valid JSON: {err}"))
    })?;
    let object = parsed.as_object().ok_or_else(|| {
        WorkerError::InvalidAiOutput("AI response must be a JSON object".to_string())
    })?;

    let summary = object
        .get("summary")
        .ok_or_else(|| WorkerError::InvalidAiOutput("AI response missing 'summary'".to_string()))?;

    let next_actions = match object.get("nextActions") {
        None => Vec::new(),
        Some(value) => parse_actions(value, "nextActions")?,
    };

    Ok(EnrichmentResult {
        summary: text_of(summary),
        next_actions,
        translations: object.get("translations").cloned(),
    })
}

/// Interpret a backend `translations` value.
///
/// Returns `Ok(None)` when nothing usable was supplied. A present but
/// malformed value is an error.
pub fn parse_translations(value: &Value) -> Result<Option<Translations>, WorkerError> {
    if value.is_null() {
        return Ok(None);
    }
    let object = value.as_object().ok_or_else(|| {
        WorkerError::InvalidAiOutput("'translations' must be an object".to_string())
    })?;

    let summary = match object.get("summary") {
        None | Some(Value::Null) => None,
        Some(value) => Some(text_of(value)),
    };

    let next_actions = match object.get("nextActions") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => parse_actions(value, "translations.nextActions")?,
    };

    let violations = match object.get("violations") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value::<Vec<ViolationTranslation>>(value.clone())
            .map_err(|err| {
                WorkerError::InvalidAiOutput(format!("invalid 'translations.violations': {err}"))
            })?,
    };

    let translations = Translations {
        summary,
        violations: non_empty(violations),
        next_actions: non_empty(next_actions.into_iter().map(Into::into).collect()),
    };
    if translations.is_empty() {
        return Ok(None);
    }
    Ok(Some(translations))
}

fn parse_actions(value: &Value, label: &str) -> Result<Vec<ActionText>, WorkerError> {
    let items = value
        .as_array()
        .ok_or_else(|| WorkerError::InvalidAiOutput(format!("'{label}' must be a list")))?;
    items
        .iter()
        .map(|item| {
            let title = item.get("title");
            let detail = item.get("detail");
            match (item.is_object(), title, detail) {
                (true, Some(title), Some(detail)) => Ok(ActionText {
                    title: text_of(title),
                    detail: text_of(detail),
                }),
                _ => Err(WorkerError::InvalidAiOutput(format!(
                    "Each entry in '{label}' must have 'title' and 'detail'"
                ))),
            }
        })
        .collect()
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Coerce a JSON value to text: strings verbatim, `null` empty, anything else
/// as compact JSON.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Strip a surrounding Markdown code fence, whatever its language tag, or a
/// bare leading `json` tag.
fn strip_code_fences(raw: &str) -> &str {
    let text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let mut body = match rest.split_once('\n') {
            Some((_, body)) => body,
            None => rest,
        };
        if let Some(end) = body.rfind("```") {
            body = &body[..end];
        }
        return body.trim();
    }
    match text.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => text[4..].trim_start(),
        _ => text,
    }
}
