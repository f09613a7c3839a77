//! Deterministic prompt assembly for AI enrichment.
//!
//! The prompt is a pure function of (findings, resource, locale). Findings and
//! resource are rendered as canonical JSON: object keys sorted, findings
//! ordered by descending severity then canonical text, evidence ordered by
//! canonical text. Set-equal inputs therefore produce byte-identical prompts.

use crate::schema::{Evidence, PolicyFinding, ResourceRef};
use serde::Serialize;
use serde_json::{Map, Value};

const OUTPUT_FORMAT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/output_format.md"
));
const OUTPUT_FORMAT_TRANSLATED: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/output_format_translated.md"
));
const EXAMPLE_KO: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/example_ko.md"
));

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("en", "English"),
    ("ko", "Korean"),
    ("ja", "Japanese"),
    ("zh", "Chinese"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
];

const FALLBACK_LANGUAGE: &str = "English";

/// Identifiers that must survive translation untouched.
const PROTECTED_IDENTIFIERS: &[&str] = &[
    "CVE IDs (e.g., CVE-2024-1234)",
    "Kubernetes field paths (e.g., spec.containers[0].securityContext)",
    "JSONPath expressions",
    "Image references (e.g., nginx:latest, alpine@sha256:...)",
    "Policy IDs",
    "File paths",
    "Resource names/namespaces/kinds",
    "Version numbers",
    "Command names",
];

/// The slice of a resource reference that is sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSummary {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl From<&ResourceRef> for ResourceSummary {
    fn from(resource: &ResourceRef) -> Self {
        Self {
            kind: resource.kind.clone(),
            name: resource.name.clone(),
            namespace: resource.namespace.clone(),
        }
    }
}

/// Map a locale to the language label used in the prompt.
///
/// Unknown locales map to English, which also turns translation framing off.
pub fn language_name(locale: &str) -> &'static str {
    LANGUAGE_NAMES
        .iter()
        .find(|(code, _)| *code == locale)
        .map(|(_, name)| *name)
        .unwrap_or(FALLBACK_LANGUAGE)
}

/// Whether the prompt asks the backend for a `translations` object.
pub fn wants_translation(locale: &str) -> bool {
    language_name(locale) != FALLBACK_LANGUAGE
}

/// Build the enrichment prompt.
pub fn build_enrichment_prompt(
    findings: &[PolicyFinding],
    resource: &ResourceSummary,
    locale: &str,
) -> String {
    let target_language = language_name(locale);
    let translate = wants_translation(locale);

    let mut prompt = String::new();
    prompt.push_str("You are analyzing Kubernetes security policy violations for a resource.\n\n");

    prompt.push_str("RESOURCE:\n");
    prompt.push_str(&format!("{:#}\n\n", canonical_resource(resource)));

    prompt.push_str("POLICY FINDINGS:\n");
    prompt.push_str(&format!("{:#}\n\n", canonical_findings(findings)));

    prompt.push_str("YOUR TASK:\n");
    prompt.push_str("Generate a concise summary and actionable next steps for a developer.\n");
    if translate {
        prompt.push_str(&format!(
            "Also translate the summary and next steps into {target_language} \
             (locale '{locale}').\n"
        ));
    }
    prompt.push('\n');

    prompt.push_str("OUTPUT FORMAT (valid JSON only):\n");
    if translate {
        prompt.push_str(&OUTPUT_FORMAT_TRANSLATED.replace("{target_language}", target_language));
    } else {
        prompt.push_str(OUTPUT_FORMAT);
    }
    prompt.push('\n');

    prompt.push_str("CRITICAL RULES:\n");
    prompt.push_str(&render_rules(translate));
    prompt.push('\n');

    prompt.push_str(EXAMPLE_KO);
    prompt.push('\n');
    prompt.push_str("Generate the JSON response now:");
    prompt
}

fn render_rules(translate: bool) -> String {
    let mut identifiers = String::from("DO NOT translate or modify technical identifiers:");
    for identifier in PROTECTED_IDENTIFIERS {
        identifiers.push_str(&format!("\n   - {identifier}"));
    }

    let mut rules = vec![
        identifiers,
        "ONLY translate human-readable sentences and explanations".to_string(),
    ];
    if translate {
        rules.push(String::from(
            "translations.summary and translations.nextActions must mirror summary and \
             nextActions, in the same order",
        ));
    }
    rules.push("Provide 3-6 nextActions prioritized by impact (most critical first)".to_string());
    rules.push("Keep summary developer-friendly, not verbose".to_string());
    rules.push("Each action must be concrete and actionable".to_string());

    rules
        .iter()
        .enumerate()
        .map(|(idx, rule)| format!("{}. {rule}\n", idx + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn canonical_resource(resource: &ResourceSummary) -> Value {
    let mut map = Map::new();
    map.insert("kind".to_string(), Value::from(resource.kind.as_str()));
    map.insert("name".to_string(), Value::from(resource.name.as_str()));
    map.insert(
        "namespace".to_string(),
        Value::from(resource.namespace.as_str()),
    );
    Value::Object(map)
}

/// Render findings as a canonical JSON array (suggested fixes are not sent).
pub fn canonical_findings(findings: &[PolicyFinding]) -> Value {
    let mut entries: Vec<(&PolicyFinding, String, Value)> = findings
        .iter()
        .map(|finding| {
            let value = finding_value(finding);
            (finding, value.to_string(), value)
        })
        .collect();
    entries.sort_by(|a, b| b.0.severity.cmp(&a.0.severity).then_with(|| a.1.cmp(&b.1)));
    Value::Array(entries.into_iter().map(|(_, _, value)| value).collect())
}

fn finding_value(finding: &PolicyFinding) -> Value {
    let mut evidence: Vec<(String, Value)> = finding
        .evidence
        .iter()
        .map(|item| {
            let value = evidence_value(item);
            (value.to_string(), value)
        })
        .collect();
    evidence.sort_by(|a, b| a.0.cmp(&b.0));

    let mut map = Map::new();
    map.insert(
        "policyId".to_string(),
        Value::from(finding.policy_id.as_str()),
    );
    map.insert("title".to_string(), Value::from(finding.title.as_str()));
    map.insert(
        "severity".to_string(),
        Value::from(finding.severity.as_str()),
    );
    map.insert("message".to_string(), Value::from(finding.message.as_str()));
    map.insert(
        "evidence".to_string(),
        Value::Array(evidence.into_iter().map(|(_, value)| value).collect()),
    );
    Value::Object(map)
}

fn evidence_value(evidence: &Evidence) -> Value {
    let mut map = Map::new();
    map.insert(
        "type".to_string(),
        Value::from(evidence.evidence_type.as_str()),
    );
    map.insert(
        "subject".to_string(),
        Value::from(evidence.subject.as_str()),
    );
    map.insert("detail".to_string(), Value::from(evidence.detail.as_str()));
    if let Some(raw) = &evidence.raw {
        map.insert("raw".to_string(), raw.clone());
    }
    Value::Object(map)
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
