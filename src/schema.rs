//! Schema types for worker requests and responses.
//!
//! Decoding is tolerant: unknown fields are ignored and missing optionals
//! default to absent. Encoding never emits `null`; absent optionals are
//! omitted from the document entirely.

use crate::error::WorkerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Version echoed when the request document could not be read at all.
pub const DEFAULT_VERSION: &str = "v1alpha1";
/// Request id echoed when the request document could not be read at all.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Finding severity. Literals outside the known four are kept verbatim and
/// rank below `LOW`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "CRITICAL")]
    Critical,
    #[serde(untagged)]
    Unknown(String),
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
            Severity::Unknown(literal) => literal,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Severity::Unknown(_) => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.as_str().cmp(other.as_str()))
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence source. Types the worker does not know are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceType {
    #[serde(rename = "K8S_FIELD")]
    K8sField,
    #[serde(rename = "IMAGE_SCAN")]
    ImageScan,
    #[serde(rename = "SBOM")]
    Sbom,
    #[serde(rename = "POLICY")]
    Policy,
    #[serde(rename = "OTHER")]
    Other,
    #[serde(untagged)]
    Unknown(String),
}

impl EvidenceType {
    pub fn as_str(&self) -> &str {
        match self {
            EvidenceType::K8sField => "K8S_FIELD",
            EvidenceType::ImageScan => "IMAGE_SCAN",
            EvidenceType::Sbom => "SBOM",
            EvidenceType::Policy => "POLICY",
            EvidenceType::Other => "OTHER",
            EvidenceType::Unknown(literal) => literal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(rename = "type")]
    pub evidence_type: EvidenceType,
    pub subject: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSuggestion {
    pub format: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    pub title: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<PatchSuggestion>,
}

/// A single policy violation detected against the resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyFinding {
    pub policy_id: String,
    pub title: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub suggested_fixes: Vec<Fix>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequestInput {
    pub resource: ResourceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_refs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_findings: Option<Vec<PolicyFinding>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_context: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    pub version: String,
    pub request_id: String,
    pub input: WorkerRequestInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl WorkerRequest {
    /// Findings to enrich; an empty list is treated the same as an absent one.
    pub fn findings(&self) -> &[PolicyFinding] {
        self.input.policy_findings.as_deref().unwrap_or(&[])
    }

    /// Requested locale, defaulting to `en` when absent or blank.
    pub fn locale(&self) -> &str {
        match self.locale.as_deref().map(str::trim) {
            Some(locale) if !locale.is_empty() => locale,
            _ => "en",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationTranslation {
    pub policy_id: String,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTranslation {
    pub title: String,
    pub detail: String,
}

/// Localized copies of the enrichment text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<ViolationTranslation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_actions: Option<Vec<ActionTranslation>>,
}

impl Translations {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.violations.is_none() && self.next_actions.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub policy_id: String,
    pub title: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<Evidence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<Vec<Fix>>,
}

/// An actionable remediation step, most critical first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextAction {
    pub title: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<PatchSuggestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionAdditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<Violation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_actions: Option<Vec<NextAction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translations: Option<Translations>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    pub version: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_additions: Option<DecisionAdditions>,
}

impl WorkerResponse {
    pub fn new(
        version: impl Into<String>,
        request_id: impl Into<String>,
        decision_additions: Option<DecisionAdditions>,
    ) -> Self {
        Self {
            version: version.into(),
            request_id: request_id.into(),
            decision_additions,
        }
    }
}

/// Identifiers echoed into the response, read before full decoding so they
/// survive a request that fails typed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIds {
    pub version: String,
    pub request_id: String,
}

impl Default for RequestIds {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            request_id: UNKNOWN_REQUEST_ID.to_string(),
        }
    }
}

impl RequestIds {
    /// Pull `version` and `requestId` out of a generic JSON tree, keeping the
    /// defaults for anything missing or not a string.
    pub fn from_value(value: &Value) -> Self {
        let mut ids = Self::default();
        if let Some(version) = value.get("version").and_then(Value::as_str) {
            ids.version = version.to_string();
        }
        if let Some(request_id) = value.get("requestId").and_then(Value::as_str) {
            ids.request_id = request_id.to_string();
        }
        ids
    }
}

/// Decode a worker request from text. The worker itself parses in two steps
/// (see [`RequestIds::from_value`]) so identifiers survive a failed decode.
#[cfg(test)]
pub fn decode(text: &str) -> Result<WorkerRequest, WorkerError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| WorkerError::Decode(format!("request is not valid JSON: {err}")))?;
    decode_value(value)
}

/// Decode a worker request from an already parsed JSON tree.
pub fn decode_value(value: Value) -> Result<WorkerRequest, WorkerError> {
    if !value.is_object() {
        return Err(WorkerError::Decode(
            "request must be a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|err| WorkerError::Decode(err.to_string()))
}

/// Encode a response as pretty-printed JSON (no trailing newline).
pub fn encode(response: &WorkerResponse) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(response)
}

/// Decode a response document, the inverse of [`encode`].
#[cfg(test)]
pub fn decode_response(text: &str) -> Result<WorkerResponse, WorkerError> {
    serde_json::from_str(text).map_err(|err| WorkerError::Decode(err.to_string()))
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
