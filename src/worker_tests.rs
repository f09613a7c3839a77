use super::*;
use crate::provider::transport::fake::FakeTransport;
use crate::provider::transport::HttpTransport;
use crate::provider::{create_provider, EnrichmentProvider, ProviderKind};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

/// Builds the real backends on a canned transport and records what was asked for.
struct RecordingFactory {
    transport: Rc<FakeTransport>,
    created: RefCell<Vec<ProviderKind>>,
}

impl RecordingFactory {
    fn new(transport: Rc<FakeTransport>) -> Self {
        Self {
            transport,
            created: RefCell::new(Vec::new()),
        }
    }

    fn created(&self) -> Vec<ProviderKind> {
        self.created.borrow().clone()
    }
}

impl ProviderFactory for RecordingFactory {
    fn create(
        &self,
        kind: ProviderKind,
        config: &WorkerConfig,
    ) -> Result<Box<dyn EnrichmentProvider>, WorkerError> {
        self.created.borrow_mut().push(kind);
        let transport: Rc<dyn HttpTransport> = self.transport.clone();
        create_provider(kind, config, transport)
    }
}

fn keyed_config() -> WorkerConfig {
    let mut config = WorkerConfig::default();
    config.openai.api_key = Some("sk-test".to_string());
    config.gemini.api_key = Some("g-test".to_string());
    config.claude.api_key = Some("c-test".to_string());
    config
}

fn openai_reply(content: &Value) -> Rc<FakeTransport> {
    FakeTransport::replying(
        200,
        json!({"choices": [{"message": {"content": content.to_string()}}]}),
    )
}

fn request_with_findings(extra: Value) -> String {
    let mut request = json!({
        "version": "v1alpha1",
        "requestId": "req-42",
        "input": {
            "resource": {"kind": "Pod", "name": "web", "namespace": "prod"},
            "policyFindings": [{
                "policyId": "PSP-001",
                "title": "Running as root",
                "severity": "HIGH",
                "message": "Container runs as root user",
                "evidence": [{
                    "type": "K8S_FIELD",
                    "subject": "spec.securityContext",
                    "detail": "runAsUser: 0"
                }]
            }]
        }
    });
    if let (Some(target), Some(extra)) = (request.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
    }
    request.to_string()
}

fn summary_of(processed: &Processed) -> &str {
    processed
        .response
        .decision_additions
        .as_ref()
        .and_then(|additions| additions.summary.as_deref())
        .expect("summary")
}

#[test]
fn request_without_findings_is_skipped_without_backend() {
    let fake = FakeTransport::failing("must not be called");
    let factory = RecordingFactory::new(fake.clone());
    let config = keyed_config();
    let worker = Worker::new(&config, &factory);

    let request = json!({
        "version": "v1alpha1",
        "requestId": "r1",
        "input": {"resource": {"kind": "Pod", "name": "a", "namespace": "b"}}
    });
    let processed = worker.process(&request.to_string());

    assert_eq!(processed.outcome, Outcome::Skipped);
    assert_eq!(
        processed.response,
        WorkerResponse::new("v1alpha1", "r1", None)
    );
    assert!(factory.created().is_empty());
    assert_eq!(fake.calls(), 0);
}

#[test]
fn empty_findings_list_is_also_skipped() {
    let factory = RecordingFactory::new(FakeTransport::failing("unused"));
    let config = WorkerConfig::default();
    let worker = Worker::new(&config, &factory);

    let request = json!({
        "version": "v1alpha1",
        "requestId": "r2",
        "input": {
            "resource": {"kind": "Pod", "name": "a", "namespace": "b"},
            "policyFindings": []
        },
        "provider": "nonexistent"
    });
    let processed = worker.process(&request.to_string());

    assert_eq!(processed.outcome, Outcome::Skipped);
    assert!(processed.response.decision_additions.is_none());
}

#[test]
fn successful_enrichment_maps_summary_and_actions() {
    let fake = openai_reply(&json!({
        "summary": "Pod blocked for running as root",
        "nextActions": [
            {"title": "Set runAsNonRoot", "detail": "Add runAsNonRoot: true"},
            {"title": "Pick a user", "detail": "Set runAsUser to 1000"}
        ]
    }));
    let factory = RecordingFactory::new(fake.clone());
    let config = keyed_config();
    let worker = Worker::new(&config, &factory);

    let processed = worker.process(&request_with_findings(json!({})));

    assert_eq!(processed.outcome, Outcome::Enriched);
    assert_eq!(processed.response.request_id, "req-42");
    let additions = processed.response.decision_additions.expect("additions");
    assert_eq!(
        additions.summary.as_deref(),
        Some("Pod blocked for running as root")
    );
    let actions = additions.next_actions.expect("actions");
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[1].title, "Pick a user");
    assert!(actions.iter().all(|action| action.patch.is_none()));
    assert!(additions.translations.is_none());
    assert_eq!(factory.created(), vec![ProviderKind::OpenAi]);
    assert_eq!(fake.calls(), 1);
}

#[test]
fn unrecognized_severity_is_still_enriched() {
    let fake = openai_reply(&json!({"summary": "Informational finding only"}));
    let factory = RecordingFactory::new(fake.clone());
    let config = keyed_config();
    let worker = Worker::new(&config, &factory);

    let request = request_with_findings(json!({})).replace("\"HIGH\"", "\"INFO\"");
    let processed = worker.process(&request);

    assert_eq!(processed.outcome, Outcome::Enriched);
    assert_eq!(summary_of(&processed), "Informational finding only");
    assert_eq!(fake.calls(), 1);
    let prompt = fake.last_request().body["messages"][1]["content"]
        .as_str()
        .map(str::to_string)
        .expect("prompt");
    assert!(prompt.contains("\"severity\": \"INFO\""), "{prompt}");
}

#[test]
fn empty_action_list_is_omitted() {
    let fake = openai_reply(&json!({"summary": "Nothing to do", "nextActions": []}));
    let factory = RecordingFactory::new(fake);
    let config = keyed_config();
    let worker = Worker::new(&config, &factory);

    let processed = worker.process(&request_with_findings(json!({})));

    let additions = processed.response.decision_additions.expect("additions");
    assert!(additions.next_actions.is_none());
}

#[test]
fn non_english_locale_carries_translations() {
    let fake = openai_reply(&json!({
        "summary": "Pod blocked",
        "nextActions": [{"title": "Set runAsNonRoot", "detail": "Add it"}],
        "translations": {
            "summary": "Pod 차단됨",
            "nextActions": [
                {"title": "runAsNonRoot 설정", "detail": "추가하세요"},
                {"title": "추가 조치", "detail": "검토하세요"}
            ]
        }
    }));
    let factory = RecordingFactory::new(fake.clone());
    let config = keyed_config();
    let worker = Worker::new(&config, &factory);

    let processed = worker.process(&request_with_findings(json!({"locale": "ko"})));

    let translations = processed
        .response
        .decision_additions
        .and_then(|additions| additions.translations)
        .expect("translations");
    assert_eq!(translations.summary.as_deref(), Some("Pod 차단됨"));
    // Translated actions are an independent list; lengths need not match.
    assert_eq!(translations.next_actions.expect("actions").len(), 2);

    let prompt = fake.last_request().body["messages"][1]["content"]
        .as_str()
        .map(str::to_string)
        .expect("prompt");
    assert!(prompt.contains("Korean"));
}

#[test]
fn english_locale_ignores_translations() {
    let fake = openai_reply(&json!({
        "summary": "Pod blocked",
        "translations": {"summary": "ignored"}
    }));
    let factory = RecordingFactory::new(fake);
    let config = keyed_config();
    let worker = Worker::new(&config, &factory);

    let processed = worker.process(&request_with_findings(json!({"locale": "en"})));

    assert_eq!(processed.outcome, Outcome::Enriched);
    let additions = processed.response.decision_additions.expect("additions");
    assert!(additions.translations.is_none());
}

#[test]
fn unusable_translations_are_dropped_not_fatal() {
    let fake = openai_reply(&json!({
        "summary": "Pod blocked",
        "translations": "not an object"
    }));
    let factory = RecordingFactory::new(fake);
    let config = keyed_config();
    let worker = Worker::new(&config, &factory);

    let processed = worker.process(&request_with_findings(json!({"locale": "ja"})));

    assert_eq!(processed.outcome, Outcome::Enriched);
    assert_eq!(summary_of(&processed), "Pod blocked");
    let additions = processed.response.decision_additions.expect("additions");
    assert!(additions.translations.is_none());
}

#[test]
fn request_provider_beats_env_override() {
    let fake = FakeTransport::replying(
        200,
        json!({"content": [{"type": "text", "text": "{\"summary\": \"from claude\"}"}]}),
    );
    let factory = RecordingFactory::new(fake);
    let mut config = keyed_config();
    config.provider_override = Some("gemini".to_string());
    let worker = Worker::new(&config, &factory);

    let processed = worker.process(&request_with_findings(json!({"provider": "claude"})));

    assert_eq!(factory.created(), vec![ProviderKind::Claude]);
    assert_eq!(summary_of(&processed), "from claude");
}

#[test]
fn transport_failure_degrades_with_ids_echoed() {
    let fake = FakeTransport::failing("connection refused");
    let factory = RecordingFactory::new(fake);
    let config = keyed_config();
    let worker = Worker::new(&config, &factory);

    let processed = worker.process(&request_with_findings(json!({})));

    assert_eq!(processed.outcome, Outcome::Degraded);
    assert_eq!(processed.response.version, "v1alpha1");
    assert_eq!(processed.response.request_id, "req-42");
    assert_eq!(
        summary_of(&processed),
        "AI enrichment unavailable: Network error calling OpenAI: connection refused"
    );
    let actions = processed
        .response
        .decision_additions
        .and_then(|additions| additions.next_actions)
        .expect("fallback action");
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].title, FALLBACK_ACTION_TITLE);
    assert_eq!(actions[0].detail, FALLBACK_ACTION_DETAIL);
}

#[test]
fn missing_credential_degrades_without_http() {
    let fake = FakeTransport::failing("must not be called");
    let factory = RecordingFactory::new(fake.clone());
    let config = WorkerConfig::default();
    let worker = Worker::new(&config, &factory);

    let processed = worker.process(&request_with_findings(json!({"provider": "gemini"})));

    assert_eq!(processed.outcome, Outcome::Degraded);
    let summary = summary_of(&processed);
    assert!(summary.starts_with(UNAVAILABLE_PREFIX));
    assert!(summary.contains("WHY_GEMINI_API_KEY"), "{summary}");
    assert_eq!(fake.calls(), 0);
}

#[test]
fn unsupported_provider_degrades_before_factory() {
    let factory = RecordingFactory::new(FakeTransport::failing("unused"));
    let config = keyed_config();
    let worker = Worker::new(&config, &factory);

    let processed = worker.process(&request_with_findings(json!({"provider": "nonexistent"})));

    assert_eq!(processed.outcome, Outcome::Degraded);
    assert!(summary_of(&processed).to_lowercase().contains("unsupported"));
    assert!(factory.created().is_empty());
}

#[test]
fn invalid_ai_output_degrades() {
    let fake = openai_reply(&json!({"nextActions": []}));
    let factory = RecordingFactory::new(fake);
    let config = keyed_config();
    let worker = Worker::new(&config, &factory);

    let processed = worker.process(&request_with_findings(json!({})));

    assert_eq!(processed.outcome, Outcome::Degraded);
    assert!(summary_of(&processed).contains("missing 'summary'"));
}

#[test]
fn non_json_input_degrades_with_default_ids() {
    let factory = RecordingFactory::new(FakeTransport::failing("unused"));
    let config = keyed_config();
    let worker = Worker::new(&config, &factory);

    let processed = worker.process("not json");

    assert_eq!(processed.outcome, Outcome::Degraded);
    assert_eq!(processed.response.version, "v1alpha1");
    assert_eq!(processed.response.request_id, "unknown");
    assert!(summary_of(&processed).starts_with(UNAVAILABLE_PREFIX));
}

#[test]
fn typed_decode_failure_still_echoes_string_ids() {
    let factory = RecordingFactory::new(FakeTransport::failing("unused"));
    let config = keyed_config();
    let worker = Worker::new(&config, &factory);

    let processed = worker.process(r#"{"version":"v2","requestId":"half","input":{}}"#);

    assert_eq!(processed.outcome, Outcome::Degraded);
    assert_eq!(processed.response.version, "v2");
    assert_eq!(processed.response.request_id, "half");
}

#[test]
fn long_error_messages_are_truncated_to_200_chars() {
    let long = "x".repeat(250);
    let additions = degraded_additions(&long);
    let summary = additions.summary.expect("summary");
    let detail = summary.strip_prefix(UNAVAILABLE_PREFIX).expect("prefix");
    assert_eq!(detail.chars().count(), 203);
    assert!(detail.ends_with("..."));

    let exact = "y".repeat(200);
    let summary = degraded_additions(&exact).summary.expect("summary");
    assert_eq!(summary, format!("{UNAVAILABLE_PREFIX}{exact}"));
}

#[test]
fn truncation_counts_characters_not_bytes() {
    let message = "한".repeat(201);
    let truncated = truncate_message(&message);
    assert_eq!(truncated.chars().count(), 203);
    assert!(truncated.starts_with(&"한".repeat(200)));
}

#[test]
fn outcome_labels() {
    assert_eq!(Outcome::Skipped.as_str(), "skipped");
    assert_eq!(Outcome::Enriched.as_str(), "enriched");
    assert_eq!(Outcome::Degraded.as_str(), "degraded");
}
