//! End-to-end dispatch pipeline tests
//!
//! These tests drive the full pipeline with counting collaborator doubles
//! and verify the delivery contracts: skip-on-no-address, override
//! resolution, interception, fallback invocation, and error normalization.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use courier::config::Settings;
use courier::envelope::Envelope;
use courier::error::{DispatchError, Outcome, SkipReason};
use courier::identity::{MemoryIdentityStore, Profile};
use courier::intercept::{DeliveryOverride, EnvelopeModifier};
use courier::localize::Translator;
use courier::template::{Renderer, TemplateError, TemplateResult};
use courier::transport::{Transport, TransportError, TransportRegistry};
use courier::DispatchPipeline;

// =============================================================================
// Collaborator doubles
// =============================================================================

/// Renderer returning a fixed body and counting invocations
struct CountingRenderer {
    body: String,
    calls: AtomicUsize,
}

impl CountingRenderer {
    fn new(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Renderer for CountingRenderer {
    async fn render(
        &self,
        _template_name: &str,
        _params: &serde_json::Value,
    ) -> TemplateResult<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.body.clone())
    }
}

/// Renderer that always fails
struct FailingRenderer;

#[async_trait]
impl Renderer for FailingRenderer {
    async fn render(
        &self,
        template_name: &str,
        _params: &serde_json::Value,
    ) -> TemplateResult<String> {
        Err(TemplateError::Render(format!(
            "unclosed block in {template_name}"
        )))
    }
}

/// Translator that echoes its input and records the requested languages
struct RecordingTranslator {
    languages: Mutex<Vec<String>>,
}

impl RecordingTranslator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            languages: Mutex::new(Vec::new()),
        })
    }

    fn languages(&self) -> Vec<String> {
        self.languages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for RecordingTranslator {
    async fn translate(&self, text: &str, lang: &str) -> String {
        self.languages.lock().unwrap().push(lang.to_string());
        text.to_string()
    }
}

/// Transport recording every envelope it accepts
struct RecordingTransport {
    sent: Mutex<Vec<Envelope>>,
}

impl RecordingTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

/// Transport whose delivery agent is missing
struct AgentMissingTransport;

#[async_trait]
impl Transport for AgentMissingTransport {
    fn name(&self) -> &'static str {
        "broken-agent"
    }

    async fn send(&self, _envelope: &Envelope) -> Result<(), TransportError> {
        Err(TransportError::AgentMissing(
            "/usr/sbin/sendmail".to_string(),
        ))
    }
}

/// Transport that permanently rejects every message
struct RefusingTransport;

#[async_trait]
impl Transport for RefusingTransport {
    fn name(&self) -> &'static str {
        "refusing"
    }

    async fn send(&self, _envelope: &Envelope) -> Result<(), TransportError> {
        Err(TransportError::Rejected(
            "550 mailbox unavailable".to_string(),
        ))
    }
}

/// Delivery override recording claimed envelopes
struct RecordingOverride {
    claimed: Mutex<Vec<Envelope>>,
}

impl RecordingOverride {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            claimed: Mutex::new(Vec::new()),
        })
    }

    fn claimed(&self) -> Vec<Envelope> {
        self.claimed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryOverride for RecordingOverride {
    async fn deliver(&self, envelope: &Envelope) -> anyhow::Result<()> {
        self.claimed.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

/// Delivery override that fails
struct FailingOverride;

#[async_trait]
impl DeliveryOverride for FailingOverride {
    async fn deliver(&self, _envelope: &Envelope) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("provider outage"))
    }
}

/// Modifier tagging the subject line
struct SubjectTagger;

#[async_trait]
impl EnvelopeModifier for SubjectTagger {
    async fn modify(&self, mut envelope: Envelope) -> Envelope {
        envelope.subject = format!("[tagged] {}", envelope.subject);
        envelope
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn identity_with(id: &str, address: &str, language: Option<&str>) -> Arc<MemoryIdentityStore> {
    let store = Arc::new(MemoryIdentityStore::new());
    let mut profile = Profile::with_address(address);
    if let Some(lang) = language {
        profile = profile.language(lang);
    }
    store.insert(id, profile);
    store
}

fn recording_registry(transport: Arc<RecordingTransport>) -> Arc<TransportRegistry> {
    let registry = TransportRegistry::with_fallback("recording");
    registry.register("recording", transport);
    Arc::new(registry)
}

// =============================================================================
// Dispatch scenarios
// =============================================================================

#[tokio::test]
async fn test_welcome_happy_path() {
    let renderer = CountingRenderer::new("<p>Hi</p>");
    let translator = RecordingTranslator::new();
    let transport = RecordingTransport::new();

    let pipeline = DispatchPipeline::builder(Settings::default())
        .identity_store(identity_with("7", "a@x.com", Some("fr")))
        .renderer(renderer.clone())
        .translator(translator.clone())
        .transport_registry(recording_registry(transport.clone()))
        .build();

    let outcome = pipeline
        .send_to_identity("emails/welcome", "7", json!({}))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Delivered);
    assert_eq!(renderer.calls(), 1);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient_address, "a@x.com");
    assert_eq!(sent[0].html_body, "<p>Hi</p>");
    assert_eq!(sent[0].plaintext_body, "Hi");
    assert_eq!(sent[0].correlation.recipient_id.as_deref(), Some("7"));

    // Both subject and body were localized into the stored preference
    assert!(translator.languages().iter().all(|l| l == "fr"));
}

#[tokio::test]
async fn test_no_address_is_successful_skip() {
    let renderer = CountingRenderer::new("<p>never rendered</p>");
    let transport = RecordingTransport::new();

    let store = Arc::new(MemoryIdentityStore::new());
    store.insert("7", Profile::default().language("fr"));

    let pipeline = DispatchPipeline::builder(Settings::default())
        .identity_store(store)
        .renderer(renderer.clone())
        .transport_registry(recording_registry(transport.clone()))
        .build();

    let outcome = pipeline
        .send_to_identity("emails/welcome", "7", json!({}))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Skipped(SkipReason::NoAddress));
    assert_eq!(renderer.calls(), 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_override_bypasses_renderer() {
    let renderer = CountingRenderer::new("<p>stock body</p>");
    let transport = RecordingTransport::new();

    let mut settings = Settings::default();
    settings
        .templates
        .overrides
        .insert("welcome".to_string(), "Hello {{name}}".to_string());

    let pipeline = DispatchPipeline::builder(settings)
        .identity_store(identity_with("7", "a@x.com", None))
        .renderer(renderer.clone())
        .transport_registry(recording_registry(transport.clone()))
        .build();

    let outcome = pipeline
        .send_to_identity("emails/welcome", "7", json!({"name": "Sam"}))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Delivered);
    assert_eq!(renderer.calls(), 0);
    assert_eq!(transport.sent()[0].html_body, "Hello Sam");
}

#[tokio::test]
async fn test_delivery_override_skips_fallback_transport() {
    let transport = RecordingTransport::new();
    let interceptor = RecordingOverride::new();

    let pipeline = DispatchPipeline::builder(Settings::default())
        .identity_store(identity_with("7", "a@x.com", None))
        .renderer(CountingRenderer::new("<p>Hi</p>"))
        .transport_registry(recording_registry(transport.clone()))
        .delivery_override(interceptor.clone())
        .build();

    let outcome = pipeline
        .send_to_identity("emails/welcome", "7", json!({}))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Delivered);
    assert_eq!(interceptor.claimed().len(), 1);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_fallback_invoked_exactly_once_without_override() {
    let transport = RecordingTransport::new();

    let pipeline = DispatchPipeline::builder(Settings::default())
        .identity_store(identity_with("7", "a@x.com", None))
        .renderer(CountingRenderer::new("<p>Hi</p>"))
        .transport_registry(recording_registry(transport.clone()))
        .build();

    pipeline
        .send_to_identity("emails/welcome", "7", json!({}))
        .await
        .unwrap();

    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_agent_missing_surfaces_as_transport_unavailable() {
    let registry = TransportRegistry::with_fallback("broken-agent");
    registry.register("broken-agent", Arc::new(AgentMissingTransport));

    let pipeline = DispatchPipeline::builder(Settings::default())
        .identity_store(identity_with("7", "a@x.com", None))
        .renderer(CountingRenderer::new("<p>Hi</p>"))
        .transport_registry(Arc::new(registry))
        .build();

    let result = pipeline
        .send_to_identity("emails/welcome", "7", json!({}))
        .await;

    assert!(matches!(result, Err(DispatchError::TransportUnavailable)));
}

#[tokio::test]
async fn test_transport_failure_keeps_original_detail() {
    let registry = TransportRegistry::with_fallback("refusing");
    registry.register("refusing", Arc::new(RefusingTransport));

    let pipeline = DispatchPipeline::builder(Settings::default())
        .identity_store(identity_with("7", "a@x.com", None))
        .renderer(CountingRenderer::new("<p>Hi</p>"))
        .transport_registry(Arc::new(registry))
        .build();

    let result = pipeline
        .send_to_identity("emails/welcome", "7", json!({}))
        .await;

    match result {
        Err(DispatchError::Transport(TransportError::Rejected(detail))) => {
            assert!(detail.contains("550"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_render_failure_propagates_without_delivery() {
    let transport = RecordingTransport::new();

    let pipeline = DispatchPipeline::builder(Settings::default())
        .identity_store(identity_with("7", "a@x.com", None))
        .renderer(Arc::new(FailingRenderer))
        .transport_registry(recording_registry(transport.clone()))
        .build();

    let result = pipeline
        .send_to_identity("emails/welcome", "7", json!({}))
        .await;

    assert!(matches!(result, Err(DispatchError::Render(_))));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_interception_failure_does_not_retry_fallback() {
    let transport = RecordingTransport::new();

    let pipeline = DispatchPipeline::builder(Settings::default())
        .identity_store(identity_with("7", "a@x.com", None))
        .renderer(CountingRenderer::new("<p>Hi</p>"))
        .transport_registry(recording_registry(transport.clone()))
        .delivery_override(Arc::new(FailingOverride))
        .build();

    let result = pipeline
        .send_to_identity("emails/welcome", "7", json!({}))
        .await;

    assert!(matches!(result, Err(DispatchError::Interception(_))));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_modifier_rewrites_envelope_before_delivery() {
    let transport = RecordingTransport::new();

    let pipeline = DispatchPipeline::builder(Settings::default())
        .identity_store(identity_with("7", "a@x.com", None))
        .renderer(CountingRenderer::new("<p>Hi</p>"))
        .transport_registry(recording_registry(transport.clone()))
        .modifier(Arc::new(SubjectTagger))
        .build();

    pipeline
        .send_to_identity("emails/welcome", "7", json!({"subject": "Welcome"}))
        .await
        .unwrap();

    assert_eq!(transport.sent()[0].subject, "[tagged] Welcome");
}

#[tokio::test]
async fn test_default_payload_available_to_templates() {
    let transport = RecordingTransport::new();

    let mut settings = Settings::default();
    settings.branding.site_url = "https://forum.example.org".to_string();
    settings.branding.site_title = "Example Forum".to_string();
    settings.templates.overrides.insert(
        "welcome".to_string(),
        "<p>Visit {{site_url}} ({{site_title}})</p>".to_string(),
    );

    let pipeline = DispatchPipeline::builder(settings)
        .identity_store(identity_with("7", "a@x.com", None))
        .transport_registry(recording_registry(transport.clone()))
        .build();

    // Caller-supplied params win over the baseline
    pipeline
        .send_to_identity(
            "emails/welcome",
            "7",
            json!({"site_title": "Custom Title"}),
        )
        .await
        .unwrap();

    let sent = transport.sent();
    assert_eq!(
        sent[0].html_body,
        "<p>Visit https://forum.example.org (Custom Title)</p>"
    );
}

#[tokio::test]
async fn test_send_to_address_uses_explicit_language() {
    let translator = RecordingTranslator::new();
    let transport = RecordingTransport::new();

    let pipeline = DispatchPipeline::builder(Settings::default())
        .renderer(CountingRenderer::new("<p>Hi</p>"))
        .translator(translator.clone())
        .transport_registry(recording_registry(transport.clone()))
        .build();

    pipeline
        .send_to_address("emails/digest", "direct@x.com", Some("de"), json!({}))
        .await
        .unwrap();

    assert_eq!(transport.sent()[0].recipient_address, "direct@x.com");
    assert!(translator.languages().iter().all(|l| l == "de"));
}

#[tokio::test]
async fn test_plaintext_derived_with_images_stripped() {
    let transport = RecordingTransport::new();

    let pipeline = DispatchPipeline::builder(Settings::default())
        .identity_store(identity_with("7", "a@x.com", None))
        .renderer(CountingRenderer::new(
            "<p>Hello</p><img src=\"/logo.png\" alt=\"logo\"><p>Goodbye</p>",
        ))
        .transport_registry(recording_registry(transport.clone()))
        .build();

    pipeline
        .send_to_identity("emails/welcome", "7", json!({}))
        .await
        .unwrap();

    let sent = transport.sent();
    assert!(sent[0].plaintext_body.contains("Hello"));
    assert!(sent[0].plaintext_body.contains("Goodbye"));
    assert!(!sent[0].plaintext_body.contains("img"));
    assert!(!sent[0].plaintext_body.contains("logo.png"));
}

#[tokio::test]
async fn test_send_via_fallback_directly() {
    let transport = RecordingTransport::new();

    let pipeline = DispatchPipeline::builder(Settings::default())
        .transport_registry(recording_registry(transport.clone()))
        .build();

    let envelope = Envelope::builder()
        .recipient("a@x.com")
        .sender("no-reply@example.org", "")
        .subject("forced")
        .html_body("<p>x</p>")
        .plaintext_body("x")
        .template_name("emails/forced")
        .build();

    let outcome = pipeline.send_via_fallback(&envelope).await.unwrap();
    assert_eq!(outcome, Outcome::Delivered);
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_spawned_dispatch_completes_detached() {
    let transport = RecordingTransport::new();

    let pipeline = Arc::new(
        DispatchPipeline::builder(Settings::default())
            .identity_store(identity_with("7", "a@x.com", None))
            .renderer(CountingRenderer::new("<p>Hi</p>"))
            .transport_registry(recording_registry(transport.clone()))
            .build(),
    );

    let handle = pipeline.spawn_to_identity("emails/welcome", "7", json!({}));
    let outcome = handle.await.unwrap().unwrap();

    assert_eq!(outcome, Outcome::Delivered);
    assert_eq!(transport.sent().len(), 1);
}
