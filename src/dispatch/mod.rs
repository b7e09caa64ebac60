//! The dispatch pipeline.
//!
//! Orchestrates a send end to end: identity resolution, template
//! resolution, localization, plaintext derivation, envelope assembly,
//! interception, and transport delivery, with a uniform outcome contract.
//! The pipeline never retries; every failure is single-attempt and
//! terminal.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::config::{SenderConfig, Settings};
use crate::defaults::DefaultPayloadState;
use crate::envelope::{CorrelationIds, Envelope};
use crate::error::{DispatchError, DispatchResult, Outcome, SkipReason};
use crate::identity::{IdentityStore, MemoryIdentityStore};
use crate::intercept::{DeliveryOverride, EnvelopeModifier, InterceptionGate};
use crate::localize::{EchoTranslator, LocalizationStep, Translator};
use crate::plaintext::{HtmlToText, PlainTextOptions, TagStripper};
use crate::template::{Renderer, StaticRenderer, TemplateResolver};
use crate::transport::{create_transport_registry, TransportRegistry};

/// Notification dispatch pipeline.
///
/// Built once at startup via [`DispatchPipeline::builder`]; construction is
/// the initialization hook, and consuming the builder makes double
/// initialization unrepresentable.
pub struct DispatchPipeline {
    identity: Arc<dyn IdentityStore>,
    resolver: TemplateResolver,
    localizer: LocalizationStep,
    html_to_text: Arc<dyn HtmlToText>,
    gate: InterceptionGate,
    transports: Arc<TransportRegistry>,
    defaults: Arc<DefaultPayloadState>,
    sender: SenderConfig,
}

impl DispatchPipeline {
    /// Start building a pipeline from configuration
    pub fn builder(settings: Settings) -> PipelineBuilder {
        PipelineBuilder::new(settings)
    }

    /// Send to a recipient identity.
    ///
    /// Resolves the contact address and language preference concurrently.
    /// A recipient without a stored address is a successful skip, not an
    /// error; nothing is rendered and no transport is invoked.
    #[tracing::instrument(
        name = "dispatch.send_to_identity",
        skip(self, params),
        fields(template = %template, recipient_id = %recipient_id)
    )]
    pub async fn send_to_identity(
        &self,
        template: &str,
        recipient_id: &str,
        params: Value,
    ) -> DispatchResult {
        let (address, language) = futures::join!(
            self.identity.address(recipient_id),
            self.identity.language(recipient_id)
        );

        let address = match address.filter(|a| !a.is_empty()) {
            Some(address) => address,
            None => {
                tracing::debug!(
                    recipient_id = %recipient_id,
                    "recipient has no contact address, skipping send"
                );
                return Ok(Outcome::Skipped(SkipReason::NoAddress));
            }
        };

        let mut params = into_map(params);
        params
            .entry("recipient_id".to_string())
            .or_insert_with(|| json!(recipient_id));

        self.send_to_address(template, &address, language.as_deref(), Value::Object(params))
            .await
    }

    /// Send to a known address, bypassing identity lookup.
    ///
    /// `lang` is the explicit language for this send; with `None` the
    /// configured default and then the baseline locale apply.
    #[tracing::instrument(
        name = "dispatch.send_to_address",
        skip(self, params),
        fields(template = %template, to = %address)
    )]
    pub async fn send_to_address(
        &self,
        template: &str,
        address: &str,
        lang: Option<&str>,
        params: Value,
    ) -> DispatchResult {
        let mut params = into_map(params);
        self.defaults.snapshot().merge_under(&mut params);
        let params = Value::Object(params);

        let language = self.localizer.resolve_language(lang, None);
        let subject_key = params
            .get("subject")
            .and_then(Value::as_str)
            .unwrap_or(template)
            .to_string();

        // Subject and body have no ordering dependency
        let subject_fut = self.localizer.localize(&subject_key, &language);
        let body_fut = async {
            let html = self.resolver.resolve(template, &params).await?;
            Ok::<_, DispatchError>(self.localizer.localize(&html, &language).await)
        };
        let (subject, html) = futures::join!(subject_fut, body_fut);
        let html = html?;

        let plaintext = self
            .html_to_text
            .to_plain_text(&html, PlainTextOptions { strip_images: true });

        let envelope = Envelope::builder()
            .recipient(address)
            .sender(self.sender.address.clone(), self.sender.display_name.clone())
            .subject(subject)
            .html_body(html)
            .plaintext_body(plaintext)
            .template_name(template)
            .correlation(CorrelationIds::from_params(&params))
            .raw_params(params)
            .build();

        let envelope = self.gate.apply_modifiers(envelope).await;

        if let Some(interceptor) = self.gate.delivery_override() {
            tracing::debug!(
                message_id = %envelope.message_id,
                "delivery claimed by registered override"
            );
            interceptor
                .deliver(&envelope)
                .await
                .map_err(DispatchError::Interception)?;
            return Ok(Outcome::Delivered);
        }

        self.send_via_fallback(&envelope).await
    }

    /// Deliver an envelope through the registry's fallback transport.
    ///
    /// Public so interceptors and tests can force fallback delivery for an
    /// envelope they already hold.
    pub async fn send_via_fallback(&self, envelope: &Envelope) -> DispatchResult {
        let transport = match self.transports.fallback() {
            Some(transport) => transport,
            None => {
                tracing::error!(
                    message_id = %envelope.message_id,
                    "no fallback transport configured"
                );
                return Err(DispatchError::TransportUnavailable);
            }
        };

        match transport.send(envelope).await {
            Ok(()) => {
                tracing::info!(
                    transport = transport.name(),
                    message_id = %envelope.message_id,
                    to = %envelope.recipient_address,
                    template = %envelope.template_name,
                    "message delivered"
                );
                Ok(Outcome::Delivered)
            }
            Err(err) => {
                let err = DispatchError::from_transport(err);
                tracing::error!(
                    transport = transport.name(),
                    message_id = %envelope.message_id,
                    to = %envelope.recipient_address,
                    error = %err,
                    "delivery failed"
                );
                Err(err)
            }
        }
    }

    /// Fire-and-forget variant of [`send_to_identity`].
    ///
    /// The dispatch runs to completion on the runtime whether or not the
    /// returned handle is awaited; failures are logged either way.
    ///
    /// [`send_to_identity`]: DispatchPipeline::send_to_identity
    pub fn spawn_to_identity(
        self: &Arc<Self>,
        template: impl Into<String>,
        recipient_id: impl Into<String>,
        params: Value,
    ) -> tokio::task::JoinHandle<DispatchResult> {
        let pipeline = Arc::clone(self);
        let template = template.into();
        let recipient_id = recipient_id.into();

        tokio::spawn(async move {
            let result = pipeline
                .send_to_identity(&template, &recipient_id, params)
                .await;
            if let Err(err) = &result {
                tracing::error!(
                    template = %template,
                    recipient_id = %recipient_id,
                    error = %err,
                    "background dispatch failed"
                );
            }
            result
        })
    }

    /// Template resolver, for runtime override management
    pub fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    /// Default payload state, for wiring the configuration-change channel
    pub fn defaults(&self) -> &Arc<DefaultPayloadState> {
        &self.defaults
    }

    /// Transport registry
    pub fn transports(&self) -> &Arc<TransportRegistry> {
        &self.transports
    }
}

fn into_map(params: Value) -> Map<String, Value> {
    match params {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            tracing::debug!(params = %other, "non-object params ignored");
            Map::new()
        }
    }
}

/// Builder wiring collaborators, interceptors, and configuration into a
/// [`DispatchPipeline`].
pub struct PipelineBuilder {
    settings: Settings,
    identity: Option<Arc<dyn IdentityStore>>,
    renderer: Option<Arc<dyn Renderer>>,
    translator: Option<Arc<dyn Translator>>,
    html_to_text: Option<Arc<dyn HtmlToText>>,
    transports: Option<Arc<TransportRegistry>>,
    gate: InterceptionGate,
}

impl PipelineBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            identity: None,
            renderer: None,
            translator: None,
            html_to_text: None,
            transports: None,
            gate: InterceptionGate::new(),
        }
    }

    /// Set the identity store collaborator
    pub fn identity_store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.identity = Some(store);
        self
    }

    /// Set the default-template renderer collaborator
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Set the translation collaborator
    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Set the HTML to plaintext collaborator
    pub fn html_to_text(mut self, converter: Arc<dyn HtmlToText>) -> Self {
        self.html_to_text = Some(converter);
        self
    }

    /// Replace the config-derived transport registry
    pub fn transport_registry(mut self, registry: Arc<TransportRegistry>) -> Self {
        self.transports = Some(registry);
        self
    }

    /// Register an envelope modifier
    pub fn modifier(mut self, modifier: Arc<dyn EnvelopeModifier>) -> Self {
        self.gate.register_modifier(modifier);
        self
    }

    /// Register a delivery override
    pub fn delivery_override(mut self, interceptor: Arc<dyn DeliveryOverride>) -> Self {
        self.gate.register_override(interceptor);
        self
    }

    /// Build the pipeline, wiring transports and the default payload from
    /// configuration. Unset collaborators fall back to the built-in
    /// implementations.
    pub fn build(self) -> DispatchPipeline {
        let transports = self
            .transports
            .unwrap_or_else(|| Arc::new(create_transport_registry(&self.settings.transport)));

        let renderer = self
            .renderer
            .unwrap_or_else(|| Arc::new(StaticRenderer::new()));
        let resolver =
            TemplateResolver::with_overrides(renderer, self.settings.templates.overrides.clone());

        let translator = self.translator.unwrap_or_else(|| Arc::new(EchoTranslator));
        let localizer = LocalizationStep::new(
            translator,
            self.settings.localization.default_language.clone(),
        );

        tracing::info!(
            fallback = transports.fallback_name().unwrap_or("none"),
            overrides = self.settings.templates.overrides.len(),
            "dispatch pipeline initialized"
        );

        DispatchPipeline {
            identity: self
                .identity
                .unwrap_or_else(|| Arc::new(MemoryIdentityStore::new())),
            resolver,
            localizer,
            html_to_text: self.html_to_text.unwrap_or_else(|| Arc::new(TagStripper)),
            gate: self.gate,
            transports,
            defaults: Arc::new(DefaultPayloadState::from_settings(&self.settings.branding)),
            sender: self.settings.sender,
        }
    }
}
