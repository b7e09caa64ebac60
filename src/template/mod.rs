//! Template resolution with deployment overrides.
//!
//! A deployment may register replacement bodies for individual templates,
//! keyed by the template's base name. Resolution checks the override store
//! first and compiles the override directly against the params; otherwise
//! rendering is delegated to the external [`Renderer`]. The two paths are
//! substitutes for each other, not a fallback chain: a renderer failure
//! propagates instead of retrying the other path.

mod substitution;

pub use substitution::substitute;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("template render failed: {0}")]
    Render(String),
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Port for rendering a default (non-overridden) template.
///
/// Implemented by whatever produces the deployment's stock markup, usually
/// a web-application view layer. Receives the full namespaced template name.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, template_name: &str, params: &serde_json::Value)
        -> TemplateResult<String>;
}

/// Base name of a template: the namespace prefix up to the last `/` stripped.
/// Overrides are keyed by base name so `emails/welcome` and `welcome` refer
/// to the same override slot.
pub fn base_name(template_name: &str) -> &str {
    template_name
        .rsplit_once('/')
        .map_or(template_name, |(_, base)| base)
}

/// Resolves template names to HTML bodies
pub struct TemplateResolver {
    overrides: DashMap<String, String>,
    renderer: Arc<dyn Renderer>,
}

impl TemplateResolver {
    /// Create a resolver with no overrides
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            overrides: DashMap::new(),
            renderer,
        }
    }

    /// Create a resolver pre-loaded with overrides, keyed by base name
    pub fn with_overrides(renderer: Arc<dyn Renderer>, overrides: HashMap<String, String>) -> Self {
        let resolver = Self::new(renderer);
        for (name, body) in overrides {
            resolver.set_override(name, body);
        }
        resolver
    }

    /// Register or replace an override for a template
    pub fn set_override(&self, template_name: impl AsRef<str>, body: impl Into<String>) {
        let key = base_name(template_name.as_ref()).to_string();
        tracing::debug!(template = %key, "registered template override");
        self.overrides.insert(key, body.into());
    }

    /// Remove an override
    pub fn remove_override(&self, template_name: &str) {
        self.overrides.remove(base_name(template_name));
    }

    /// Whether an override is registered for a template
    pub fn has_override(&self, template_name: &str) -> bool {
        self.overrides.contains_key(base_name(template_name))
    }

    /// Resolve a template to an HTML body.
    ///
    /// With an override present the override body is compiled against the
    /// params and the external renderer is never consulted.
    pub async fn resolve(
        &self,
        template_name: &str,
        params: &serde_json::Value,
    ) -> TemplateResult<String> {
        if let Some(body) = self.overrides.get(base_name(template_name)) {
            return Ok(substitute(&body, params));
        }

        self.renderer.render(template_name, params).await
    }
}

/// In-memory renderer backed by registered default templates.
///
/// Rendering a template that has not been registered fails with
/// [`TemplateError::NotFound`].
pub struct StaticRenderer {
    templates: DashMap<String, String>,
}

impl Default for StaticRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticRenderer {
    /// Create an empty renderer
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    /// Register a default template body under its full namespaced name
    pub fn register(&self, template_name: impl Into<String>, body: impl Into<String>) {
        self.templates.insert(template_name.into(), body.into());
    }
}

#[async_trait]
impl Renderer for StaticRenderer {
    async fn render(
        &self,
        template_name: &str,
        params: &serde_json::Value,
    ) -> TemplateResult<String> {
        let body = self
            .templates
            .get(template_name)
            .ok_or_else(|| TemplateError::NotFound(template_name.to_string()))?;

        Ok(substitute(&body, params))
    }
}
