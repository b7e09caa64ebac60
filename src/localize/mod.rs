//! Localization of rendered text.
//!
//! Translation is delegated to the [`Translator`] collaborator, which is
//! best-effort by contract: it always yields a usable string (possibly the
//! untranslated input) and never fails the pipeline.

use std::sync::Arc;

use async_trait::async_trait;

/// Locale used when nothing else resolves
pub const BASELINE_LANGUAGE: &str = "en-US";

/// Port for translating rendered text into a target language.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `lang`. Implementations return the input
    /// unchanged when no translation applies.
    async fn translate(&self, text: &str, lang: &str) -> String;
}

/// Translator that returns its input unchanged
pub struct EchoTranslator;

#[async_trait]
impl Translator for EchoTranslator {
    async fn translate(&self, text: &str, _lang: &str) -> String {
        text.to_string()
    }
}

/// Wraps rendered text through the translator for a resolved language.
pub struct LocalizationStep {
    translator: Arc<dyn Translator>,
    default_language: Option<String>,
}

impl LocalizationStep {
    pub fn new(translator: Arc<dyn Translator>, default_language: Option<String>) -> Self {
        Self {
            translator,
            default_language: default_language.and_then(normalize_tag),
        }
    }

    /// Resolve the language for a dispatch.
    ///
    /// Order: explicit argument, recipient's stored preference, configured
    /// default, then the hardcoded baseline.
    pub fn resolve_language(&self, explicit: Option<&str>, preference: Option<&str>) -> String {
        explicit
            .and_then(|l| normalize_tag(l.to_string()))
            .or_else(|| preference.and_then(|l| normalize_tag(l.to_string())))
            .or_else(|| self.default_language.clone())
            .unwrap_or_else(|| BASELINE_LANGUAGE.to_string())
    }

    /// Translate a piece of rendered text
    pub async fn localize(&self, text: &str, lang: &str) -> String {
        self.translator.translate(text, lang).await
    }
}

/// Trim a language tag, discarding empty values
fn normalize_tag(tag: String) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
