use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fully assembled outgoing message, ready for interception and transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique identifier for this message
    pub message_id: Uuid,
    /// When the envelope was assembled
    pub created_at: DateTime<Utc>,
    /// Destination address
    pub recipient_address: String,
    /// Address placed in the From header
    pub sender_address: String,
    /// Display name for the From header (may be empty)
    pub sender_display_name: String,
    /// Localized subject line
    pub subject: String,
    /// Localized HTML body
    pub html_body: String,
    /// Plaintext fallback. Derived from `html_body` at assembly time;
    /// only interceptors may replace it afterwards, and they own keeping
    /// both bodies consistent.
    pub plaintext_body: String,
    /// Logical template the body was rendered from
    pub template_name: String,
    /// Correlation metadata for tracing the message back to its cause
    pub correlation: CorrelationIds,
    /// The merged parameter bag the body was rendered with
    pub raw_params: serde_json::Value,
}

/// Identifiers correlating a message with the entities that caused it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationIds {
    /// Recipient identity the dispatch resolved, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    /// Content item the notification refers to (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_post_id: Option<String>,
    /// User whose action triggered the notification (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acting_user_id: Option<String>,
}

impl CorrelationIds {
    /// Pick correlation fields out of a parameter bag. String and numeric
    /// values are both accepted since callers pass ids in either form.
    pub fn from_params(params: &serde_json::Value) -> Self {
        Self {
            recipient_id: param_id(params, "recipient_id"),
            related_post_id: param_id(params, "related_post_id"),
            acting_user_id: param_id(params, "acting_user_id"),
        }
    }
}

fn param_id(params: &serde_json::Value, key: &str) -> Option<String> {
    match params.get(key) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

impl Envelope {
    /// Create a builder for an envelope
    pub fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::default()
    }

    /// From-header value: `"Display Name" <address>` when a display name is
    /// set, the bare address otherwise.
    pub fn formatted_sender(&self) -> String {
        if self.sender_display_name.is_empty() {
            self.sender_address.clone()
        } else {
            format!(
                "\"{}\" <{}>",
                self.sender_display_name.replace('"', ""),
                self.sender_address
            )
        }
    }
}

/// Builder for assembling envelopes
#[derive(Debug, Default)]
pub struct EnvelopeBuilder {
    recipient_address: String,
    sender_address: String,
    sender_display_name: String,
    subject: String,
    html_body: String,
    plaintext_body: String,
    template_name: String,
    correlation: CorrelationIds,
    raw_params: Option<serde_json::Value>,
}

impl EnvelopeBuilder {
    /// Set the destination address
    pub fn recipient(mut self, address: impl Into<String>) -> Self {
        self.recipient_address = address.into();
        self
    }

    /// Set the sender address and display name
    pub fn sender(mut self, address: impl Into<String>, display_name: impl Into<String>) -> Self {
        self.sender_address = address.into();
        self.sender_display_name = display_name.into();
        self
    }

    /// Set the subject line
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the HTML body
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html_body = html.into();
        self
    }

    /// Set the plaintext fallback body
    pub fn plaintext_body(mut self, text: impl Into<String>) -> Self {
        self.plaintext_body = text.into();
        self
    }

    /// Set the logical template name
    pub fn template_name(mut self, name: impl Into<String>) -> Self {
        self.template_name = name.into();
        self
    }

    /// Set the correlation metadata
    pub fn correlation(mut self, correlation: CorrelationIds) -> Self {
        self.correlation = correlation;
        self
    }

    /// Attach the parameter bag the body was rendered with
    pub fn raw_params(mut self, params: serde_json::Value) -> Self {
        self.raw_params = Some(params);
        self
    }

    /// Build the envelope
    pub fn build(self) -> Envelope {
        Envelope {
            message_id: Uuid::new_v4(),
            created_at: Utc::now(),
            recipient_address: self.recipient_address,
            sender_address: self.sender_address,
            sender_display_name: self.sender_display_name,
            subject: self.subject,
            html_body: self.html_body,
            plaintext_body: self.plaintext_body,
            template_name: self.template_name,
            correlation: self.correlation,
            raw_params: self.raw_params.unwrap_or(serde_json::Value::Null),
        }
    }
}
