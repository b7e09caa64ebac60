use std::collections::HashMap;
use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub sender: SenderConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub localization: LocalizationConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub branding: BrandingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    /// Address placed in the From header of every outgoing message
    #[serde(default = "default_sender_address")]
    pub address: String,
    /// Human-readable display name for the From header
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TransportConfig {
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub sendmail: SendmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// When enabled, the authenticated relay becomes the fallback transport
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendmailConfig {
    /// Path to the local delivery agent binary
    #[serde(default = "default_sendmail_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LocalizationConfig {
    /// Language used when a recipient has no stored preference
    pub default_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TemplatesConfig {
    /// Deployment-supplied template bodies keyed by base template name
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrandingConfig {
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default)]
    pub site_title: String,
    #[serde(default)]
    pub logo: LogoConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogoConfig {
    /// Logo asset path or URL embedded in message headers
    #[serde(default)]
    pub src: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

fn default_sender_address() -> String {
    "no-reply@localhost".to_string()
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_sendmail_path() -> String {
    "/usr/sbin/sendmail".to_string()
}

fn default_site_url() -> String {
    "http://localhost".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("sender.address", "no-reply@localhost")?
            .set_default("transport.smtp.enabled", false)?
            .set_default("transport.smtp.host", "localhost")?
            .set_default("transport.smtp.port", 587)?
            .set_default("transport.sendmail.path", "/usr/sbin/sendmail")?
            .set_default("branding.site_url", "http://localhost")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SENDER_ADDRESS, TRANSPORT_SMTP_HOST, BRANDING_SITE_URL, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            address: default_sender_address(),
            display_name: String::new(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
        }
    }
}

impl Default for SendmailConfig {
    fn default() -> Self {
        Self {
            path: default_sendmail_path(),
        }
    }
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            site_title: String::new(),
            logo: LogoConfig::default(),
        }
    }
}
