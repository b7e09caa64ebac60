mod settings;

pub use settings::{
    BrandingConfig, LocalizationConfig, LogoConfig, SenderConfig, SendmailConfig, Settings,
    SmtpConfig, TemplatesConfig, TransportConfig,
};
