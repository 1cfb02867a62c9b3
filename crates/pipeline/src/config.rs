//! Pipeline configuration.
//!
//! Constructed once at process start and passed by reference into each
//! component constructor. No process-wide globals.

use crate::error::{PipelineError, PipelineResult};

/// How marketplace (Gumroad/Payhip) webhook requests are authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketplaceAuthMode {
    /// Require the HMAC signature header. Default.
    SignatureOnly,
    /// Accept a body-embedded shared secret when the signature header is
    /// absent. Weaker; only for providers whose webhook UI cannot send
    /// custom headers.
    AllowBodySecret,
}

impl MarketplaceAuthMode {
    fn from_env() -> Self {
        match std::env::var("MARKETPLACE_AUTH_MODE").as_deref() {
            Ok("body-secret") => Self::AllowBodySecret,
            _ => Self::SignatureOnly,
        }
    }
}

/// Transactional email provider settings (Resend-style REST API).
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub from: String,
}

/// Telegram settings for chat invites and operator alerts.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    /// Private premium channel invites are issued for.
    pub channel_chat_id: Option<String>,
    /// Operator chat that receives sale/revocation alerts.
    pub alert_chat_id: Option<String>,
    pub api_base: String,
}

/// Everything the ingestion pipeline needs, loaded once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub stripe_webhook_secret: Option<String>,
    pub gumroad_secret: Option<String>,
    pub payhip_secret: Option<String>,
    pub marketplace_auth_mode: MarketplaceAuthMode,
    pub default_product_name: String,
    pub email: EmailConfig,
    pub telegram: TelegramConfig,
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset webhook secrets are kept as `None` so the corresponding adapter
    /// fails closed rather than accepting unsigned deliveries.
    pub fn from_env() -> PipelineResult<Self> {
        let email_from = std::env::var("EMAIL_FROM")
            .map_err(|_| PipelineError::Config("EMAIL_FROM not set".to_string()))?;

        Ok(Self {
            stripe_webhook_secret: env_opt("STRIPE_WEBHOOK_SECRET"),
            gumroad_secret: env_opt("GUMROAD_WEBHOOK_SECRET"),
            payhip_secret: env_opt("PAYHIP_WEBHOOK_SECRET"),
            marketplace_auth_mode: MarketplaceAuthMode::from_env(),
            default_product_name: std::env::var("DEFAULT_PRODUCT_NAME")
                .unwrap_or_else(|_| "Premium Access".to_string()),
            email: EmailConfig {
                api_key: env_opt("RESEND_API_KEY"),
                api_base: std::env::var("EMAIL_API_BASE")
                    .unwrap_or_else(|_| "https://api.resend.com".to_string()),
                from: email_from,
            },
            telegram: TelegramConfig {
                bot_token: env_opt("TELEGRAM_BOT_TOKEN"),
                channel_chat_id: env_opt("TELEGRAM_CHANNEL_CHAT_ID"),
                alert_chat_id: env_opt("TELEGRAM_ALERT_CHAT_ID"),
                api_base: std::env::var("TELEGRAM_API_BASE")
                    .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            },
        })
    }

    /// Webhook secret for the given provider, if configured.
    pub fn webhook_secret(&self, provider: crate::event::Provider) -> Option<&str> {
        use crate::event::Provider;
        match provider {
            Provider::Stripe => self.stripe_webhook_secret.as_deref(),
            Provider::Gumroad => self.gumroad_secret.as_deref(),
            Provider::Payhip => self.payhip_secret.as_deref(),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::event::Provider;

    const KEYS: &[&str] = &[
        "STRIPE_WEBHOOK_SECRET",
        "GUMROAD_WEBHOOK_SECRET",
        "PAYHIP_WEBHOOK_SECRET",
        "MARKETPLACE_AUTH_MODE",
        "DEFAULT_PRODUCT_NAME",
        "RESEND_API_KEY",
        "EMAIL_API_BASE",
        "EMAIL_FROM",
        "TELEGRAM_BOT_TOKEN",
        "TELEGRAM_CHANNEL_CHAT_ID",
        "TELEGRAM_ALERT_CHAT_ID",
        "TELEGRAM_API_BASE",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn missing_email_from_is_a_config_error() {
        clear_env();
        assert!(matches!(
            PipelineConfig::from_env(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    #[serial]
    fn unset_secrets_stay_none_and_defaults_apply() {
        clear_env();
        std::env::set_var("EMAIL_FROM", "Paygate <access@paygate.test>");
        std::env::set_var("GUMROAD_WEBHOOK_SECRET", "gum_secret");

        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.webhook_secret(Provider::Stripe), None);
        assert_eq!(config.webhook_secret(Provider::Gumroad), Some("gum_secret"));
        assert_eq!(config.webhook_secret(Provider::Payhip), None);
        assert_eq!(config.marketplace_auth_mode, MarketplaceAuthMode::SignatureOnly);
        assert_eq!(config.default_product_name, "Premium Access");
        assert_eq!(config.email.api_base, "https://api.resend.com");
    }

    #[test]
    #[serial]
    fn empty_secret_is_treated_as_unset() {
        clear_env();
        std::env::set_var("EMAIL_FROM", "access@paygate.test");
        std::env::set_var("STRIPE_WEBHOOK_SECRET", "");

        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.webhook_secret(Provider::Stripe), None);
    }

    #[test]
    #[serial]
    fn body_secret_mode_is_opt_in() {
        clear_env();
        std::env::set_var("EMAIL_FROM", "access@paygate.test");
        std::env::set_var("MARKETPLACE_AUTH_MODE", "body-secret");

        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(
            config.marketplace_auth_mode,
            MarketplaceAuthMode::AllowBodySecret
        );
    }
}
