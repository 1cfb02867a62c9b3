//! Notification dispatch.
//!
//! Wraps the transactional-email call and the Telegram side calls. Failures
//! are captured as result values and reported back to the orchestrator for
//! bookkeeping; nothing here retries, and nothing here fails a request.

use serde::Deserialize;
use serde_json::json;

use crate::config::{EmailConfig, TelegramConfig};

/// Outcome of a single dispatch attempt. The error string is persisted
/// verbatim in the notification record for operator diagnosis.
pub type DispatchResult<T = ()> = Result<T, String>;

#[derive(Clone)]
pub struct NotificationDispatcher {
    http: reqwest::Client,
    email: EmailConfig,
    telegram: TelegramConfig,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    result: Option<TelegramInviteLink>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramInviteLink {
    invite_link: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(email: EmailConfig, telegram: TelegramConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            email,
            telegram,
        }
    }

    /// Send the onboarding email. At most one attempt per accepted event.
    pub async fn send_access_email(
        &self,
        to: &str,
        product_name: &str,
        invite_link: Option<&str>,
    ) -> DispatchResult {
        let api_key = self
            .email
            .api_key
            .as_deref()
            .ok_or_else(|| "email provider not configured".to_string())?;

        let invite_section = match invite_link {
            Some(link) => format!(
                "<p>Join the private channel here: <a href=\"{link}\">{link}</a></p>"
            ),
            None => String::new(),
        };
        let html = format!(
            "<h2>Your {product_name} is ready</h2>\
             <p>Thanks for your purchase. Your access is now active.</p>\
             {invite_section}\
             <p>Reply to this email if anything looks off.</p>"
        );

        let response = self
            .http
            .post(format!("{}/emails", self.email.api_base))
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.email.from,
                "to": [to],
                "subject": format!("Your {product_name} access"),
                "html": html,
            }))
            .send()
            .await
            .map_err(|e| format!("email request failed: {e}"))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(format!("email provider returned {status}: {body}"))
        }
    }

    /// Issue a single-use invite link to the premium channel.
    pub async fn issue_chat_invite(&self) -> DispatchResult<String> {
        let (token, chat_id) = match (
            self.telegram.bot_token.as_deref(),
            self.telegram.channel_chat_id.as_deref(),
        ) {
            (Some(token), Some(chat_id)) => (token, chat_id),
            _ => return Err("telegram invite not configured".to_string()),
        };

        let response = self
            .http
            .post(format!(
                "{}/bot{}/createChatInviteLink",
                self.telegram.api_base, token
            ))
            .json(&json!({ "chat_id": chat_id, "member_limit": 1 }))
            .send()
            .await
            .map_err(|e| format!("telegram request failed: {e}"))?;

        let parsed: TelegramResponse = response
            .json()
            .await
            .map_err(|e| format!("telegram response unreadable: {e}"))?;

        if !parsed.ok {
            return Err(format!(
                "telegram error: {}",
                parsed.description.unwrap_or_else(|| "unknown".to_string())
            ));
        }
        parsed
            .result
            .and_then(|r| r.invite_link)
            .ok_or_else(|| "telegram response missing invite_link".to_string())
    }

    /// Best-effort operator alert. Callers log the result and move on.
    pub async fn operator_alert(&self, text: &str) -> DispatchResult {
        let (token, chat_id) = match (
            self.telegram.bot_token.as_deref(),
            self.telegram.alert_chat_id.as_deref(),
        ) {
            (Some(token), Some(chat_id)) => (token, chat_id),
            _ => return Err("telegram alerts not configured".to_string()),
        };

        let response = self
            .http
            .post(format!(
                "{}/bot{}/sendMessage",
                self.telegram.api_base, token
            ))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .map_err(|e| format!("telegram request failed: {e}"))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("telegram returned {}", response.status()))
        }
    }
}
