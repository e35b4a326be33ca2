//! Slack channel: posts to one fixed channel via the Web API `chat.postMessage`.

use async_trait::async_trait;
use fedbot_core::config::SlackConfig;
use fedbot_core::{FedBotError, Message, MessageFormat, Notifier, Result};
use serde::Deserialize;

/// Fallback text Slack shows in notifications for block messages.
const BLOCK_FALLBACK_TEXT: &str = "Alert";

/// Slack Web API notifier.
pub struct SlackNotifier {
    api_url: String,
    bot_token: String,
    channel: String,
    client: reqwest::Client,
}

/// Common envelope of every Slack Web API response.
#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig, timeout_secs: u64) -> Result<Self> {
        if config.bot_token.is_empty() {
            return Err(FedBotError::Config("Slack bot token is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            channel: config.channel.clone(),
            client,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_url, method)
    }
}

/// Request body for `chat.postMessage`.
pub fn post_message_body(channel: &str, message: &Message) -> serde_json::Value {
    match message.format {
        MessageFormat::Plain => serde_json::json!({
            "channel": channel,
            "text": message.text,
        }),
        MessageFormat::Block => serde_json::json!({
            "channel": channel,
            "text": BLOCK_FALLBACK_TEXT,
            "blocks": [{
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": message.text,
                }
            }]
        }),
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, message: &Message) -> Result<()> {
        let response = self
            .client
            .post(self.api_url("chat.postMessage"))
            .bearer_auth(&self.bot_token)
            .json(&post_message_body(&self.channel, message))
            .send()
            .await
            .map_err(|e| FedBotError::Notify(format!("chat.postMessage failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FedBotError::Notify(format!("Slack API error {status}: {body}")));
        }

        let result: SlackApiResponse = response
            .json()
            .await
            .map_err(|e| FedBotError::Notify(format!("Invalid Slack response: {e}")))?;

        if !result.ok {
            return Err(FedBotError::Notify(format!(
                "Slack rejected message: {}",
                result.error.unwrap_or_else(|| "unknown error".into())
            )));
        }

        tracing::debug!(
            "✅ Slack message posted to {} (ts {})",
            self.channel,
            result.ts.as_deref().unwrap_or("?")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_body() {
        let body = post_message_body("#fed-support", &Message::plain("hello"));
        assert_eq!(body["channel"], "#fed-support");
        assert_eq!(body["text"], "hello");
        assert!(body.get("blocks").is_none());
    }

    #[test]
    fn test_block_body() {
        let body = post_message_body("#fed-support", &Message::block("*bold* <!here>"));
        assert_eq!(body["text"], "Alert");
        let blocks = body["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["type"], "section");
        assert_eq!(blocks[0]["text"]["type"], "mrkdwn");
        assert_eq!(blocks[0]["text"]["text"], "*bold* <!here>");
    }

    #[test]
    fn test_response_parsing() {
        let ok: SlackApiResponse = serde_json::from_str(r#"{"ok":true,"ts":"1.2"}"#).unwrap();
        assert!(ok.ok);
        let err: SlackApiResponse =
            serde_json::from_str(r#"{"ok":false,"error":"channel_not_found"}"#).unwrap();
        assert!(!err.ok);
        assert_eq!(err.error.as_deref(), Some("channel_not_found"));
    }

    #[test]
    fn test_requires_token() {
        let config = SlackConfig::default();
        assert!(SlackNotifier::new(&config, 10).is_err());

        let config = SlackConfig {
            bot_token: "xoxb-1".into(),
            api_url: "https://slack.test/api/".into(),
            ..SlackConfig::default()
        };
        let notifier = SlackNotifier::new(&config, 10).unwrap();
        assert_eq!(notifier.api_url("chat.postMessage"), "https://slack.test/api/chat.postMessage");
    }
}
