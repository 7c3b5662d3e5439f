// Telegram Bot API messaging client. It deliberately exposes only the calls
// the core layer needs, plus the update long-poll used by the composition
// root.
//
// Delivery outcomes map onto the dispatcher's vocabulary:
// - ok responses -> Delivered
// - 403 (bot blocked / chat deleted) -> RecipientUnreachable
// - 429 with retry_after -> RateLimited
// - everything else -> TransportError

use crate::core::dispatch::{DeliveryResult, Messenger};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            // Longer than the getUpdates long-poll window
            .timeout(Duration::from_secs(40))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("https://api.telegram.org/bot{token}"),
        })
    }

    /// Long-poll for incoming updates. Only the composition root calls this;
    /// it is not part of the `Messenger` port.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<TgUpdate>, reqwest::Error> {
        let url = format!("{}/getUpdates", self.base_url);
        let resp: UpdatesResponse = self
            .client
            .get(url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout_secs.to_string()),
            ])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp.result.unwrap_or_default())
    }

    async fn call_method(&self, method: &str, body: serde_json::Value) -> DeliveryResult {
        let url = format!("{}/{}", self.base_url, method);
        let resp = match self.client.post(url).json(&body).send().await {
            Ok(resp) => resp,
            Err(err) => return DeliveryResult::TransportError(err.to_string()),
        };

        let status = resp.status();
        match resp.json::<ApiResponse>().await {
            Ok(api) => Self::map_response(status, api),
            Err(err) => DeliveryResult::TransportError(err.to_string()),
        }
    }

    fn map_response(status: StatusCode, api: ApiResponse) -> DeliveryResult {
        if api.ok {
            return DeliveryResult::Delivered;
        }

        let retry_after = api.parameters.and_then(|p| p.retry_after);
        if status == StatusCode::TOO_MANY_REQUESTS || retry_after.is_some() {
            return DeliveryResult::RateLimited(Duration::from_secs(retry_after.unwrap_or(1)));
        }

        if status == StatusCode::FORBIDDEN {
            // "Forbidden: bot was blocked by the user", "user is deactivated"
            return DeliveryResult::RecipientUnreachable;
        }

        DeliveryResult::TransportError(
            api.description
                .unwrap_or_else(|| format!("Telegram returned {status}")),
        )
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(&self, recipient_id: i64, text: &str) -> DeliveryResult {
        self.call_method(
            "sendMessage",
            json!({ "chat_id": recipient_id, "text": text }),
        )
        .await
    }

    async fn send_photo(
        &self,
        recipient_id: i64,
        photo_ref: &str,
        caption: &str,
    ) -> DeliveryResult {
        self.call_method(
            "sendPhoto",
            json!({ "chat_id": recipient_id, "photo": photo_ref, "caption": caption }),
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    #[allow(dead_code)]
    ok: bool,
    result: Option<Vec<TgUpdate>>,
}

/// One incoming update, trimmed to the fields the chat-policing loop needs.
#[derive(Debug, Deserialize)]
pub struct TgUpdate {
    pub update_id: i64,
    pub message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TgMessage {
    pub chat: TgChat,
    pub from: Option<TgUser>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TgUser {
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(body: &str) -> ApiResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn ok_response_is_delivered() {
        let result = TelegramClient::map_response(
            StatusCode::OK,
            api(r#"{"ok":true,"result":{"message_id":1}}"#),
        );
        assert_eq!(result, DeliveryResult::Delivered);
    }

    #[test]
    fn blocked_bot_is_recipient_unreachable() {
        let result = TelegramClient::map_response(
            StatusCode::FORBIDDEN,
            api(r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#),
        );
        assert_eq!(result, DeliveryResult::RecipientUnreachable);
    }

    #[test]
    fn flood_limit_maps_to_rate_limited_with_retry_after() {
        let result = TelegramClient::map_response(
            StatusCode::TOO_MANY_REQUESTS,
            api(r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#),
        );
        assert_eq!(
            result,
            DeliveryResult::RateLimited(Duration::from_secs(7))
        );
    }

    #[test]
    fn other_failures_are_transport_errors() {
        let result = TelegramClient::map_response(
            StatusCode::BAD_REQUEST,
            api(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#),
        );
        assert_eq!(
            result,
            DeliveryResult::TransportError("Bad Request: chat not found".to_string())
        );
    }

    #[test]
    fn updates_payload_deserializes() {
        let resp: UpdatesResponse = serde_json::from_str(
            r#"{"ok":true,"result":[{"update_id":5,"message":{"message_id":1,"chat":{"id":42},"from":{"id":99},"text":"привет"}}]}"#,
        )
        .unwrap();
        let updates = resp.result.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 5);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.from.as_ref().unwrap().id, 99);
        assert_eq!(message.text.as_deref(), Some("привет"));
    }
}
