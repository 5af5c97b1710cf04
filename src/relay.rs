//! One request/response cycle against a Chat Completions endpoint.
//!
//! [`CompletionRelay::generate_response`] never fails: every outcome is turned
//! into a display string by [`render_outcome`]. The typed path is
//! [`CompletionRelay::try_generate`].

use std::sync::Arc;

use serde::Deserialize;

use crate::credentials::CredentialRotator;
use crate::error::{render_outcome, RelayError};
use crate::models::chat::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::relay_config::RelayConfig;

pub struct CompletionRelay {
    http: reqwest::Client,
    credentials: Arc<CredentialRotator>,
    config: RelayConfig,
}

impl CompletionRelay {
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<CredentialRotator>,
        config: RelayConfig,
    ) -> Self {
        Self {
            http,
            credentials,
            config,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialRotator {
        &self.credentials
    }

    /// Send `user_message` after `history` and return the reply text or a fallback string.
    pub async fn generate_response(&self, user_message: &str, history: &[ChatMessage]) -> String {
        let outcome = self.try_generate(user_message, history).await;
        if let Err(e) = &outcome {
            tracing::error!(error = %e, fallback = ?e.fallback(), "relay: OpenAI API call failed");
        }
        render_outcome(outcome)
    }

    /// Typed variant of [`generate_response`](Self::generate_response).
    ///
    /// Advances the credential cursor once before any network activity.
    pub async fn try_generate(
        &self,
        user_message: &str,
        history: &[ChatMessage],
    ) -> Result<String, RelayError> {
        let api_key = self.credentials.next_credential()?;

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: build_messages(history, user_message),
            max_tokens: Some(self.config.max_tokens),
        };

        tracing::debug!(
            endpoint = %self.config.endpoint,
            model = %request.model,
            turns = request.messages.len(),
            "relay: sending chat completion request"
        );

        let resp = self
            .http
            .post(&self.config.endpoint)
            .header(http::header::CONTENT_TYPE, "application/json")
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RelayError::UpstreamStatus(status));
        }

        let bytes = resp.bytes().await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        tracing::debug!(response = %body, "Response from OpenAI API");

        extract_reply(body).ok_or(RelayError::MalformedProviderResponse)
    }
}

/// Fresh message list: the caller's history followed by the new user turn.
pub fn build_messages(history: &[ChatMessage], user_message: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(user_message));
    messages
}

/// Content of the first choice, or `None` when the JSON does not have that shape.
fn extract_reply(body: serde_json::Value) -> Option<String> {
    ChatCompletionResponse::deserialize(body)
        .ok()?
        .first_content()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use serde_json::json;

    #[test]
    fn build_messages_appends_user_turn_without_touching_history() {
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let msgs = build_messages(&history, "how are you?");
        assert_eq!(history.len(), 2);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[..2], history[..]);
        assert_eq!(msgs[2].role, Role::User);
        assert_eq!(msgs[2].content, "how are you?");
    }

    #[test]
    fn build_messages_accepts_empty_input() {
        let msgs = build_messages(&[], "");
        assert_eq!(msgs, vec![ChatMessage::user("")]);
    }

    #[test]
    fn extract_reply_verbatim() {
        let body = json!({"choices": [{"message": {"content": "  Hello!\n"}}]});
        assert_eq!(extract_reply(body).as_deref(), Some("  Hello!\n"));
    }

    #[test]
    fn extract_reply_ignores_malformed_later_choices() {
        let body = json!({"choices": [
            {"message": {"role": "assistant", "content": "Hi there"}},
            {"message": {"content": [{"type": "text", "text": "alt"}]}}
        ]});
        assert_eq!(extract_reply(body).as_deref(), Some("Hi there"));

        let body = json!({"choices": [{"message": {"content": "Hi there"}}, null]});
        assert_eq!(extract_reply(body).as_deref(), Some("Hi there"));
    }

    #[test]
    fn extract_reply_rejects_unexpected_shapes() {
        for body in [
            json!([]),
            json!("text"),
            json!({"choices": "nope"}),
            json!({"choices": []}),
            json!({"choices": [{"message": {"content": 42}}]}),
        ] {
            assert_eq!(extract_reply(body.clone()), None, "body: {body}");
        }
    }

    #[tokio::test]
    async fn no_credentials_yields_generic_reply_without_network() {
        let relay = CompletionRelay::new(
            reqwest::Client::new(),
            Arc::new(CredentialRotator::new(vec![])),
            RelayConfig {
                endpoint: "http://127.0.0.1:9/v1/chat/completions".into(),
                ..RelayConfig::default()
            },
        );
        let err = relay.try_generate("Hello", &[]).await.unwrap_err();
        assert!(matches!(err, RelayError::Credentials(_)));
        assert_eq!(
            relay.generate_response("Hello", &[]).await,
            "An error occurred while processing your request."
        );
    }
}
