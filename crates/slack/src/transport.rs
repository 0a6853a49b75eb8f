//! Slack Web API access.
//!
//! [`ChatTransport`] is the narrow surface command handlers talk to; the
//! [`SlackWebClient`] implementation speaks HTTPS to `slack.com/api`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::blocks::MessageTemplate;

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("slack request failed: {0}")]
    Request(String),
    #[error("slack api `{method}` returned error `{error}`")]
    Api { method: String, error: String },
    #[error("could not decode slack response: {0}")]
    Decode(String),
}

/// Location of a posted message, used to edit it later.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRef {
    pub channel: String,
    pub ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

impl SlackUser {
    pub fn unknown(id: &str) -> Self {
        Self { id: id.to_owned(), name: "unknown".to_owned(), email: None }
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<MessageRef, TransportError>;

    async fn update_message(
        &self,
        message_ref: &MessageRef,
        message: &MessageTemplate,
    ) -> Result<(), TransportError>;

    async fn user_info(&self, user_id: &str) -> Result<SlackUser, TransportError>;
}

/// Discards every message. Used by operator tooling that renders locally.
#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn post_message(
        &self,
        channel: &str,
        _message: &MessageTemplate,
    ) -> Result<MessageRef, TransportError> {
        Ok(MessageRef { channel: channel.to_owned(), ts: "0000000000.000000".to_owned() })
    }

    async fn update_message(
        &self,
        _message_ref: &MessageRef,
        _message: &MessageTemplate,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn user_info(&self, user_id: &str) -> Result<SlackUser, TransportError> {
        Ok(SlackUser::unknown(user_id))
    }
}

#[derive(Clone)]
pub struct SlackWebClient {
    client: Client,
    base_url: String,
    bot_token: SecretString,
    app_token: Option<SecretString>,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        Ok(Self { client, base_url: DEFAULT_API_BASE_URL.to_owned(), bot_token, app_token: None })
    }

    pub fn with_app_token(mut self, app_token: SecretString) -> Self {
        self.app_token = Some(app_token);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Requests a fresh Socket Mode websocket URL via `apps.connections.open`.
    pub async fn open_socket_url(&self) -> Result<String, TransportError> {
        let app_token = self.app_token.as_ref().ok_or_else(|| {
            TransportError::Connect("socket mode requires an app-level token".to_owned())
        })?;

        let response = self
            .client
            .post(self.endpoint("apps.connections.open"))
            .bearer_auth(app_token.expose_secret())
            .send()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let body = read_api_body("apps.connections.open", response).await?;

        body.get("url")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| TransportError::Decode("apps.connections.open returned no url".to_owned()))
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn post_json(&self, method: &str, payload: Value) -> Result<Value, TransportError> {
        debug!(event_name = "egress.slack.request", method, "calling slack web api");
        let response = self
            .client
            .post(self.endpoint(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|error| TransportError::Request(error.to_string()))?;

        read_api_body(method, response).await
    }
}

#[async_trait]
impl ChatTransport for SlackWebClient {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<MessageRef, TransportError> {
        let body = self.post_json("chat.postMessage", message_payload(channel, None, message)).await?;

        let ts = body
            .get("ts")
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::Decode("chat.postMessage returned no ts".to_owned()))?;
        let channel = body.get("channel").and_then(Value::as_str).unwrap_or(channel);

        Ok(MessageRef { channel: channel.to_owned(), ts: ts.to_owned() })
    }

    async fn update_message(
        &self,
        message_ref: &MessageRef,
        message: &MessageTemplate,
    ) -> Result<(), TransportError> {
        let payload = message_payload(&message_ref.channel, Some(&message_ref.ts), message);
        self.post_json("chat.update", payload).await.map(|_| ())
    }

    async fn user_info(&self, user_id: &str) -> Result<SlackUser, TransportError> {
        let response = self
            .client
            .get(self.endpoint("users.info"))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("user", user_id)])
            .send()
            .await
            .map_err(|error| TransportError::Request(error.to_string()))?;
        let body = read_api_body("users.info", response).await?;

        let user: UserInfoBody = serde_json::from_value(
            body.get("user").cloned().unwrap_or(Value::Null),
        )
        .map_err(|error| TransportError::Decode(error.to_string()))?;

        Ok(SlackUser {
            id: user.id,
            name: user.name.unwrap_or_else(|| "unknown".to_owned()),
            email: user.profile.and_then(|profile| profile.email),
        })
    }
}

#[derive(Deserialize)]
struct UserInfoBody {
    id: String,
    name: Option<String>,
    profile: Option<UserProfileBody>,
}

#[derive(Deserialize)]
struct UserProfileBody {
    email: Option<String>,
}

fn message_payload(channel: &str, ts: Option<&str>, message: &MessageTemplate) -> Value {
    let mut payload = json!({
        "channel": channel,
        "text": message.fallback_text,
    });
    if !message.blocks.is_empty() {
        payload["blocks"] = serde_json::to_value(&message.blocks).unwrap_or(Value::Null);
    }
    if let Some(ts) = ts {
        payload["ts"] = Value::String(ts.to_owned());
    }
    payload
}

async fn read_api_body(method: &str, response: reqwest::Response) -> Result<Value, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Request(format!("{method} returned http {status}")));
    }

    let body: Value =
        response.json().await.map_err(|error| TransportError::Decode(error.to_string()))?;
    check_api_ok(method, body)
}

fn check_api_ok(method: &str, body: Value) -> Result<Value, TransportError> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(body);
    }

    let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error").to_owned();
    Err(TransportError::Api { method: method.to_owned(), error })
}
