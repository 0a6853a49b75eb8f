//! HTTP-mode Slack endpoints: slash commands, Events API and interactivity.
//!
//! Every route sits behind request signature verification. Requests are
//! acknowledged as soon as they parse and the event is dispatched on a
//! background task, keeping replies inside Slack's three second deadline.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use chrono::Utc;
use permbot_slack::commands::SlashCommandPayload;
use permbot_slack::events::{
    parse_event_callback, parse_interaction, EventContext, EventDispatcher, SlackEnvelope,
    SlackEvent,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::signing::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct SlackHttpState {
    dispatcher: Arc<EventDispatcher>,
    signing_secret: SecretString,
}

impl SlackHttpState {
    pub fn new(dispatcher: Arc<EventDispatcher>, signing_secret: SecretString) -> Self {
        Self { dispatcher, signing_secret }
    }

    fn spawn_dispatch(&self, event: SlackEvent, ctx: EventContext) {
        let dispatcher = self.dispatcher.clone();
        let envelope = SlackEnvelope { envelope_id: ctx.correlation_id.clone(), event };

        tokio::spawn(async move {
            if let Err(error) = dispatcher.dispatch(&envelope, &ctx).await {
                warn!(
                    event_name = "slack.http.dispatch_failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "event dispatch failed"
                );
            }
        });
    }
}

pub fn router(state: SlackHttpState) -> Router {
    Router::new()
        .route("/slack/commands", post(slash_command))
        .route("/slack/events", post(events))
        .route("/slack/interactions", post(interactions))
        .layer(middleware::from_fn_with_state(state.clone(), verify_slack_signature))
        .with_state(state)
}

async fn verify_slack_signature(
    State(state): State<SlackHttpState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(event_name = "slack.http.body_rejected", error = %error, "could not read request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let verdict = signing::verify(
        state.signing_secret.expose_secret(),
        header(&parts.headers, TIMESTAMP_HEADER),
        header(&parts.headers, SIGNATURE_HEADER),
        &bytes,
        Utc::now().timestamp(),
    );
    if let Err(error) = verdict {
        warn!(
            event_name = "slack.http.signature_rejected",
            path = %parts.uri.path(),
            error = %error,
            "rejected slack request"
        );
        return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

async fn slash_command(
    State(state): State<SlackHttpState>,
    Form(payload): Form<SlashCommandPayload>,
) -> StatusCode {
    state.spawn_dispatch(SlackEvent::SlashCommand(payload), EventContext::generated());
    StatusCode::OK
}

async fn events(State(state): State<SlackHttpState>, body: Bytes) -> Response {
    let Ok(body) = serde_json::from_slice::<Value>(&body) else {
        return (StatusCode::BAD_REQUEST, "body is not json").into_response();
    };

    match body.get("type").and_then(Value::as_str) {
        Some("url_verification") => {
            Json(json!({ "challenge": body.get("challenge").cloned().unwrap_or(Value::Null) }))
                .into_response()
        }
        Some("event_callback") => {
            let ctx = match body.get("event_id").and_then(Value::as_str) {
                Some(event_id) if !event_id.is_empty() => EventContext::new(event_id),
                _ => EventContext::generated(),
            };
            state.spawn_dispatch(parse_event_callback(&body), ctx);
            StatusCode::OK.into_response()
        }
        other => {
            debug!(event_name = "slack.http.ignored", request_type = ?other, "ignored events api request");
            StatusCode::OK.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct InteractionForm {
    payload: String,
}

async fn interactions(
    State(state): State<SlackHttpState>,
    Form(form): Form<InteractionForm>,
) -> StatusCode {
    let Ok(payload) = serde_json::from_str::<Value>(&form.payload) else {
        return StatusCode::BAD_REQUEST;
    };
    state.spawn_dispatch(parse_interaction(&payload), EventContext::generated());
    StatusCode::OK
}
