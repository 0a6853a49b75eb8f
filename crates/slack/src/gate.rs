use std::sync::Arc;

use permbot_core::RateLimiter;
use serde_json::Value;
use tracing::{info, warn};

use crate::blocks::rate_limit_message;
use crate::transport::ChatTransport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Admitted,
    /// No identity on the event; let it through unmetered.
    Anonymous,
    RateLimited,
}

/// Per-event admission check run before any handler.
pub struct RequestGate {
    limiter: Arc<RateLimiter>,
    chat: Arc<dyn ChatTransport>,
}

impl RequestGate {
    pub fn new(limiter: Arc<RateLimiter>, chat: Arc<dyn ChatTransport>) -> Self {
        Self { limiter, chat }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn check(&self, identity: Option<&str>, channel: Option<&str>) -> GateDecision {
        let Some(identity) = identity.filter(|id| !id.is_empty()) else {
            warn!(event_name = "gate.identity_missing", "no user id found in request");
            return GateDecision::Anonymous;
        };

        if self.limiter.is_allowed(identity) {
            info!(
                event_name = "gate.admitted",
                user_id = identity,
                remaining = self.limiter.remaining_requests(identity),
                "processing request"
            );
            return GateDecision::Admitted;
        }

        warn!(
            event_name = "gate.rate_limited",
            user_id = identity,
            reset_at = %self.limiter.reset_time(identity),
            "rate limit exceeded"
        );

        if let Some(channel) = channel.filter(|id| !id.is_empty()) {
            if let Err(error) = self.chat.post_message(channel, &rate_limit_message()).await {
                warn!(
                    event_name = "gate.notice_failed",
                    user_id = identity,
                    channel_id = channel,
                    error = %error,
                    "failed to send rate limit message"
                );
            }
        }

        GateDecision::RateLimited
    }
}

/// Looks for the acting user at `user_id`, then `user.id`, then `event.user`.
pub fn extract_identity(body: &Value) -> Option<String> {
    first_non_empty(body, &["/user_id", "/user/id", "/event/user"])
}

/// Looks for the channel at `channel_id`, then `channel.id`, then `event.channel`.
pub fn extract_channel(body: &Value) -> Option<String> {
    first_non_empty(body, &["/channel_id", "/channel/id", "/event/channel"])
}

fn first_non_empty(body: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|pointer| body.pointer(pointer).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .map(str::to_owned)
}
