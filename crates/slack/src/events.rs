use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use permbot_core::ApplicationError;
use serde_json::Value;
use thiserror::Error;
use tracing::{info_span, warn, Instrument};

use crate::{
    blocks::error_message,
    commands::{
        admin::audit_log_notice, parse_command, BotCommand, CommandInvocation, CommandRouteError,
        CommandRouter, PermissionsAction, SlashCommandPayload,
    },
    gate::{extract_channel, extract_identity, GateDecision, RequestGate},
    transport::TransportError,
};

pub const RUN_COMMAND_PREFIX: &str = "run_command_";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    AppMention(MessageEvent),
    DirectMessage(MessageEvent),
    BlockAction(BlockActionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::AppMention(_) => SlackEventType::AppMention,
            Self::DirectMessage(_) => SlackEventType::DirectMessage,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        let user_id = match self {
            Self::SlashCommand(payload) => Some(payload.user_id.as_str()),
            Self::AppMention(event) | Self::DirectMessage(event) => event.user_id.as_deref(),
            Self::BlockAction(event) => Some(event.user_id.as_str()),
            Self::Unsupported { .. } => None,
        };
        user_id.filter(|id| !id.is_empty())
    }

    pub fn channel_id(&self) -> Option<&str> {
        let channel_id = match self {
            Self::SlashCommand(payload) => Some(payload.channel_id.as_str()),
            Self::AppMention(event) | Self::DirectMessage(event) => Some(event.channel_id.as_str()),
            Self::BlockAction(event) => event.channel_id.as_deref(),
            Self::Unsupported { .. } => None,
        };
        channel_id.filter(|id| !id.is_empty())
    }

    /// Slash command name or action id, for log context.
    pub fn command_label(&self) -> &str {
        match self {
            Self::SlashCommand(payload) => &payload.command,
            Self::AppMention(_) => "app_mention",
            Self::DirectMessage(_) => "direct_message",
            Self::BlockAction(event) => &event.action_id,
            Self::Unsupported { event_type } => event_type,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    AppMention,
    DirectMessage,
    BlockAction,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: Option<String>,
    pub text: String,
    pub ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: Option<String>,
    pub user_id: String,
    pub action_id: String,
    pub value: Option<String>,
}

/// Builds an event from an Events API `event_callback` body.
pub fn parse_event_callback(body: &Value) -> SlackEvent {
    let Some(event) = body.get("event") else {
        return SlackEvent::Unsupported { event_type: str_field(body, "type") };
    };

    let event_type = str_field(event, "type");
    let message = || MessageEvent {
        channel_id: extract_channel(body).unwrap_or_default(),
        user_id: extract_identity(body),
        text: str_field(event, "text"),
        ts: str_field(event, "ts"),
    };

    match event_type.as_str() {
        "app_mention" => SlackEvent::AppMention(message()),
        "message" if is_direct_message_from_human(event) => SlackEvent::DirectMessage(message()),
        _ => SlackEvent::Unsupported { event_type },
    }
}

fn is_direct_message_from_human(event: &Value) -> bool {
    event.get("channel_type").and_then(Value::as_str) == Some("im")
        && event.get("bot_id").is_none()
        && event.get("subtype").and_then(Value::as_str) != Some("bot_message")
}

/// Builds an event from an interactivity payload; only `block_actions` are understood.
pub fn parse_interaction(body: &Value) -> SlackEvent {
    let interaction_type = str_field(body, "type");
    if interaction_type != "block_actions" {
        return SlackEvent::Unsupported { event_type: interaction_type };
    }

    let Some(action) = body.get("actions").and_then(Value::as_array).and_then(|a| a.first()) else {
        return SlackEvent::Unsupported { event_type: interaction_type };
    };

    SlackEvent::BlockAction(BlockActionEvent {
        channel_id: extract_channel(body),
        user_id: extract_identity(body).unwrap_or_default(),
        action_id: str_field(action, "action_id"),
        value: action.get("value").and_then(Value::as_str).map(str::to_owned),
    })
}

pub fn parse_slash_command(body: &Value) -> SlackEvent {
    match serde_json::from_value::<SlashCommandPayload>(body.clone()) {
        Ok(payload) => SlackEvent::SlashCommand(payload),
        Err(_) => SlackEvent::Unsupported { event_type: "slash_commands".to_owned() },
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_str).unwrap_or_default().to_owned()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameParseError {
    #[error("socket frame is not valid json: {0}")]
    InvalidJson(String),
    #[error("socket envelope is missing envelope_id")]
    MissingEnvelopeId,
}

pub fn parse_socket_frame(text: &str) -> Result<SocketFrame, FrameParseError> {
    let frame: Value =
        serde_json::from_str(text).map_err(|error| FrameParseError::InvalidJson(error.to_string()))?;

    let frame_type = str_field(&frame, "type");
    match frame_type.as_str() {
        "hello" => return Ok(SocketFrame::Hello),
        "disconnect" => return Ok(SocketFrame::Disconnect { reason: str_field(&frame, "reason") }),
        _ => {}
    }

    let envelope_id = str_field(&frame, "envelope_id");
    if envelope_id.is_empty() {
        return Err(FrameParseError::MissingEnvelopeId);
    }

    let payload = frame.get("payload").cloned().unwrap_or(Value::Null);
    let event = match frame_type.as_str() {
        "events_api" => parse_event_callback(&payload),
        "slash_commands" => parse_slash_command(&payload),
        "interactive" => parse_interaction(&payload),
        _ => SlackEvent::Unsupported { event_type: frame_type },
    };

    Ok(SocketFrame::Envelope(SlackEnvelope { envelope_id, event }))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into() }
    }

    pub fn generated() -> Self {
        Self::new(format!("req-{:016x}", rand::random::<u64>()))
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
    RateLimited,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
    gate: Option<RequestGate>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gate(mut self, gate: RequestGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    /// Gates the event, then hands it to the handler for its type.
    ///
    /// Events without a handler skip the gate, so the bot's own messages never
    /// consume a rate-limit slot or trigger a notice.
    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let event = &envelope.event;
        let span = info_span!(
            "slack.dispatch",
            event_type = ?event.event_type(),
            command = event.command_label(),
            user_id = event.user_id().unwrap_or("-"),
            correlation_id = %ctx.correlation_id,
        );

        async move {
            let Some(handler) = self.handlers.get(&event.event_type()) else {
                return Ok(HandlerResult::Ignored);
            };

            if let Some(gate) = &self.gate {
                if gate.check(event.user_id(), event.channel_id()).await == GateDecision::RateLimited
                {
                    return Ok(HandlerResult::RateLimited);
                }
            }

            handler.handle(envelope, ctx).await.map_err(DispatchError::from)
        }
        .instrument(span)
        .await
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher wired to the command router with every bot handler registered.
pub fn bot_dispatcher(router: Arc<CommandRouter>, gate: RequestGate) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new().with_gate(gate);
    dispatcher.register(SlashCommandHandler::new(router.clone()));
    dispatcher.register(AppMentionHandler::new(router.clone()));
    dispatcher.register(DirectMessageHandler::new(router.clone()));
    dispatcher.register(BlockActionHandler::new(router));
    dispatcher
}

pub struct SlashCommandHandler {
    router: Arc<CommandRouter>,
}

impl SlashCommandHandler {
    pub fn new(router: Arc<CommandRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EventHandler for SlashCommandHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        match CommandInvocation::from_payload(payload, &ctx.correlation_id) {
            Ok(invocation) => {
                self.router.route(&invocation).await?;
            }
            Err(error) => {
                warn!(event_name = "command.unsupported", error = %error, "unsupported slash command");
                let interface = ApplicationError::from(error).into_interface(&ctx.correlation_id);
                let message = error_message(interface.user_message(), interface.correlation_id());
                self.router.services().post(&payload.channel_id, &message).await?;
            }
        }
        Ok(HandlerResult::Processed)
    }
}

/// Answers an `@mention` with the caller's menu.
pub struct AppMentionHandler {
    router: Arc<CommandRouter>,
}

impl AppMentionHandler {
    pub fn new(router: Arc<CommandRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EventHandler for AppMentionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AppMention
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AppMention(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        reply_with_menu(&self.router, event, ctx).await
    }
}

/// Answers any human direct message with the caller's menu.
pub struct DirectMessageHandler {
    router: Arc<CommandRouter>,
}

impl DirectMessageHandler {
    pub fn new(router: Arc<CommandRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EventHandler for DirectMessageHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::DirectMessage
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::DirectMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        reply_with_menu(&self.router, event, ctx).await
    }
}

async fn reply_with_menu(
    router: &CommandRouter,
    event: &MessageEvent,
    ctx: &EventContext,
) -> Result<HandlerResult, EventHandlerError> {
    let Some(user_id) = event.user_id.as_deref() else {
        return Ok(HandlerResult::Ignored);
    };

    let invocation =
        CommandInvocation::new(BotCommand::Menu, user_id, &event.channel_id, &ctx.correlation_id);
    router.route(&invocation).await?;
    Ok(HandlerResult::Processed)
}

/// Menu buttons and admin quick actions.
pub struct BlockActionHandler {
    router: Arc<CommandRouter>,
}

impl BlockActionHandler {
    pub fn new(router: Arc<CommandRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EventHandler for BlockActionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(channel_id) = event.channel_id.as_deref() else {
            return Ok(HandlerResult::Ignored);
        };

        let command = match event.action_id.as_str() {
            "admin_manage_users" => BotCommand::Users,
            "admin_manage_permissions" => BotCommand::Permissions(PermissionsAction::Overview),
            "admin_view_audit" => {
                self.router.services().post(channel_id, &audit_log_notice()).await?;
                return Ok(HandlerResult::Processed);
            }
            action_id => {
                let parsed = action_id
                    .strip_prefix(RUN_COMMAND_PREFIX)
                    .and_then(|name| parse_command(name, "").ok());
                match parsed {
                    Some(command) => command,
                    None => return Ok(HandlerResult::Ignored),
                }
            }
        };

        let invocation =
            CommandInvocation::new(command, &event.user_id, channel_id, &ctx.correlation_id);
        self.router.route(&invocation).await?;
        Ok(HandlerResult::Processed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use permbot_core::permissions::{ADMIN, READ_STATUS};
    use permbot_core::{ManualClock, RateLimiter};
    use serde_json::json;

    use super::{
        bot_dispatcher, parse_event_callback, parse_interaction, parse_socket_frame,
        BlockActionEvent, EventContext, EventDispatcher, FrameParseError, HandlerResult,
        MessageEvent, SlackEnvelope, SlackEvent, SocketFrame,
    };
    use crate::blocks::RATE_LIMIT_FALLBACK;
    use crate::commands::SlashCommandPayload;
    use crate::gate::RequestGate;
    use crate::menu::MENU_TITLE;
    use crate::testing::{harness, Harness, RecordingChat};

    fn dispatcher(h: &Harness, max_requests: u32) -> EventDispatcher {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let limiter = Arc::new(RateLimiter::with_clock(max_requests, 60, clock));
        bot_dispatcher(h.router.clone(), RequestGate::new(limiter, h.chat.clone()))
    }

    fn envelope(event: SlackEvent) -> SlackEnvelope {
        SlackEnvelope { envelope_id: "env-1".to_owned(), event }
    }

    fn slash(command: &str, text: &str) -> SlackEnvelope {
        envelope(SlackEvent::SlashCommand(SlashCommandPayload {
            command: command.to_owned(),
            text: text.to_owned(),
            user_id: "U1".to_owned(),
            channel_id: "C1".to_owned(),
            ..Default::default()
        }))
    }

    fn action(action_id: &str) -> SlackEnvelope {
        envelope(SlackEvent::BlockAction(BlockActionEvent {
            channel_id: Some("C1".to_owned()),
            user_id: "U1".to_owned(),
            action_id: action_id.to_owned(),
            value: None,
        }))
    }

    #[test]
    fn event_callbacks_classify_mentions_and_direct_messages() {
        let mention = parse_event_callback(&json!({
            "type": "event_callback",
            "event": { "type": "app_mention", "user": "U1", "channel": "C1", "text": "<@B1> hi", "ts": "1.2" }
        }));
        assert_eq!(
            mention,
            SlackEvent::AppMention(MessageEvent {
                channel_id: "C1".to_owned(),
                user_id: Some("U1".to_owned()),
                text: "<@B1> hi".to_owned(),
                ts: "1.2".to_owned(),
            })
        );

        let dm = parse_event_callback(&json!({
            "event": { "type": "message", "channel_type": "im", "user": "U1", "channel": "D1" }
        }));
        assert!(matches!(dm, SlackEvent::DirectMessage(_)));

        let bot = parse_event_callback(&json!({
            "event": { "type": "message", "channel_type": "im", "bot_id": "B1", "channel": "D1" }
        }));
        assert_eq!(bot, SlackEvent::Unsupported { event_type: "message".to_owned() });

        let subtype = parse_event_callback(&json!({
            "event": { "type": "message", "channel_type": "im", "subtype": "bot_message", "channel": "D1" }
        }));
        assert!(matches!(subtype, SlackEvent::Unsupported { .. }));

        let channel = parse_event_callback(&json!({
            "event": { "type": "message", "channel_type": "channel", "user": "U1", "channel": "C1" }
        }));
        assert!(matches!(channel, SlackEvent::Unsupported { .. }));
    }

    #[test]
    fn interactions_take_first_action() {
        let event = parse_interaction(&json!({
            "type": "block_actions",
            "user": { "id": "U1" },
            "channel": { "id": "C1" },
            "message": { "ts": "9.9" },
            "actions": [{ "action_id": "run_command_status", "value": "status" }]
        }));
        assert_eq!(
            event,
            SlackEvent::BlockAction(BlockActionEvent {
                channel_id: Some("C1".to_owned()),
                user_id: "U1".to_owned(),
                action_id: "run_command_status".to_owned(),
                value: Some("status".to_owned()),
            })
        );

        let modal = parse_interaction(&json!({ "type": "view_submission" }));
        assert_eq!(modal, SlackEvent::Unsupported { event_type: "view_submission".to_owned() });
    }

    #[test]
    fn socket_frames_parse_by_type() {
        assert_eq!(parse_socket_frame(r#"{"type":"hello"}"#), Ok(SocketFrame::Hello));
        assert_eq!(
            parse_socket_frame(r#"{"type":"disconnect","reason":"refresh_requested"}"#),
            Ok(SocketFrame::Disconnect { reason: "refresh_requested".to_owned() })
        );

        let frame = parse_socket_frame(
            r#"{"type":"slash_commands","envelope_id":"e-1","payload":{"command":"/status","user_id":"U1","channel_id":"C1"}}"#,
        )
        .expect("frame");
        let SocketFrame::Envelope(envelope) = frame else { panic!("expected envelope") };
        assert_eq!(envelope.envelope_id, "e-1");
        assert_eq!(envelope.event.user_id(), Some("U1"));
        assert_eq!(envelope.event.channel_id(), Some("C1"));

        assert_eq!(
            parse_socket_frame(r#"{"type":"events_api","payload":{}}"#),
            Err(FrameParseError::MissingEnvelopeId)
        );
        assert!(matches!(parse_socket_frame("not json"), Err(FrameParseError::InvalidJson(_))));
    }

    #[test]
    fn bot_dispatcher_registers_every_handler() {
        let h = harness(RecordingChat::default(), &[]);
        assert_eq!(dispatcher(&h, 10).handler_count(), 4);
    }

    #[tokio::test]
    async fn slash_command_is_routed() {
        let h = harness(RecordingChat::default(), &[]);
        h.grant("U1", &[READ_STATUS]);

        let result = dispatcher(&h, 10)
            .dispatch(&slash("/status", ""), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(h.chat.posts()[0].1.fallback_text, "📊 System Status");
    }

    #[tokio::test]
    async fn unsupported_slash_command_gets_error_card() {
        let h = harness(RecordingChat::default(), &[]);

        dispatcher(&h, 10)
            .dispatch(&slash("/quote", ""), &EventContext::new("req-42"))
            .await
            .expect("dispatch");

        let text = h.chat.post_texts().remove(0);
        assert!(text.contains("❌ *Error:* The request could not be processed."));
        assert!(text.contains("Correlation ID: req-42"));
    }

    #[tokio::test]
    async fn gate_stops_events_over_the_limit() {
        let h = harness(RecordingChat::default(), &[]);
        h.grant("U1", &[READ_STATUS]);
        let dispatcher = dispatcher(&h, 1);

        let first = dispatcher.dispatch(&slash("/status", ""), &EventContext::default()).await;
        let second = dispatcher.dispatch(&slash("/status", ""), &EventContext::default()).await;

        assert_eq!(first, Ok(HandlerResult::Processed));
        assert_eq!(second, Ok(HandlerResult::RateLimited));
        let posts = h.chat.posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].1.fallback_text, RATE_LIMIT_FALLBACK);
    }

    #[tokio::test]
    async fn unhandled_events_skip_the_gate() {
        let h = harness(RecordingChat::default(), &[]);
        let dispatcher = dispatcher(&h, 0);

        let result = dispatcher
            .dispatch(
                &envelope(SlackEvent::Unsupported { event_type: "message".to_owned() }),
                &EventContext::default(),
            )
            .await;

        assert_eq!(result, Ok(HandlerResult::Ignored));
        assert!(h.chat.posts().is_empty());
    }

    #[tokio::test]
    async fn mention_and_direct_message_reply_with_menu() {
        let h = harness(RecordingChat::default(), &[]);
        let dispatcher = dispatcher(&h, 10);
        let message = MessageEvent {
            channel_id: "D1".to_owned(),
            user_id: Some("U1".to_owned()),
            text: "hi".to_owned(),
            ts: "1.0".to_owned(),
        };

        for event in [SlackEvent::AppMention(message.clone()), SlackEvent::DirectMessage(message)] {
            let result = dispatcher.dispatch(&envelope(event), &EventContext::default()).await;
            assert_eq!(result, Ok(HandlerResult::Processed));
        }

        let posts = h.chat.posts();
        assert_eq!(posts.len(), 2);
        assert!(posts.iter().all(|(channel, message)| channel == "D1" && message.fallback_text == MENU_TITLE));
    }

    #[tokio::test]
    async fn run_command_buttons_route_to_the_command() {
        let h = harness(RecordingChat::default(), &[]);
        h.grant("U1", &[READ_STATUS]);

        let result = dispatcher(&h, 10)
            .dispatch(&action("run_command_health"), &EventContext::default())
            .await;

        assert_eq!(result, Ok(HandlerResult::Processed));
        assert_eq!(h.chat.posts()[0].1.fallback_text, "💚 Health Check");
    }

    #[tokio::test]
    async fn admin_quick_actions_are_answered() {
        let h = harness(RecordingChat::default(), &[]);
        h.grant("U1", &[ADMIN]);
        let dispatcher = dispatcher(&h, 10);

        for action_id in ["admin_manage_users", "admin_manage_permissions", "admin_view_audit"] {
            dispatcher.dispatch(&action(action_id), &EventContext::default()).await.expect("dispatch");
        }

        let texts = h.chat.post_texts();
        assert!(texts[0].starts_with("👥 User Management"));
        assert_eq!(texts[1], "❌ You don't have permission to manage permissions");
        assert!(texts[2].starts_with("📊 *Audit Log*"));
    }

    #[tokio::test]
    async fn unknown_actions_are_ignored() {
        let h = harness(RecordingChat::default(), &[]);

        let result = dispatcher(&h, 10)
            .dispatch(&action("run_command_launch_rockets"), &EventContext::default())
            .await;

        assert_eq!(result, Ok(HandlerResult::Ignored));
        assert!(h.chat.posts().is_empty());
    }
}
