//! Slash command parsing, routing and per-command handlers.
//!
//! Every handler speaks to Slack through [`ChatTransport`] only, so the same
//! router serves both HTTP and Socket Mode deliveries. Permission checks go
//! through the shared [`PermissionManager`]; a denied command posts a fixed
//! notice and returns successfully.

pub mod admin;
pub mod dev;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use permbot_core::permissions::{ADMIN_BUNDLE, READ_STATUS};
use permbot_core::{
    ApplicationError, CommandRegistry, DomainError, PermissionManager, PermissionOracle,
    UserManager,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::blocks::{error_message, MessageTemplate};
use crate::menu::MenuBuilder;
use crate::transport::{ChatTransport, MessageRef, SlackUser, TransportError};

use self::status::SystemProbe;

/// Form body Slack sends to a slash command endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub user_name: String,
    pub channel_id: String,
    pub trigger_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Menu,
    Help,
    Status,
    Health,
    Deploy,
    Build,
    Logs,
    Admin,
    Permissions(PermissionsAction),
    Users,
}

impl BotCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Help => "help",
            Self::Status => "status",
            Self::Health => "health",
            Self::Deploy => "deploy",
            Self::Build => "build",
            Self::Logs => "logs",
            Self::Admin => "admin",
            Self::Permissions(_) => "permissions",
            Self::Users => "users",
        }
    }

    /// Plain-text notice posted when the handler itself fails.
    fn failure_text(&self) -> Option<&'static str> {
        match self {
            Self::Menu | Self::Help => None,
            Self::Status => Some("❌ Failed to get system status"),
            Self::Health => Some("❌ Failed to get health status"),
            Self::Deploy => Some("❌ Deployment failed"),
            Self::Build => Some("❌ Build failed"),
            Self::Logs => Some("❌ Failed to retrieve logs"),
            Self::Admin => Some("❌ Failed to load admin panel"),
            Self::Permissions(_) => Some("❌ Failed to manage permissions"),
            Self::Users => Some("❌ Failed to load user information"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermissionsAction {
    Overview,
    Grant { user_id: String, permission: String },
    Revoke { user_id: String, permission: String },
    Usage,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

impl From<CommandParseError> for ApplicationError {
    fn from(value: CommandParseError) -> Self {
        match value {
            CommandParseError::UnsupportedCommand(name) => {
                ApplicationError::Domain(DomainError::UnknownCommand(name))
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<CommandRouteError> for ApplicationError {
    fn from(value: CommandRouteError) -> Self {
        match value {
            CommandRouteError::Transport(error) => ApplicationError::Integration(error.to_string()),
        }
    }
}

/// Accepts `/status`, `status` and any casing of either.
pub fn parse_command(command: &str, text: &str) -> Result<BotCommand, CommandParseError> {
    let name = command.trim().trim_start_matches('/').to_ascii_lowercase();
    let parsed = match name.as_str() {
        "menu" => BotCommand::Menu,
        "help" => BotCommand::Help,
        "status" => BotCommand::Status,
        "health" => BotCommand::Health,
        "deploy" => BotCommand::Deploy,
        "build" => BotCommand::Build,
        "logs" => BotCommand::Logs,
        "admin" => BotCommand::Admin,
        "permissions" => BotCommand::Permissions(parse_permissions_action(text)),
        "users" => BotCommand::Users,
        _ => return Err(CommandParseError::UnsupportedCommand(command.trim().to_owned())),
    };
    Ok(parsed)
}

fn parse_permissions_action(text: &str) -> PermissionsAction {
    let args: Vec<&str> = text.split_whitespace().collect();
    if args.is_empty() {
        return PermissionsAction::Overview;
    }
    if args.len() < 3 {
        return PermissionsAction::Usage;
    }

    let user_id = normalize_user_target(args[1]);
    let permission = args[2].to_owned();
    match args[0].to_ascii_lowercase().as_str() {
        "grant" => PermissionsAction::Grant { user_id, permission },
        "revoke" => PermissionsAction::Revoke { user_id, permission },
        _ => PermissionsAction::Usage,
    }
}

/// Reduces `<@U123|name>`, `<@U123>` and `@U123` to `U123`.
pub fn normalize_user_target(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = trimmed.strip_prefix('<').and_then(|rest| rest.strip_suffix('>')).unwrap_or(trimmed);
    let inner = inner.strip_prefix('@').unwrap_or(inner);
    inner.split('|').next().unwrap_or(inner).to_owned()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    pub command: BotCommand,
    pub user_id: String,
    pub channel_id: String,
    pub correlation_id: String,
}

impl CommandInvocation {
    pub fn new(
        command: BotCommand,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            command,
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            correlation_id: correlation_id.into(),
        }
    }

    pub fn from_payload(
        payload: &SlashCommandPayload,
        correlation_id: impl Into<String>,
    ) -> Result<Self, CommandParseError> {
        let command = parse_command(&payload.command, &payload.text)?;
        Ok(Self::new(command, &payload.user_id, &payload.channel_id, correlation_id))
    }
}

/// Shared state every command handler reads from.
#[derive(Clone)]
pub struct BotServices {
    pub chat: Arc<dyn ChatTransport>,
    pub permissions: Arc<PermissionManager>,
    pub registry: Arc<CommandRegistry>,
    pub users: Arc<UserManager>,
    pub probe: Arc<dyn SystemProbe>,
    pub admin_users: Vec<String>,
    pub deploy_step_delay: Duration,
}

impl BotServices {
    pub(crate) fn allows(&self, user_id: &str, permission: &str) -> bool {
        self.permissions.check(user_id, permission)
    }

    pub(crate) async fn post(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<MessageRef, TransportError> {
        self.chat.post_message(channel_id, message).await
    }

    pub(crate) async fn post_text(
        &self,
        channel_id: &str,
        text: impl Into<String>,
    ) -> Result<MessageRef, TransportError> {
        self.chat.post_message(channel_id, &MessageTemplate::text(text)).await
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_users.iter().any(|admin| admin == user_id)
    }
}

pub struct CommandRouter {
    services: BotServices,
    menu: MenuBuilder,
}

impl CommandRouter {
    pub fn new(services: BotServices) -> Self {
        let menu = MenuBuilder::new(services.registry.clone());
        Self { services, menu }
    }

    pub fn services(&self) -> &BotServices {
        &self.services
    }

    pub fn menu(&self) -> &MenuBuilder {
        &self.menu
    }

    /// Runs one command. Failures are reported to the channel before being returned.
    pub async fn route(&self, invocation: &CommandInvocation) -> Result<(), CommandRouteError> {
        let result = self.dispatch(invocation).await;

        match &result {
            Ok(()) => info!(
                event_name = "command.completed",
                command = invocation.command.name(),
                user_id = %invocation.user_id,
                correlation_id = %invocation.correlation_id,
                "command executed"
            ),
            Err(error) => {
                warn!(
                    event_name = "command.failed",
                    command = invocation.command.name(),
                    user_id = %invocation.user_id,
                    correlation_id = %invocation.correlation_id,
                    error = %error,
                    "command failed"
                );
                self.report_failure(invocation).await;
            }
        }

        result
    }

    async fn dispatch(&self, invocation: &CommandInvocation) -> Result<(), CommandRouteError> {
        let services = &self.services;
        let user_id = invocation.user_id.as_str();
        let channel_id = invocation.channel_id.as_str();

        match &invocation.command {
            BotCommand::Menu => self.show_menu(user_id, channel_id).await,
            BotCommand::Help => {
                services.post(channel_id, &self.menu.help_message(user_id)).await?;
                Ok(())
            }
            BotCommand::Status => status::status(services, user_id, channel_id).await,
            BotCommand::Health => status::health(services, user_id, channel_id).await,
            BotCommand::Deploy => dev::deploy(services, user_id, channel_id).await,
            BotCommand::Build => dev::build(services, user_id, channel_id).await,
            BotCommand::Logs => dev::logs(services, user_id, channel_id).await,
            BotCommand::Admin => admin::admin_panel(services, user_id, channel_id).await,
            BotCommand::Permissions(action) => {
                admin::permissions(services, user_id, channel_id, action).await
            }
            BotCommand::Users => admin::users(services, user_id, channel_id).await,
        }
    }

    async fn report_failure(&self, invocation: &CommandInvocation) {
        let message = match invocation.command.failure_text() {
            Some(text) => MessageTemplate::text(text),
            None if invocation.command == BotCommand::Menu => {
                error_message("Failed to load menu", &invocation.correlation_id)
            }
            None => return,
        };

        if let Err(error) = self.services.post(&invocation.channel_id, &message).await {
            warn!(
                event_name = "command.failure_notice_failed",
                channel_id = %invocation.channel_id,
                error = %error,
                "failed to send error message"
            );
        }
    }

    /// Onboards the caller, then posts their personal command menu.
    pub async fn show_menu(&self, user_id: &str, channel_id: &str) -> Result<(), CommandRouteError> {
        self.onboard(user_id).await;
        self.services.post(channel_id, &self.menu.build_menu(user_id)).await?;
        Ok(())
    }

    /// Registers a first-time user and hands out the baseline grants.
    pub async fn onboard(&self, user_id: &str) {
        let services = &self.services;
        let profile = match services.chat.user_info(user_id).await {
            Ok(profile) => profile,
            Err(error) => {
                warn!(
                    event_name = "onboarding.user_info_failed",
                    user_id,
                    error = %error,
                    "failed to get user info"
                );
                SlackUser::unknown(user_id)
            }
        };

        if services.users.ensure_user(user_id, &profile.name, profile.email.as_deref()) {
            info!(event_name = "onboarding.user_created", user_id, username = %profile.name, "new user registered");
        }

        let mut grants = vec![READ_STATUS];
        if services.is_admin(user_id) {
            grants.extend(ADMIN_BUNDLE);
        }
        for permission in grants {
            if let Err(error) = services.permissions.grant(user_id, permission) {
                warn!(
                    event_name = "onboarding.grant_failed",
                    user_id,
                    permission,
                    error = %error,
                    "failed to setup user"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use permbot_core::permissions::{ADMIN, DEPLOYMENT, MANAGE_PERMISSIONS, READ_LOGS, READ_STATUS};
    use permbot_core::{ApplicationError, DomainError, PermissionOracle};

    use super::{
        normalize_user_target, parse_command, BotCommand, CommandInvocation, CommandParseError,
        PermissionsAction, SlashCommandPayload,
    };
    use crate::menu::MENU_TITLE;
    use crate::testing::{harness, RecordingChat};

    #[test]
    fn parses_known_commands_with_or_without_slash() {
        assert_eq!(parse_command("/status", ""), Ok(BotCommand::Status));
        assert_eq!(parse_command("DEPLOY", ""), Ok(BotCommand::Deploy));
        assert_eq!(parse_command(" /users ", "ignored"), Ok(BotCommand::Users));
        assert_eq!(
            parse_command("/quote", ""),
            Err(CommandParseError::UnsupportedCommand("/quote".to_owned()))
        );
    }

    #[test]
    fn permissions_arguments_follow_grant_revoke_grammar() {
        assert_eq!(
            parse_command("/permissions", ""),
            Ok(BotCommand::Permissions(PermissionsAction::Overview))
        );
        assert_eq!(
            parse_command("/permissions", "GRANT <@U789|dev.user> deployment"),
            Ok(BotCommand::Permissions(PermissionsAction::Grant {
                user_id: "U789".to_owned(),
                permission: "deployment".to_owned(),
            }))
        );
        assert_eq!(
            parse_command("/permissions", "revoke @U789 read_logs extra"),
            Ok(BotCommand::Permissions(PermissionsAction::Revoke {
                user_id: "U789".to_owned(),
                permission: "read_logs".to_owned(),
            }))
        );
        assert_eq!(
            parse_command("/permissions", "grant @U789"),
            Ok(BotCommand::Permissions(PermissionsAction::Usage))
        );
        assert_eq!(
            parse_command("/permissions", "list @U789 admin"),
            Ok(BotCommand::Permissions(PermissionsAction::Usage))
        );
    }

    #[test]
    fn user_targets_are_normalized() {
        assert_eq!(normalize_user_target("<@U123|john>"), "U123");
        assert_eq!(normalize_user_target("<@U123>"), "U123");
        assert_eq!(normalize_user_target("@U123"), "U123");
        assert_eq!(normalize_user_target("U123"), "U123");
    }

    #[test]
    fn unsupported_command_maps_to_domain_error() {
        let payload = SlashCommandPayload { command: "/quote".to_owned(), ..Default::default() };
        let error = CommandInvocation::from_payload(&payload, "req-1").expect_err("unsupported");
        assert_eq!(
            ApplicationError::from(error),
            ApplicationError::Domain(DomainError::UnknownCommand("/quote".to_owned()))
        );
    }

    #[tokio::test]
    async fn menu_onboards_new_users_with_baseline_grant() {
        let h = harness(RecordingChat::default().with_user("U2", "basic.user", None), &[]);

        h.router.show_menu("U2", "C1").await.expect("menu posted");

        assert_eq!(h.permissions.permissions_for("U2"), vec![READ_STATUS.to_owned()]);
        assert_eq!(h.users.get("U2").map(|user| user.username), Some("basic.user".to_owned()));
        let posts = h.chat.posts();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].1.render_text().starts_with(MENU_TITLE));
    }

    #[tokio::test]
    async fn admins_receive_the_admin_bundle_on_first_contact() {
        let h = harness(RecordingChat::default().with_user("U1", "admin.user", Some("a@x.io")), &["U1"]);

        h.router.onboard("U1").await;

        let mut expected = vec![ADMIN, DEPLOYMENT, MANAGE_PERMISSIONS, READ_LOGS, READ_STATUS]
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        expected.sort();
        assert_eq!(h.permissions.permissions_for("U1"), expected);
        assert_eq!(h.users.get("U1").and_then(|user| user.email), Some("a@x.io".to_owned()));
    }

    #[tokio::test]
    async fn user_info_failure_falls_back_to_unknown_profile() {
        let h = harness(RecordingChat::default().failing_user_info(), &[]);

        h.router.onboard("U9").await;

        assert_eq!(h.users.get("U9").map(|user| user.username), Some("unknown".to_owned()));
        assert!(h.permissions.check("U9", READ_STATUS));
    }

    #[tokio::test]
    async fn failed_menu_post_returns_transport_error() {
        let h = harness(RecordingChat::default().failing_posts(), &[]);
        let invocation = CommandInvocation::new(BotCommand::Menu, "U1", "C1", "req-7");

        assert!(h.router.route(&invocation).await.is_err());
        assert_eq!(h.users.count(), 1, "onboarding still ran");
    }

    #[tokio::test]
    async fn help_lists_commands_for_caller() {
        let h = harness(RecordingChat::default(), &[]);
        h.grant("U1", &[READ_LOGS]);

        h.router
            .route(&CommandInvocation::new(BotCommand::Help, "U1", "C1", "req-1"))
            .await
            .expect("help posted");

        let posts = h.chat.posts();
        assert_eq!(posts[0].1.fallback_text, "📚 Help & Documentation");
        assert!(posts[0].1.render_text().contains("• `/logs` - View application logs"));
    }
}
