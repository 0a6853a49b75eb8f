use std::sync::Arc;
use std::time::Duration;

use permbot_core::config::{AppConfig, ConfigError, LoadOptions, TransportMode};
use permbot_core::{CommandRegistry, PermissionManager, RateLimiter, UserManager};
use permbot_slack::commands::status::SysinfoProbe;
use permbot_slack::commands::{BotServices, CommandRouter};
use permbot_slack::events::{bot_dispatcher, EventDispatcher};
use permbot_slack::gate::RequestGate;
use permbot_slack::socket::{ReconnectPolicy, SocketModeRunner, WebSocketTransport};
use permbot_slack::transport::{ChatTransport, SlackWebClient, TransportError};
use thiserror::Error;
use tracing::info;

use crate::health::HealthState;
use crate::http::SlackHttpState;

pub struct Application {
    pub config: AppConfig,
    pub slack: SlackWebClient,
    pub dispatcher: Arc<EventDispatcher>,
    pub limiter: Arc<RateLimiter>,
    pub permissions: Arc<PermissionManager>,
    pub users: Arc<UserManager>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("slack client initialization failed: {0}")]
    SlackClient(#[source] TransportError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let mut slack =
        SlackWebClient::new(config.slack.bot_token.clone()).map_err(BootstrapError::SlackClient)?;
    if config.server.transport == TransportMode::Socket {
        slack = slack.with_app_token(config.slack.app_token.clone());
    }

    let chat: Arc<dyn ChatTransport> = Arc::new(slack.clone());
    let permissions = Arc::new(PermissionManager::new(config.permissions.strict_mode));
    let users = Arc::new(UserManager::new());
    let registry = Arc::new(CommandRegistry::with_default_commands(permissions.clone()));
    let limiter =
        Arc::new(RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window_secs));

    let services = BotServices {
        chat: chat.clone(),
        permissions: permissions.clone(),
        registry,
        users: users.clone(),
        probe: Arc::new(SysinfoProbe),
        admin_users: config.permissions.admin_users.clone(),
        deploy_step_delay: Duration::from_millis(config.commands.deploy_step_delay_ms),
    };
    let commands = services.registry.len();
    let router = Arc::new(CommandRouter::new(services));
    let gate = RequestGate::new(limiter.clone(), chat);
    let dispatcher = Arc::new(bot_dispatcher(router, gate));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        transport = config.server.transport.as_str(),
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        admin_users = config.permissions.admin_users.len(),
        commands,
        "application components initialized"
    );

    Ok(Application { config, slack, dispatcher, limiter, permissions, users })
}

impl Application {
    pub fn socket_runner(&self) -> SocketModeRunner {
        SocketModeRunner::new(
            Arc::new(WebSocketTransport::new(self.slack.clone())),
            self.dispatcher.clone(),
            ReconnectPolicy::default(),
        )
    }

    pub fn health_state(&self) -> HealthState {
        HealthState::new(
            self.limiter.clone(),
            self.permissions.clone(),
            self.users.clone(),
            self.config.server.transport,
        )
    }

    pub fn http_state(&self) -> SlackHttpState {
        SlackHttpState::new(self.dispatcher.clone(), self.config.slack.signing_secret.clone())
    }
}

#[cfg(test)]
mod tests {
    use permbot_core::config::{ConfigOverrides, LoadOptions, TransportMode};
    use permbot_core::permissions::READ_STATUS;
    use permbot_core::PermissionOracle;

    use crate::bootstrap::bootstrap;

    fn http_options() -> LoadOptions {
        LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            overrides: ConfigOverrides {
                transport: Some(TransportMode::Http),
                slack_bot_token: Some("xoxb-test".to_string()),
                slack_signing_secret: Some("signing-secret".to_string()),
                rate_limit_max_requests: Some(3),
                rate_limit_window_secs: Some(30),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn bootstrap_fails_fast_without_required_slack_tokens() {
        let result = bootstrap(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            overrides: ConfigOverrides {
                transport: Some(TransportMode::Socket),
                slack_app_token: Some("invalid-token".to_string()),
                slack_bot_token: Some("xoxb-valid".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.app_token"));
    }

    #[tokio::test]
    async fn bootstrap_wires_limiter_and_dispatcher_from_config() {
        let app = bootstrap(http_options()).expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.limiter.max_requests(), 3);
        assert_eq!(app.limiter.window_seconds(), 30);
        assert_eq!(app.dispatcher.handler_count(), 4);
        assert!(app.permissions.strict_mode());
        assert!(app.permissions.grant("UX", "superpowers").is_err());

        app.permissions.grant("U1", READ_STATUS).expect("known permission");
        assert!(app.permissions.check("U1", READ_STATUS));
        assert_eq!(app.health_state().transport(), TransportMode::Http);
    }
}
