use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use permbot_core::config::TransportMode;
use permbot_core::{PermissionManager, RateLimiter, UserManager};
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    limiter: Arc<RateLimiter>,
    permissions: Arc<PermissionManager>,
    users: Arc<UserManager>,
    transport: TransportMode,
}

impl HealthState {
    pub fn new(
        limiter: Arc<RateLimiter>,
        permissions: Arc<PermissionManager>,
        users: Arc<UserManager>,
        transport: TransportMode,
    ) -> Self {
        Self { limiter, permissions, users, transport }
    }

    pub fn transport(&self) -> TransportMode {
        self.transport
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RateLimiterHealth {
    pub status: &'static str,
    pub tracked_identities: usize,
    pub max_requests: u32,
    pub window_seconds: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PermissionHealth {
    pub status: &'static str,
    pub users_with_grants: usize,
    pub total_grants: usize,
    pub known_users: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub rate_limiter: RateLimiterHealth,
    pub permission_system: PermissionHealth,
    pub transport: &'static str,
    pub version: &'static str,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Serves `/health` on its own listener; used in socket mode where no other
/// HTTP routes are bound.
pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "healthy",
        service: HealthCheck {
            status: "ready",
            detail: "permbot-server runtime initialized".to_string(),
        },
        rate_limiter: RateLimiterHealth {
            status: "active",
            tracked_identities: state.limiter.tracked_identities(),
            max_requests: state.limiter.max_requests(),
            window_seconds: state.limiter.window_seconds(),
        },
        permission_system: PermissionHealth {
            status: "active",
            users_with_grants: state.permissions.users_with_grants(),
            total_grants: state.permissions.total_grants(),
            known_users: state.users.count(),
        },
        transport: state.transport().as_str(),
        version: env!("CARGO_PKG_VERSION"),
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
