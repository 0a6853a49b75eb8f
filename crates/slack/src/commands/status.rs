use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use permbot_core::permissions::READ_STATUS;
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};
use thiserror::Error;
use tracing::warn;

use super::{BotServices, CommandRouteError};
use crate::blocks::{MessageBuilder, MessageTemplate};

/// CPU, memory and disk usage below this percentage count as healthy.
pub const HEALTHY_THRESHOLD: f64 = 80.0;

#[derive(Clone, Debug, PartialEq)]
pub struct SystemSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: Option<f64>,
    pub uptime: Duration,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("system probe unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SystemProbe: Send + Sync {
    async fn snapshot(&self) -> Result<SystemSnapshot, ProbeError>;
}

/// Reads host metrics through `sysinfo` on the blocking pool.
#[derive(Default)]
pub struct SysinfoProbe;

#[async_trait]
impl SystemProbe for SysinfoProbe {
    async fn snapshot(&self) -> Result<SystemSnapshot, ProbeError> {
        tokio::task::spawn_blocking(read_host_snapshot)
            .await
            .map_err(|error| ProbeError::Unavailable(error.to_string()))
    }
}

fn read_host_snapshot() -> SystemSnapshot {
    let mut system = System::new_with_specifics(
        RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything()),
    );
    // CPU usage is a delta between two refreshes.
    system.refresh_cpu_all();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    system.refresh_cpu_all();

    let total_memory = system.total_memory();
    let memory_percent = if total_memory > 0 {
        (system.used_memory() as f64 / total_memory as f64) * 100.0
    } else {
        0.0
    };

    let disks = Disks::new_with_refreshed_list();
    let disk_percent = disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first())
        .and_then(|disk| {
            let total = disk.total_space();
            (total > 0).then(|| {
                (total.saturating_sub(disk.available_space()) as f64 / total as f64) * 100.0
            })
        });

    SystemSnapshot {
        cpu_percent: f64::from(system.global_cpu_usage()),
        memory_percent,
        disk_percent,
        uptime: Duration::from_secs(System::uptime()),
    }
}

pub(crate) async fn status(
    services: &BotServices,
    user_id: &str,
    channel_id: &str,
) -> Result<(), CommandRouteError> {
    if !services.allows(user_id, READ_STATUS) {
        services.post_text(channel_id, "❌ You don't have permission to check status").await?;
        return Ok(());
    }

    let snapshot = read_snapshot(services).await;
    services.post(channel_id, &status_card(snapshot.as_ref())).await?;
    Ok(())
}

pub(crate) async fn health(
    services: &BotServices,
    user_id: &str,
    channel_id: &str,
) -> Result<(), CommandRouteError> {
    if !services.allows(user_id, READ_STATUS) {
        services.post_text(channel_id, "❌ You don't have permission to check health").await?;
        return Ok(());
    }

    let snapshot = read_snapshot(services).await;
    services.post(channel_id, &health_card(snapshot.as_ref())).await?;
    Ok(())
}

async fn read_snapshot(services: &BotServices) -> Option<SystemSnapshot> {
    match services.probe.snapshot().await {
        Ok(snapshot) => Some(snapshot),
        Err(error) => {
            warn!(event_name = "status.probe_failed", error = %error, "could not read system metrics");
            None
        }
    }
}

pub fn status_card(snapshot: Option<&SystemSnapshot>) -> MessageTemplate {
    let (status, uptime, cpu, memory) = match snapshot {
        Some(snapshot) => {
            let healthy = snapshot.cpu_percent < HEALTHY_THRESHOLD
                && snapshot.memory_percent < HEALTHY_THRESHOLD;
            (
                if healthy { "🟢 Healthy" } else { "🟡 Warning" },
                format_uptime(snapshot.uptime),
                format!("{:.1}", snapshot.cpu_percent),
                format!("{:.1}", snapshot.memory_percent),
            )
        }
        None => ("❌ Error", "Unknown".to_owned(), "0".to_owned(), "0".to_owned()),
    };

    MessageBuilder::new("📊 System Status")
        .header("status.header.v1", "📊 System Status")
        .section("status.fields.v1", |section| {
            section
                .field(format!("*Status:* {status}"))
                .field(format!("*Uptime:* {uptime}"))
                .field(format!("*CPU Usage:* {cpu}%"))
                .field(format!("*Memory Usage:* {memory}%"));
        })
        .context("status.updated.v1", |context| {
            context.mrkdwn(format!("Last updated: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")));
        })
        .build()
}

struct ComponentHealth {
    name: &'static str,
    healthy: bool,
    message: String,
}

fn component(name: &'static str, percent: Option<f64>) -> ComponentHealth {
    match percent {
        Some(percent) => ComponentHealth {
            name,
            healthy: percent < HEALTHY_THRESHOLD,
            message: format!("{percent:.1}% usage"),
        },
        None => ComponentHealth {
            name,
            healthy: false,
            message: format!("Unable to check {}", name.to_ascii_lowercase()),
        },
    }
}

pub fn health_card(snapshot: Option<&SystemSnapshot>) -> MessageTemplate {
    let components = [
        component("CPU", snapshot.map(|s| s.cpu_percent)),
        component("Memory", snapshot.map(|s| s.memory_percent)),
        component("Disk", snapshot.and_then(|s| s.disk_percent)),
    ];
    let overall = if components.iter().all(|c| c.healthy) {
        "🟢 All systems healthy"
    } else {
        "🟡 Some issues detected"
    };

    let mut builder = MessageBuilder::new("💚 Health Check")
        .header("health.header.v1", "💚 Health Check")
        .section("health.overall.v1", |section| {
            section.mrkdwn(format!("*Overall Status:* {overall}\n\n*Component Status:*"));
        });

    for component in &components {
        let icon = if component.healthy { "✅" } else { "❌" };
        let block_id = format!("health.component.{}.v1", component.name.to_ascii_lowercase());
        builder = builder.section(block_id, |section| {
            section.mrkdwn(format!("{icon} *{}:* {}", component.name, component.message));
        });
    }

    builder.build()
}

/// `1:01:01`, or `2 days, 3:04:05` past the first day.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    let clock = format!("{hours}:{minutes:02}:{seconds:02}");

    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        _ => format!("{days} days, {clock}"),
    }
}
