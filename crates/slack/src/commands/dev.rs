use chrono::Utc;
use permbot_core::permissions::{DEPLOYMENT, READ_LOGS};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use super::{BotServices, CommandRouteError};
use crate::blocks::{MessageBuilder, MessageTemplate};

pub const DEPLOY_STEPS: [&str; 6] = [
    "📦 Building application...",
    "🧪 Running tests...",
    "🔍 Security scan...",
    "📤 Uploading artifacts...",
    "🌐 Deploying to production...",
    "✅ Deployment complete!",
];

const LOG_LEVELS: [&str; 4] = ["INFO", "DEBUG", "WARN", "ERROR"];
const LOG_COMPONENTS: [&str; 4] = ["api", "worker", "scheduler", "database"];
const LOG_MESSAGES: [&str; 8] = [
    "Request processed successfully",
    "Cache miss for key: user_123",
    "Database connection established",
    "Background job completed",
    "Rate limit exceeded for IP",
    "Health check passed",
    "Configuration reloaded",
    "Memory usage: 45%",
];
const LOG_ENTRIES: usize = 10;

/// Posts a deployment card and walks it through every step by editing it in place.
pub(crate) async fn deploy(
    services: &BotServices,
    user_id: &str,
    channel_id: &str,
) -> Result<(), CommandRouteError> {
    if !services.allows(user_id, DEPLOYMENT) {
        services.post_text(channel_id, "❌ You don't have permission to deploy applications").await?;
        return Ok(());
    }

    let started = MessageBuilder::new("🚀 Starting deployment...")
        .section("deploy.started.v1", |section| {
            section.mrkdwn("🚀 *Deployment Started*\n\nInitializing deployment process...");
        })
        .build();
    let message_ref = services.post(channel_id, &started).await?;

    for (index, step) in DEPLOY_STEPS.iter().enumerate() {
        tokio::time::sleep(services.deploy_step_delay).await;
        debug!(event_name = "deploy.step", user_id, step = index + 1, "deployment progressed");
        services.chat.update_message(&message_ref, &deploy_progress(index + 1, step)).await?;
    }

    services.chat.update_message(&message_ref, &deploy_success(user_id)).await?;
    Ok(())
}

fn deploy_progress(current: usize, step: &str) -> MessageTemplate {
    MessageBuilder::new("🚀 Deployment in progress...")
        .section("deploy.progress.v1", |section| {
            section.mrkdwn(format!(
                "🚀 *Deployment Progress* ({current}/{})\n\n{step}",
                DEPLOY_STEPS.len()
            ));
        })
        .build()
}

fn deploy_success(user_id: &str) -> MessageTemplate {
    MessageBuilder::new("✅ Deployment successful!")
        .section("deploy.success.v1", |section| {
            section.mrkdwn("✅ *Deployment Successful!*\n\nApplication has been deployed to production.");
        })
        .context("deploy.success.context.v1", |context| {
            context.mrkdwn(format!(
                "Deployed by <@{user_id}> at {}",
                Utc::now().format("%H:%M:%S UTC")
            ));
        })
        .build()
}

pub(crate) async fn build(
    services: &BotServices,
    user_id: &str,
    channel_id: &str,
) -> Result<(), CommandRouteError> {
    if !services.allows(user_id, DEPLOYMENT) {
        services.post_text(channel_id, "❌ You don't have permission to build applications").await?;
        return Ok(());
    }

    let report = BuildReport::simulate(&mut rand::thread_rng());
    services.post(channel_id, &report.card()).await?;
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuildReport {
    pub duration_secs: u32,
    pub artifacts: u32,
    pub size_mb: f64,
}

impl BuildReport {
    pub fn simulate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            duration_secs: rng.gen_range(30..=120),
            artifacts: rng.gen_range(3..=8),
            size_mb: (rng.gen_range(5.0..=25.0_f64) * 10.0).round() / 10.0,
        }
    }

    pub fn card(&self) -> MessageTemplate {
        MessageBuilder::new("🔨 Build Complete")
            .header("build.header.v1", "🔨 Build Complete")
            .section("build.fields.v1", |section| {
                section
                    .field("*Status:* ✅ Success")
                    .field(format!("*Duration:* {}s", self.duration_secs))
                    .field(format!("*Artifacts:* {}", self.artifacts))
                    .field(format!("*Size:* {:.1} MB", self.size_mb));
            })
            .build()
    }
}

pub(crate) async fn logs(
    services: &BotServices,
    user_id: &str,
    channel_id: &str,
) -> Result<(), CommandRouteError> {
    if !services.allows(user_id, READ_LOGS) {
        services.post_text(channel_id, "❌ You don't have permission to view logs").await?;
        return Ok(());
    }

    let entries = sample_log_entries(&mut rand::thread_rng());
    services.post(channel_id, &logs_card(&entries)).await?;
    Ok(())
}

pub fn sample_log_entries<R: Rng + ?Sized>(rng: &mut R) -> Vec<String> {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    (0..LOG_ENTRIES)
        .map(|_| {
            format!(
                "{timestamp} [{}] {}: {}",
                LOG_LEVELS.choose(rng).copied().unwrap_or("INFO"),
                LOG_COMPONENTS.choose(rng).copied().unwrap_or("api"),
                LOG_MESSAGES.choose(rng).copied().unwrap_or_default(),
            )
        })
        .collect()
}

fn logs_card(entries: &[String]) -> MessageTemplate {
    let body = format!("*Last 10 log entries:*\n\n```\n{}\n```", entries.join("\n"));
    MessageBuilder::new("📝 Recent Logs")
        .header("logs.header.v1", "📝 Recent Logs")
        .section("logs.entries.v1", |section| {
            section.mrkdwn(body);
        })
        .context("logs.hint.v1", |context| {
            context.mrkdwn("💡 Use `/logs --tail 50` for more entries");
        })
        .build()
}
