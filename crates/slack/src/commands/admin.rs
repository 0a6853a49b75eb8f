use permbot_core::permissions::{describe, ADMIN, KNOWN_PERMISSIONS, MANAGE_PERMISSIONS};

use super::{BotServices, CommandRouteError, PermissionsAction};
use crate::blocks::{ButtonElement, MessageBuilder, MessageTemplate};

const USER_LIST_LIMIT: usize = 10;

pub const PERMISSIONS_USAGE: &str = "❓ *Permissions Command Help*\n\n*Usage:*\n• `/permissions grant @user permission_name`\n• `/permissions revoke @user permission_name`\n• `/permissions` - Show overview\n\n*Example:*\n`/permissions grant @john deployment`";

/// Counts shown on the admin panel, read live from the stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdminOverview {
    pub total_users: usize,
    pub active_permissions: usize,
    pub registered_commands: usize,
    pub admin_users: usize,
}

impl AdminOverview {
    pub fn collect(services: &BotServices) -> Self {
        Self {
            total_users: services.users.count(),
            active_permissions: services.permissions.total_grants(),
            registered_commands: services.registry.len(),
            admin_users: services.permissions.holders_of(ADMIN).len(),
        }
    }
}

pub(crate) async fn admin_panel(
    services: &BotServices,
    user_id: &str,
    channel_id: &str,
) -> Result<(), CommandRouteError> {
    if !services.allows(user_id, ADMIN) {
        services.post_text(channel_id, "❌ You don't have admin permissions").await?;
        return Ok(());
    }

    services.post(channel_id, &admin_panel_card(AdminOverview::collect(services))).await?;
    Ok(())
}

pub fn admin_panel_card(overview: AdminOverview) -> MessageTemplate {
    MessageBuilder::new("⚙️ Admin Control Panel")
        .header("admin.header.v1", "⚙️ Admin Control Panel")
        .section("admin.overview.v1", |section| {
            section.mrkdwn("*System Overview*");
        })
        .section("admin.counts.v1", |section| {
            section
                .field(format!("*Total Users:* {}", overview.total_users))
                .field(format!("*Active Permissions:* {}", overview.active_permissions))
                .field(format!("*Registered Commands:* {}", overview.registered_commands))
                .field(format!("*Admin Users:* {}", overview.admin_users));
        })
        .divider()
        .section("admin.quick_actions.v1", |section| {
            section.mrkdwn("*Quick Actions*");
        })
        .actions("admin.actions.v1", |actions| {
            actions
                .button(ButtonElement::new("admin_manage_users", "👥 Manage Users").value("manage_users"))
                .button(
                    ButtonElement::new("admin_manage_permissions", "🔐 Manage Permissions")
                        .value("manage_permissions"),
                )
                .button(ButtonElement::new("admin_view_audit", "📊 View Audit Log").value("view_audit"));
        })
        .build()
}

pub(crate) async fn permissions(
    services: &BotServices,
    user_id: &str,
    channel_id: &str,
    action: &PermissionsAction,
) -> Result<(), CommandRouteError> {
    if !services.allows(user_id, MANAGE_PERMISSIONS) {
        services
            .post_text(channel_id, "❌ You don't have permission to manage permissions")
            .await?;
        return Ok(());
    }

    match action {
        PermissionsAction::Overview => {
            services.post(channel_id, &permissions_overview()).await?;
        }
        PermissionsAction::Usage => {
            services.post_text(channel_id, PERMISSIONS_USAGE).await?;
        }
        PermissionsAction::Grant { user_id: target, permission } => {
            let reply = match services.permissions.grant(target, permission) {
                Ok(_) => format!("✅ Permission `{permission}` granted to <@{target}>"),
                Err(error) => format!("❌ Error granting permission: {error}"),
            };
            services.post_text(channel_id, reply).await?;
        }
        PermissionsAction::Revoke { user_id: target, permission } => {
            let reply = match services.permissions.revoke(target, permission) {
                Ok(true) => format!("✅ Permission `{permission}` revoked from <@{target}>"),
                Ok(false) => format!("❌ Failed to revoke permission `{permission}` from <@{target}>"),
                Err(error) => format!("❌ Error revoking permission: {error}"),
            };
            services.post_text(channel_id, reply).await?;
        }
    }
    Ok(())
}

pub fn permissions_overview() -> MessageTemplate {
    let available = KNOWN_PERMISSIONS.iter().fold(
        String::from("*Available Permissions:*"),
        |mut text, permission| {
            text.push_str(&format!("\n• `{permission}` - {}", describe(permission)));
            text
        },
    );

    MessageBuilder::new("🔐 Permissions Overview")
        .header("permissions.header.v1", "🔐 Permissions Overview")
        .section("permissions.available.v1", |section| {
            section.mrkdwn(available);
        })
        .section("permissions.usage.v1", |section| {
            section.mrkdwn(
                "*Usage:*\n• `/permissions grant @user permission_name`\n• `/permissions revoke @user permission_name`\n• `/permissions` - Show this overview",
            );
        })
        .build()
}

pub(crate) async fn users(
    services: &BotServices,
    user_id: &str,
    channel_id: &str,
) -> Result<(), CommandRouteError> {
    if !services.allows(user_id, ADMIN) {
        services.post_text(channel_id, "❌ You don't have admin permissions").await?;
        return Ok(());
    }

    services.post(channel_id, &user_list_card(services)).await?;
    Ok(())
}

fn user_list_card(services: &BotServices) -> MessageTemplate {
    let users = services.users.list();

    let mut builder = MessageBuilder::new("👥 User Management")
        .header("users.header.v1", "👥 User Management")
        .section("users.total.v1", |section| {
            section.mrkdwn(format!("*Total Users:* {}", users.len()));
        });

    for user in users.iter().take(USER_LIST_LIMIT) {
        let granted = services.permissions.permissions_for(&user.id);
        let granted = if granted.is_empty() { "None".to_owned() } else { granted.join(", ") };
        builder = builder.section(format!("users.entry.{}.v1", user.id), |section| {
            section.mrkdwn(format!("*{}* (`{}`)\nPermissions: {granted}", user.username, user.id));
        });
    }

    if users.len() > USER_LIST_LIMIT {
        let hidden = users.len() - USER_LIST_LIMIT;
        builder = builder.context("users.more.v1", |context| {
            context.mrkdwn(format!("... and {hidden} more users"));
        });
    }

    builder.build()
}

/// Reply for the audit quick action; there is no audit trail to show yet.
pub fn audit_log_notice() -> MessageTemplate {
    MessageBuilder::new("📊 Audit Log")
        .section("admin.audit.v1", |section| {
            section.mrkdwn(
                "📊 *Audit Log*\n\nAudit history is not recorded by this bot. Use `/users` to review current grants.",
            );
        })
        .build()
}
