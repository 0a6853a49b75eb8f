use std::sync::Arc;

use anyhow::{Context, Result};
use permbot_core::{CommandRegistry, PermissionManager};
use permbot_slack::menu::MenuBuilder;

use super::CommandResult;

pub fn run(user_id: &str, grants: &[String]) -> CommandResult {
    match render(user_id, grants) {
        Ok(json) => CommandResult::output(json),
        Err(error) => CommandResult::failure("menu", "invalid_grant", format!("{error:#}"), 2),
    }
}

/// Block Kit JSON for the menu `user_id` would get holding exactly `grants`.
pub fn render(user_id: &str, grants: &[String]) -> Result<String> {
    let permissions = Arc::new(PermissionManager::new(true));
    for permission in grants {
        permissions
            .grant(user_id, permission)
            .with_context(|| format!("cannot grant `{permission}` to `{user_id}`"))?;
    }

    let menu = MenuBuilder::new(Arc::new(CommandRegistry::with_default_commands(permissions)))
        .build_menu(user_id);
    serde_json::to_string_pretty(&menu).context("menu did not serialize")
}
