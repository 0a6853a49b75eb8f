use std::sync::Arc;

use permbot_core::permissions::{ADMIN, DEPLOYMENT, MANAGE_PERMISSIONS, READ_LOGS, READ_STATUS};
use permbot_core::{CommandRegistry, PermissionError, PermissionManager, UserManager};
use permbot_slack::blocks::MessageTemplate;
use permbot_slack::menu::MenuBuilder;

use super::CommandResult;

const BANNER_WIDTH: usize = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Persona {
    pub user_id: &'static str,
    pub username: &'static str,
    pub role: &'static str,
    pub grants: &'static [&'static str],
}

pub const PERSONAS: [Persona; 4] = [
    Persona {
        user_id: "U123456",
        username: "admin.user",
        role: "Administrator",
        grants: &[READ_STATUS, DEPLOYMENT, ADMIN, MANAGE_PERMISSIONS],
    },
    Persona {
        user_id: "U789012",
        username: "dev.user",
        role: "Developer",
        grants: &[READ_STATUS, DEPLOYMENT, READ_LOGS],
    },
    Persona {
        user_id: "U345678",
        username: "basic.user",
        role: "Basic User",
        grants: &[READ_STATUS],
    },
    Persona { user_id: "U999999", username: "new.user", role: "New User (No Permissions)", grants: &[] },
];

#[derive(Clone, Debug)]
pub struct PersonaPreview {
    pub persona: Persona,
    pub menu: MessageTemplate,
}

pub fn run() -> CommandResult {
    match previews() {
        Ok(previews) => CommandResult::output(render(&previews)),
        Err(error) => CommandResult::failure("demo", "permission_seed", error.to_string(), 2),
    }
}

/// Seeds an in-memory store with every persona and renders each one's menu.
pub fn previews() -> Result<Vec<PersonaPreview>, PermissionError> {
    let permissions = Arc::new(PermissionManager::new(true));
    let users = UserManager::new();

    for persona in &PERSONAS {
        users.ensure_user(persona.user_id, persona.username, None);
        for permission in persona.grants {
            permissions.grant(persona.user_id, permission)?;
        }
    }

    let menu = MenuBuilder::new(Arc::new(CommandRegistry::with_default_commands(permissions)));
    Ok(PERSONAS
        .iter()
        .map(|persona| PersonaPreview { persona: *persona, menu: menu.build_menu(persona.user_id) })
        .collect())
}

fn render(previews: &[PersonaPreview]) -> String {
    let rule = "=".repeat(BANNER_WIDTH);
    let mut lines = vec![
        "🎯 PERMBOT PERMISSIONS DEMO".to_string(),
        "Each persona sees only the commands their grants allow.".to_string(),
    ];

    for preview in previews {
        let persona = &preview.persona;
        let grants =
            if persona.grants.is_empty() { "none".to_string() } else { persona.grants.join(", ") };
        lines.extend([
            String::new(),
            rule.clone(),
            format!("🤖 MENU PREVIEW - {} ({})", persona.username.to_uppercase(), persona.role),
            rule.clone(),
            format!("user: {}  grants: {grants}", persona.user_id),
            String::new(),
            preview.menu.render_text(),
        ]);
    }

    lines.extend([
        String::new(),
        rule,
        "Run `permbot-server` with Slack credentials and use /menu to see a live menu.".to_string(),
    ]);
    lines.join("\n")
}
