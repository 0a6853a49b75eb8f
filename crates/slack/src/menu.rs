use std::sync::Arc;

use permbot_core::{CommandCatalog, CommandCategory, CommandSpec};

use crate::blocks::{ButtonElement, MessageBuilder, MessageTemplate};

pub const MENU_TITLE: &str = "🤖 Available Commands";
pub const HELP_TITLE: &str = "📚 Help & Documentation";

/// Renders the per-user command menu and help text from the catalog.
#[derive(Clone)]
pub struct MenuBuilder {
    catalog: Arc<dyn CommandCatalog>,
}

impl MenuBuilder {
    pub fn new(catalog: Arc<dyn CommandCatalog>) -> Self {
        Self { catalog }
    }

    pub fn build_menu(&self, user_id: &str) -> MessageTemplate {
        let visible = self.catalog.commands_visible_to(user_id);
        if visible.is_empty() {
            return no_commands_menu();
        }

        let mut builder = MessageBuilder::new(MENU_TITLE).header("menu.header.v1", MENU_TITLE).divider();

        for category in CommandCategory::ORDERED {
            let commands: Vec<&CommandSpec> =
                visible.iter().filter(|spec| spec.category == category).collect();
            if commands.is_empty() {
                continue;
            }

            if category != CommandCategory::General {
                let block_id = format!("menu.category.{}.v1", category.label().to_ascii_lowercase());
                builder = builder.section(block_id, |section| {
                    section.mrkdwn(format!("*{} {}*", category_emoji(category), category.label()));
                });
            }

            for command in commands {
                builder = builder.section(format!("menu.command.{}.v1", command.name), |section| {
                    section
                        .mrkdwn(format!(
                            "{} *{}*\n{}",
                            command_emoji(&command.name),
                            title_case(&command.name),
                            command.description
                        ))
                        .button(
                            ButtonElement::new(
                                format!("run_command_{}", command.name),
                                format!("Run /{}", command.name),
                            )
                            .value(command.name.clone()),
                        );
                });
            }
        }

        builder
            .divider()
            .context("menu.footer.v1", |context| {
                context.mrkdwn("💡 *Tip:* You can also type commands directly (e.g., `/status`)");
            })
            .build()
    }

    pub fn help_text(&self, user_id: &str) -> String {
        let mut lines = vec![
            "🤖 *Slackbot Permissions Demo*".to_owned(),
            String::new(),
            "*Available Commands:*".to_owned(),
            "• `/menu` - Show interactive command menu".to_owned(),
            "• `/help` - Show this help message".to_owned(),
            String::new(),
        ];

        let visible = self.catalog.commands_visible_to(user_id);
        if visible.is_empty() {
            lines.push("*No additional commands available.*".to_owned());
            lines.push("Contact an admin to request permissions.".to_owned());
        } else {
            lines.push("*Your Available Commands:*".to_owned());
            lines.extend(
                visible.iter().map(|spec| format!("• `/{}` - {}", spec.name, spec.description)),
            );
        }

        lines.extend([
            String::new(),
            "*Need Help?*".to_owned(),
            "• Use `/menu` for interactive commands".to_owned(),
            "• Contact administrators for permission requests".to_owned(),
            "• Check bot status with `/status`".to_owned(),
        ]);

        lines.join("\n")
    }

    pub fn help_message(&self, user_id: &str) -> MessageTemplate {
        let text = self.help_text(user_id);
        MessageBuilder::new(HELP_TITLE)
            .section("help.body.v1", |section| {
                section.mrkdwn(text);
            })
            .build()
    }
}

fn no_commands_menu() -> MessageTemplate {
    MessageBuilder::new(MENU_TITLE)
        .section("menu.empty.v1", |section| {
            section.mrkdwn(
                "🔒 *No Commands Available*\n\nYou don't have permission to use any commands yet.\nContact an administrator to request access.",
            );
        })
        .context("menu.empty.context.v1", |context| {
            context.mrkdwn("📞 Need help? Use `/help` for more information");
        })
        .build()
}

pub fn command_emoji(name: &str) -> &'static str {
    match name.to_ascii_lowercase().as_str() {
        "status" => "📊",
        "health" => "💚",
        "deploy" => "🚀",
        "build" => "🔨",
        "admin" => "⚙️",
        "permissions" => "🔐",
        "users" => "👥",
        "logs" => "📝",
        "help" => "❓",
        "menu" => "📋",
        _ => "🔹",
    }
}

pub fn category_emoji(category: CommandCategory) -> &'static str {
    match category {
        CommandCategory::General => "📋",
        CommandCategory::Development => "🚀",
        CommandCategory::Administration => "⚙️",
        CommandCategory::Monitoring => "📊",
    }
}

/// Uppercases the first letter of every alphabetic run, lowercases the rest.
pub fn title_case(name: &str) -> String {
    let mut output = String::with_capacity(name.len());
    let mut at_word_start = true;
    for ch in name.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                output.extend(ch.to_uppercase());
            } else {
                output.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            output.push(ch);
            at_word_start = true;
        }
    }
    output
}
