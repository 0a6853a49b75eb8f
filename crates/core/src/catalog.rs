use std::sync::Arc;

use serde::Serialize;

use crate::permissions::{
    PermissionOracle, ADMIN, DEPLOYMENT, MANAGE_PERMISSIONS, READ_LOGS, READ_STATUS,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CommandCategory {
    General,
    Development,
    Administration,
    Monitoring,
}

impl CommandCategory {
    /// Menu rendering order.
    pub const ORDERED: [Self; 4] =
        [Self::General, Self::Development, Self::Administration, Self::Monitoring];

    pub fn label(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Development => "Development",
            Self::Administration => "Administration",
            Self::Monitoring => "Monitoring",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub name: String,
    pub permission: String,
    pub description: String,
    pub category: CommandCategory,
}

impl CommandSpec {
    pub fn new(
        name: impl Into<String>,
        permission: impl Into<String>,
        description: impl Into<String>,
        category: CommandCategory,
    ) -> Self {
        Self {
            name: name.into(),
            permission: permission.into(),
            description: description.into(),
            category,
        }
    }
}

pub trait CommandCatalog: Send + Sync {
    /// Commands the identity may run, in registration order.
    fn commands_visible_to(&self, identity: &str) -> Vec<CommandSpec>;
}

pub struct CommandRegistry {
    commands: Vec<CommandSpec>,
    oracle: Arc<dyn PermissionOracle>,
}

impl CommandRegistry {
    pub fn new(oracle: Arc<dyn PermissionOracle>) -> Self {
        Self { commands: Vec::new(), oracle }
    }

    pub fn with_default_commands(oracle: Arc<dyn PermissionOracle>) -> Self {
        let mut registry = Self::new(oracle);
        for spec in default_commands() {
            registry.register(spec);
        }
        registry
    }

    /// Registering an existing name replaces it in place.
    pub fn register(&mut self, spec: CommandSpec) {
        match self.commands.iter_mut().find(|existing| existing.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.commands.push(spec),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|spec| spec.name == name)
    }

    pub fn all(&self) -> &[CommandSpec] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl CommandCatalog for CommandRegistry {
    fn commands_visible_to(&self, identity: &str) -> Vec<CommandSpec> {
        self.commands
            .iter()
            .filter(|spec| self.oracle.check(identity, &spec.permission))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry").field("commands", &self.commands).finish()
    }
}

pub fn default_commands() -> Vec<CommandSpec> {
    use CommandCategory::{Administration, Development, Monitoring};

    vec![
        CommandSpec::new("status", READ_STATUS, "Check system status and health", Monitoring),
        CommandSpec::new("health", READ_STATUS, "Detailed health check", Monitoring),
        CommandSpec::new("deploy", DEPLOYMENT, "Deploy application to production", Development),
        CommandSpec::new("build", DEPLOYMENT, "Build application artifacts", Development),
        CommandSpec::new("logs", READ_LOGS, "View application logs", Development),
        CommandSpec::new("admin", ADMIN, "Admin control panel", Administration),
        CommandSpec::new(
            "permissions",
            MANAGE_PERMISSIONS,
            "Manage user permissions",
            Administration,
        ),
        CommandSpec::new("users", ADMIN, "Manage users", Administration),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{CommandCatalog, CommandCategory, CommandRegistry, CommandSpec};
    use crate::permissions::{PermissionManager, DEPLOYMENT, READ_STATUS};

    fn registry_with(grants: &[(&str, &str)]) -> CommandRegistry {
        let manager = Arc::new(PermissionManager::default());
        for (user, permission) in grants {
            assert_eq!(manager.grant(user, permission), Ok(true));
        }
        CommandRegistry::with_default_commands(manager)
    }

    fn names(specs: &[CommandSpec]) -> Vec<&str> {
        specs.iter().map(|spec| spec.name.as_str()).collect()
    }

    #[test]
    fn default_catalog_registers_eight_commands() {
        let registry = registry_with(&[]);
        assert_eq!(registry.len(), 8);
        assert_eq!(
            registry.get("permissions").map(|spec| spec.category),
            Some(CommandCategory::Administration)
        );
    }

    #[test]
    fn visibility_follows_grants_in_registration_order() {
        let registry = registry_with(&[("U1", DEPLOYMENT), ("U1", READ_STATUS)]);

        assert_eq!(
            names(&registry.commands_visible_to("U1")),
            vec!["status", "health", "deploy", "build"]
        );
        assert!(registry.commands_visible_to("U2").is_empty());
    }

    #[test]
    fn register_replaces_existing_name() {
        let mut registry = registry_with(&[("U1", "admin")]);
        registry.register(CommandSpec::new(
            "status",
            "admin",
            "Restricted status",
            CommandCategory::General,
        ));

        assert_eq!(registry.len(), 8);
        let visible = registry.commands_visible_to("U1");
        assert_eq!(visible[0].name, "status");
        assert_eq!(visible[0].category, CommandCategory::General);
    }

    #[test]
    fn categories_render_in_fixed_order() {
        let labels: Vec<_> = CommandCategory::ORDERED.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["General", "Development", "Administration", "Monitoring"]);
    }
}
