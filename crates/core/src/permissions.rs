use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::info;

pub const READ_STATUS: &str = "read_status";
pub const DEPLOYMENT: &str = "deployment";
pub const READ_LOGS: &str = "read_logs";
pub const ADMIN: &str = "admin";
pub const MANAGE_PERMISSIONS: &str = "manage_permissions";

pub const KNOWN_PERMISSIONS: [&str; 5] =
    [READ_STATUS, DEPLOYMENT, READ_LOGS, ADMIN, MANAGE_PERMISSIONS];

/// Extra grants handed to configured administrators on first contact.
pub const ADMIN_BUNDLE: [&str; 4] = [ADMIN, DEPLOYMENT, READ_LOGS, MANAGE_PERMISSIONS];

pub trait PermissionOracle: Send + Sync {
    fn check(&self, identity: &str, permission: &str) -> bool;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("unknown permission `{0}`")]
    UnknownPermission(String),
    #[error("user id must not be empty")]
    EmptyIdentity,
}

/// Human-readable summary shown next to a permission name.
pub fn describe(permission: &str) -> &'static str {
    match permission {
        READ_STATUS => "View system status",
        DEPLOYMENT => "Deploy applications",
        READ_LOGS => "View application logs",
        ADMIN => "Admin panel access",
        MANAGE_PERMISSIONS => "Manage user permissions",
        _ => "Custom permission",
    }
}

#[derive(Debug)]
pub struct PermissionManager {
    strict_mode: bool,
    grants: RwLock<BTreeMap<String, BTreeSet<String>>>,
}

impl PermissionManager {
    pub fn new(strict_mode: bool) -> Self {
        Self { strict_mode, grants: RwLock::new(BTreeMap::new()) }
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    pub fn is_known(permission: &str) -> bool {
        KNOWN_PERMISSIONS.contains(&permission)
    }

    /// Returns `true` when the grant is new.
    pub fn grant(&self, user_id: &str, permission: &str) -> Result<bool, PermissionError> {
        self.check_input(user_id, permission)?;

        let mut grants = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        let added =
            grants.entry(user_id.to_string()).or_default().insert(permission.to_string());
        if added {
            info!(event_name = "permissions.granted", user_id, permission, "permission granted");
        }
        Ok(added)
    }

    /// Returns `true` when the user held the permission.
    pub fn revoke(&self, user_id: &str, permission: &str) -> Result<bool, PermissionError> {
        self.check_input(user_id, permission)?;

        let mut grants = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        let Some(held) = grants.get_mut(user_id) else {
            return Ok(false);
        };
        let removed = held.remove(permission);
        if held.is_empty() {
            grants.remove(user_id);
        }
        if removed {
            info!(event_name = "permissions.revoked", user_id, permission, "permission revoked");
        }
        Ok(removed)
    }

    pub fn permissions_for(&self, user_id: &str) -> Vec<String> {
        let grants = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        grants.get(user_id).map(|held| held.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn holders_of(&self, permission: &str) -> Vec<String> {
        let grants = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        grants
            .iter()
            .filter(|(_, held)| held.contains(permission))
            .map(|(user_id, _)| user_id.clone())
            .collect()
    }

    pub fn total_grants(&self) -> usize {
        let grants = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        grants.values().map(BTreeSet::len).sum()
    }

    pub fn users_with_grants(&self) -> usize {
        self.grants.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn check_input(&self, user_id: &str, permission: &str) -> Result<(), PermissionError> {
        if user_id.trim().is_empty() {
            return Err(PermissionError::EmptyIdentity);
        }
        if self.strict_mode && !Self::is_known(permission) {
            return Err(PermissionError::UnknownPermission(permission.to_string()));
        }
        Ok(())
    }
}

impl Default for PermissionManager {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PermissionOracle for PermissionManager {
    fn check(&self, identity: &str, permission: &str) -> bool {
        let grants = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        grants.get(identity).is_some_and(|held| held.contains(permission))
    }
}
