use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// In-memory directory of users the bot has seen.
#[derive(Debug, Default)]
pub struct UserManager {
    users: RwLock<BTreeMap<String, UserRecord>>,
}

impl UserManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the user if absent. Returns `true` on creation; existing records are left as-is.
    pub fn ensure_user(&self, id: &str, username: &str, email: Option<&str>) -> bool {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(id) {
            return false;
        }

        users.insert(
            id.to_string(),
            UserRecord {
                id: id.to_string(),
                username: username.to_string(),
                email: email.map(str::to_string),
                created_at: Utc::now(),
            },
        );
        true
    }

    pub fn get(&self, id: &str) -> Option<UserRecord> {
        self.users.read().unwrap_or_else(PoisonError::into_inner).get(id).cloned()
    }

    /// All users sorted by id.
    pub fn list(&self) -> Vec<UserRecord> {
        self.users.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
