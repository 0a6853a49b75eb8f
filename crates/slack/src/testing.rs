use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use permbot_core::{CommandRegistry, PermissionManager, UserManager};

use crate::blocks::MessageTemplate;
use crate::commands::status::{ProbeError, SystemProbe, SystemSnapshot};
use crate::commands::{BotServices, CommandRouter};
use crate::transport::{ChatTransport, MessageRef, SlackUser, TransportError};

#[derive(Default)]
pub(crate) struct RecordingChat {
    state: Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    posts: Vec<(String, MessageTemplate)>,
    updates: Vec<(MessageRef, MessageTemplate)>,
    users: HashMap<String, SlackUser>,
    fail_user_info: bool,
    fail_posts: bool,
    next_ts: u64,
}

impl RecordingChat {
    pub(crate) fn with_user(self, id: &str, name: &str, email: Option<&str>) -> Self {
        self.lock().users.insert(
            id.to_owned(),
            SlackUser { id: id.to_owned(), name: name.to_owned(), email: email.map(str::to_owned) },
        );
        self
    }

    pub(crate) fn failing_user_info(self) -> Self {
        self.lock().fail_user_info = true;
        self
    }

    pub(crate) fn failing_posts(self) -> Self {
        self.lock().fail_posts = true;
        self
    }

    pub(crate) fn posts(&self) -> Vec<(String, MessageTemplate)> {
        self.lock().posts.clone()
    }

    pub(crate) fn post_texts(&self) -> Vec<String> {
        self.lock().posts.iter().map(|(_, message)| message.render_text()).collect()
    }

    pub(crate) fn updates(&self) -> Vec<(MessageRef, MessageTemplate)> {
        self.lock().updates.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChatTransport for RecordingChat {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<MessageRef, TransportError> {
        let mut state = self.lock();
        if state.fail_posts {
            return Err(TransportError::Api {
                method: "chat.postMessage".to_owned(),
                error: "channel_not_found".to_owned(),
            });
        }
        state.next_ts += 1;
        state.posts.push((channel.to_owned(), message.clone()));
        Ok(MessageRef { channel: channel.to_owned(), ts: format!("1730000000.{:06}", state.next_ts) })
    }

    async fn update_message(
        &self,
        message_ref: &MessageRef,
        message: &MessageTemplate,
    ) -> Result<(), TransportError> {
        self.lock().updates.push((message_ref.clone(), message.clone()));
        Ok(())
    }

    async fn user_info(&self, user_id: &str) -> Result<SlackUser, TransportError> {
        let state = self.lock();
        if state.fail_user_info {
            return Err(TransportError::Request("users.info timed out".to_owned()));
        }
        Ok(state.users.get(user_id).cloned().unwrap_or_else(|| SlackUser::unknown(user_id)))
    }
}

pub(crate) struct FixedProbe(pub(crate) Result<SystemSnapshot, ProbeError>);

#[async_trait]
impl SystemProbe for FixedProbe {
    async fn snapshot(&self) -> Result<SystemSnapshot, ProbeError> {
        self.0.clone()
    }
}

pub(crate) fn calm_snapshot() -> SystemSnapshot {
    SystemSnapshot {
        cpu_percent: 12.5,
        memory_percent: 40.0,
        disk_percent: Some(55.0),
        uptime: Duration::from_secs(90_061),
    }
}

pub(crate) struct Harness {
    pub(crate) chat: Arc<RecordingChat>,
    pub(crate) permissions: Arc<PermissionManager>,
    pub(crate) users: Arc<UserManager>,
    pub(crate) router: Arc<CommandRouter>,
}

pub(crate) fn harness(chat: RecordingChat, admin_users: &[&str]) -> Harness {
    let chat = Arc::new(chat);
    let permissions = Arc::new(PermissionManager::new(true));
    let users = Arc::new(UserManager::new());
    let registry = Arc::new(CommandRegistry::with_default_commands(permissions.clone()));

    let services = BotServices {
        chat: chat.clone(),
        permissions: permissions.clone(),
        registry,
        users: users.clone(),
        probe: Arc::new(FixedProbe(Ok(calm_snapshot()))),
        admin_users: admin_users.iter().map(|id| (*id).to_owned()).collect(),
        deploy_step_delay: Duration::ZERO,
    };

    Harness { chat, permissions, users, router: Arc::new(CommandRouter::new(services)) }
}

impl Harness {
    pub(crate) fn grant(&self, user_id: &str, permissions: &[&str]) {
        for permission in permissions {
            self.permissions.grant(user_id, permission).expect("known permission");
        }
    }
}
