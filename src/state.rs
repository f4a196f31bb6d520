use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::assistant::context::Conversation;
use crate::assistant::Assistant;
use crate::llm::LlmClient;
use crate::tables::TableStore;

/// Assistant parameters (admins can modify the row/context limits at runtime).
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub router_temperature: f32,
    pub synth_temperature: f32,
    /// Rows shown to the model when phrasing an answer.
    pub sample_rows: u32,
    /// Rows shown to the user under the answer.
    pub preview_rows: u32,
    /// Earlier questions carried into the router prompt.
    pub context_window: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            router_temperature: 0.1,
            synth_temperature: 0.3,
            sample_rows: 5,
            preview_rows: 10,
            context_window: 3,
        }
    }
}

pub type Session = Arc<Mutex<Conversation>>;

/// Conversations keyed by Discord channel or thread id.
#[derive(Default)]
pub struct Sessions {
    map: Mutex<HashMap<u64, Session>>,
}

impl Sessions {
    /// The conversation for `channel_id`, created on first use.
    pub async fn get(&self, channel_id: u64) -> Session {
        let mut map = self.map.lock().await;
        map.entry(channel_id).or_default().clone()
    }

    /// Forget `channel_id`, returning its conversation if it had one.
    pub async fn remove(&self, channel_id: u64) -> Option<Session> {
        self.map.lock().await.remove(&channel_id)
    }

    pub async fn len(&self) -> usize {
        self.map.lock().await.len()
    }
}

pub struct AppState {
    pub tables: Arc<TableStore>,
    pub llm: Arc<LlmClient>,
    pub assistant: Arc<Assistant<LlmClient>>,
    pub admin_ids: HashSet<u64>,
    pub config: Arc<RwLock<AssistantConfig>>,
    pub sessions: Sessions,
}

impl AppState {
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

pub type Context<'a> = poise::Context<'a, AppState, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::context::Role;

    #[tokio::test]
    async fn test_sessions_are_per_channel() {
        let sessions = Sessions::default();
        sessions.get(1).await.lock().await.push_turn(Role::User, "hola");

        assert!(!sessions.get(1).await.lock().await.is_empty());
        assert!(sessions.get(2).await.lock().await.is_empty());
        assert_eq!(sessions.len().await, 2);
    }

    #[tokio::test]
    async fn test_removed_session_frees_its_entry() {
        let sessions = Sessions::default();
        sessions.get(7).await.lock().await.push_turn(Role::User, "hola");

        let removed = sessions.remove(7).await.unwrap();
        assert_eq!(removed.lock().await.history().count(), 1);
        assert_eq!(sessions.len().await, 0);
        assert!(sessions.remove(7).await.is_none());
        assert!(sessions.get(7).await.lock().await.is_empty());
    }
}
