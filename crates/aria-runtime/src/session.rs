use std::collections::HashMap;
use std::sync::Arc;

use aria_core::Turn;
use tokio::sync::{Mutex as TokioMutex, RwLock};
use tracing::debug;

/// A conversation session: the ordered turn history of one conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub turns: Vec<Turn>,
    /// Creation timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            turns: Vec::new(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn estimated_tokens(&self) -> usize {
        self.turns.iter().map(Turn::estimate_tokens).sum()
    }

    /// Drop whole exchanges from the front until the history fits both limits
    /// (0 = unlimited). Cuts only at a user text turn, so a tool-results turn
    /// never loses its tool-calls turn, and the newest exchange is always kept.
    /// Returns the number of turns dropped.
    pub fn trim(&mut self, max_turns: usize, max_tokens: usize) -> usize {
        let over = |turns: &[Turn]| {
            (max_turns > 0 && turns.len() > max_turns)
                || (max_tokens > 0
                    && turns.iter().map(Turn::estimate_tokens).sum::<usize>() > max_tokens)
        };

        let mut dropped = 0;
        while over(&self.turns) {
            let Some(cut) = self
                .turns
                .iter()
                .enumerate()
                .skip(1)
                .find(|(_, t)| t.is_user_text())
                .map(|(i, _)| i)
            else {
                break;
            };
            self.turns.drain(..cut);
            dropped += cut;
        }

        if dropped > 0 {
            debug!(session = %self.id, dropped, remaining = self.turns.len(), "trimmed session history");
        }
        dropped
    }
}

/// Manages all live sessions.
///
/// Each session sits behind its own async mutex; holding it for a whole run
/// is what keeps runs on one session from interleaving.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<TokioMutex<Session>>>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session with `id`, created empty on first use.
    pub async fn get_or_create(&self, id: &str) -> Arc<TokioMutex<Session>> {
        // Fast path: session already exists
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(id) {
                return Arc::clone(session);
            }
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(TokioMutex::new(Session::new(id)))),
        )
    }

    pub async fn get(&self, id: &str) -> Option<Arc<TokioMutex<Session>>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Clear a session's history. Waits for any run in progress on it.
    pub async fn reset(&self, id: &str) -> bool {
        let Some(session) = self.get(id).await else {
            return false;
        };
        session.lock().await.turns.clear();
        true
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
