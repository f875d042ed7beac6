use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::FormInputs;
use crate::prompts::{QuestionCount, DEFAULT_QUESTIONS};

/// Sessions idle longer than this are dropped on the next checkout.
const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Per-browser state. Holds the panel flag and the last text inputs so a re-rendered
/// page keeps them. The uploaded resume is never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub show_question_bank: bool,
    pub job_description: String,
    pub update_instruction: String,
    pub question_count: u8,
    pub topic: Option<String>,
    pub level: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            show_question_bank: false,
            job_description: String::new(),
            update_instruction: String::new(),
            question_count: DEFAULT_QUESTIONS,
            topic: None,
            level: None,
        }
    }
}

impl SessionState {
    /// Copies the text inputs of a submission. Invalid counts keep the previous value.
    pub fn remember(&mut self, inputs: &FormInputs) {
        self.job_description = inputs.job_description.clone();
        self.update_instruction = inputs.update_instruction.clone();
        if let Some(count) = inputs
            .question_count
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .and_then(|n| QuestionCount::new(n).ok())
        {
            self.question_count = count.get();
        }
        if inputs.topic.is_some() {
            self.topic = inputs.topic.clone();
        }
        if inputs.level.is_some() {
            self.level = inputs.level.clone();
        }
    }
}

struct Entry {
    state: Arc<Mutex<SessionState>>,
    last_seen: Instant,
}

/// In-memory session store keyed by the `session_id` cookie.
///
/// Each session sits behind its own lock. A submission holds it from load to the end of
/// its action, so overlapping submissions from one browser apply in turn.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the state for `id`, or a fresh default. Does not create a session.
    pub async fn load(&self, id: Uuid) -> SessionState {
        let cell = self
            .inner
            .read()
            .await
            .get(&id)
            .map(|entry| entry.state.clone());
        match cell {
            Some(cell) => cell.lock().await.clone(),
            None => SessionState::default(),
        }
    }

    /// Exclusive access to the state for `id`, creating it if needed.
    /// Changes made through the guard are the stored state.
    pub async fn checkout(&self, id: Uuid) -> OwnedMutexGuard<SessionState> {
        let cell = {
            let mut sessions = self.inner.write().await;
            let now = Instant::now();
            let before = sessions.len();
            sessions.retain(|key, entry| {
                *key == id || now.duration_since(entry.last_seen) < SESSION_TTL
            });
            if sessions.len() < before {
                debug!("Expired {} idle session(s)", before - sessions.len());
            }
            let entry = sessions.entry(id).or_insert_with(|| Entry {
                state: Arc::new(Mutex::new(SessionState::default())),
                last_seen: now,
            });
            entry.last_seen = now;
            entry.state.clone()
        };
        cell.lock_owned().await
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
