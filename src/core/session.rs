//! Companion session: the single owner of conversation state
//!
//! At most one reply is ever outstanding. A send that arrives while one is
//! in flight is rejected rather than queued, so the log order always matches
//! submission order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::conversation::{Message, Mood};

use super::reply::ReplyService;
use super::store::{ConversationStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("A reply is already in progress")]
    Busy,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Reply task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result of one successful send
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub user: Message,
    pub assistant: Message,
}

/// Point-in-time view for rendering
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub mood: Mood,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct Companion {
    store: Mutex<ConversationStore>,
    replies: ReplyService,
    loading: AtomicBool,
    last_error: std::sync::Mutex<Option<String>>,
}

/// Releases the loading flag when the reply task finishes, however it ends
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Companion {
    pub fn new(store: ConversationStore, replies: ReplyService) -> Self {
        Self {
            store: Mutex::new(store),
            replies,
            loading: AtomicBool::new(false),
            last_error: std::sync::Mutex::new(None),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_error(&self, error: Option<String>) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = error;
    }

    /// Send a user message and wait for the assistant's reply.
    ///
    /// The work runs on its own task, so dropping the returned future does
    /// not cancel a request that has already been issued.
    pub async fn send(self: &Arc<Self>, text: &str) -> Result<Exchange, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        if self
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::Busy);
        }

        let this = Arc::clone(self);
        let text = text.to_string();
        tokio::spawn(async move {
            let _loading = LoadingGuard(&this.loading);
            this.exchange(&text).await
        })
        .await?
    }

    async fn exchange(&self, text: &str) -> Result<Exchange, SessionError> {
        self.set_error(None);

        let (user, mood) = {
            let mut store = self.store.lock().await;
            let user = store.append_user_message(text).await.map_err(|e| {
                tracing::error!("Failed to record user message: {}", e);
                self.set_error(Some(e.to_string()));
                e
            })?;
            (user, store.mood())
        };

        let reply = self.replies.reply(text, mood).await;

        let mut store = self.store.lock().await;
        match store.append_assistant_message(&reply).await {
            Ok(assistant) => Ok(Exchange { user, assistant }),
            Err(e) => {
                tracing::error!("Failed to record reply: {}", e);
                self.set_error(Some(e.to_string()));
                let apology = format!("I'm having trouble right now. {e}");
                if let Err(retry_err) = store.append_assistant_message(&apology).await {
                    tracing::error!("Failed to record apology: {}", retry_err);
                }
                Err(e.into())
            }
        }
    }

    pub async fn set_mood(&self, mood: Mood) -> Result<(), StoreError> {
        self.store.lock().await.set_mood(mood).await
    }

    /// Clear the conversation. Confirmation is the caller's job.
    ///
    /// Refused while a reply is outstanding, otherwise the reply would land
    /// in the freshly cleared log without its user message.
    pub async fn clear(&self) -> Result<(), SessionError> {
        let mut store = self.store.lock().await;
        // Checked under the lock; a send that starts after this point
        // appends to the cleared log
        if self.is_loading() {
            return Err(SessionError::Busy);
        }
        store.clear().await?;
        self.set_error(None);
        Ok(())
    }

    pub async fn snapshot(&self) -> Snapshot {
        let store = self.store.lock().await;
        Snapshot {
            messages: store.messages().to_vec(),
            mood: store.mood(),
            loading: self.is_loading(),
            error: self.last_error(),
        }
    }
}
