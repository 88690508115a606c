//! Conversation store: the ordered message log and current mood
//!
//! Every mutation writes the complete new state to storage before it is
//! committed in memory, so the persisted snapshot always matches what the
//! store reports once an operation returns. A failed write leaves both sides
//! untouched.

use std::collections::HashSet;
use std::sync::Arc;

use crate::conversation::{Message, Mood};

use super::storage::{Storage, StorageError};

/// Storage slot holding the JSON-encoded message log
pub const MESSAGES_KEY: &str = "calm_messages";
/// Storage slot holding the plain mood string
pub const MOOD_KEY: &str = "calm_mood";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to persist conversation: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to encode conversation: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct ConversationStore {
    storage: Arc<dyn Storage>,
    messages: Vec<Message>,
    mood: Mood,
}

impl ConversationStore {
    /// Load the log and mood from storage. Never fails: unreadable or
    /// malformed slots fall back to an empty log and the neutral mood.
    pub async fn hydrate(storage: Arc<dyn Storage>) -> Self {
        let messages = match storage.get(MESSAGES_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Message>>(&raw) {
                Ok(messages) => dedupe(messages),
                Err(e) => {
                    tracing::error!("Failed to parse saved messages: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::error!("Failed to read saved messages: {}", e);
                Vec::new()
            }
        };

        let mood = match storage.get(MOOD_KEY).await {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("{}, falling back to neutral", e);
                Mood::default()
            }),
            Ok(None) => Mood::default(),
            Err(e) => {
                tracing::error!("Failed to read saved mood: {}", e);
                Mood::default()
            }
        };

        let store = Self {
            storage,
            messages,
            mood,
        };
        tracing::info!(
            "💾 Restored {} message(s), mood {} from {} storage",
            store.len(),
            store.mood,
            store.storage.backend_name()
        );
        store
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub async fn append_user_message(&mut self, text: &str) -> Result<Message, StoreError> {
        self.append(Message::user(text)).await
    }

    pub async fn append_assistant_message(&mut self, text: &str) -> Result<Message, StoreError> {
        self.append(Message::assistant(text)).await
    }

    pub async fn set_mood(&mut self, mood: Mood) -> Result<(), StoreError> {
        self.storage.set(MOOD_KEY, mood.as_str()).await?;
        self.mood = mood;
        tracing::debug!("Mood set to {}", mood);
        Ok(())
    }

    /// Empty the log. Clearing an empty log is a no-op that still rewrites the slot.
    pub async fn clear(&mut self) -> Result<(), StoreError> {
        self.persist_messages(&[]).await?;
        self.messages.clear();
        tracing::info!("🧹 Conversation cleared");
        Ok(())
    }

    async fn append(&mut self, message: Message) -> Result<Message, StoreError> {
        let mut next = self.messages.clone();
        next.push(message.clone());
        self.persist_messages(&next).await?;
        self.messages = next;
        Ok(message)
    }

    async fn persist_messages(&self, messages: &[Message]) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(messages)?;
        self.storage.set(MESSAGES_KEY, &encoded).await?;
        Ok(())
    }
}

/// Keep the first occurrence of each id
fn dedupe(messages: Vec<Message>) -> Vec<Message> {
    let total = messages.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<Message> = messages
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect();

    if unique.len() != total {
        tracing::warn!(
            "Dropped {} saved message(s) with duplicate ids",
            total - unique.len()
        );
    }
    unique
}
