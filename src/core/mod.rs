//! Core companion components
//!
//! This module contains the reply service, the conversation store and the
//! session that ties them together.

mod reply;
mod session;
mod storage;
mod store;

pub use reply::{ReplyService, RetryPolicy};
pub use session::{Companion, Exchange, SessionError, Snapshot};
pub use storage::{MemoryStorage, SqliteStorage, Storage};
pub use store::{ConversationStore, StoreError};

#[cfg(test)]
pub(crate) use store::tests::FailingStorage;
