//! Reply service
//!
//! Turns a user message and the current mood into a reply:
//! 1. Composes the persona prompt with the mood context and the user text
//! 2. Calls the generator, retrying only while the model reports overload
//! 3. Maps every outcome, including failures, to text the user can read
//!
//! Nothing here returns an error to the caller.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Persona;
use crate::conversation::Mood;
use crate::providers::{Generator, ProviderError};

pub const EMPTY_REPLY_FALLBACK: &str = "I'm here to listen. Could you tell me more?";
pub const OVERLOADED_FALLBACK: &str =
    "Sorry 😔 the AI is taking a little break right now. Please try again in a moment ✨";
pub const FAILURE_FALLBACK: &str =
    "Oops, something went wrong while I was thinking 💅 Try again in a bit?";

/// Bounded retry on transient overload with a linearly growing wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// After failed attempt `k` the wait is `k * backoff_unit`
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// Saturates at `Duration::MAX` for oversized units
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Terminal state of one reply invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Success(String),
    /// The model answered with nothing usable
    Empty,
    /// Every attempt hit an overload
    Exhausted,
    /// A non-retryable failure; the cause has already been logged
    Failed,
}

impl ReplyOutcome {
    pub fn into_text(self) -> String {
        match self {
            ReplyOutcome::Success(text) => text,
            ReplyOutcome::Empty => EMPTY_REPLY_FALLBACK.to_string(),
            ReplyOutcome::Exhausted => OVERLOADED_FALLBACK.to_string(),
            ReplyOutcome::Failed => FAILURE_FALLBACK.to_string(),
        }
    }
}

pub struct ReplyService {
    generator: Arc<dyn Generator>,
    persona: Persona,
    policy: RetryPolicy,
}

impl ReplyService {
    pub fn new(generator: Arc<dyn Generator>, persona: Persona, policy: RetryPolicy) -> Self {
        Self {
            generator,
            persona,
            policy,
        }
    }

    pub fn compose_prompt(&self, user_input: &str, mood: Mood) -> String {
        let mut prompt = format!(
            "{}\n\nMood context: {}",
            self.persona.system_prompt,
            mood.description()
        );
        if !self.persona.closing.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.persona.closing);
        }
        format!("{prompt}\n\nUser: {user_input}\n\n{}:", self.persona.name)
    }

    /// Reply text for display. Failures come back as fallback text.
    pub async fn reply(&self, user_input: &str, mood: Mood) -> String {
        self.resolve(user_input, mood).await.into_text()
    }

    pub async fn resolve(&self, user_input: &str, mood: Mood) -> ReplyOutcome {
        let prompt = self.compose_prompt(user_input, mood);

        match self.generate_with_retry(&prompt).await {
            Ok(text) if text.trim().is_empty() => {
                tracing::warn!("{} returned an empty reply", self.generator.name());
                ReplyOutcome::Empty
            }
            Ok(text) => ReplyOutcome::Success(text),
            Err(e) if e.is_transient_overload() => {
                tracing::error!(
                    "{} still overloaded after {} attempts: {}",
                    self.generator.name(),
                    self.policy.max_attempts,
                    e
                );
                ReplyOutcome::Exhausted
            }
            Err(e) => {
                tracing::error!("Error calling {}: {}", self.generator.name(), e);
                ReplyOutcome::Failed
            }
        }
    }

    /// Returns the last overload error once attempts run out
    async fn generate_with_retry(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut attempt = 1;
        loop {
            match self.generator.generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient_overload() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        "{} overloaded (attempt {}/{}), retrying in {:?}",
                        self.generator.name(),
                        attempt,
                        self.policy.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
