//! Verification challenge state for the current session.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use entrar_state::{register_repository_item, MemoryRepository, Repository, RepositoryError};
use serde::{Deserialize, Serialize};

use crate::flow::FlowKind;

/// How a challenge code is delivered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeMethod {
    /// A code or link sent to the user's email address.
    Email,
    /// A code sent to the user's phone.
    Sms,
}

impl fmt::Display for ChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeMethod::Email => write!(f, "email"),
            ChallengeMethod::Sms => write!(f, "sms"),
        }
    }
}

/// A server-issued token identifying an in-progress verification step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    /// Opaque identifier issued by the server.
    pub challenge_id: String,
    /// The flow this challenge belongs to.
    pub flow: FlowKind,
    /// Delivery method for the verification code.
    pub method: ChallengeMethod,
    /// When the challenge was issued, by the client's clock.
    pub created_at: DateTime<Utc>,
    /// Failed code submissions since this challenge was issued.
    pub attempts: u32,
}

register_repository_item!(Challenge, "Challenge");

impl Challenge {
    pub(crate) fn new(challenge_id: String, flow: FlowKind, method: ChallengeMethod) -> Self {
        Self {
            challenge_id,
            flow,
            method,
            created_at: Utc::now(),
            attempts: 0,
        }
    }
}

/// Holds the in-progress verification state for the current session, keyed by
/// flow.
///
/// Deliberately session-scoped (in-memory): a challenge id that survived a
/// restart would reference an expired or consumed challenge on the server.
/// An absent challenge means no verification is in progress and the flow must
/// restart from the credential step.
#[derive(Clone, Default)]
pub struct ChallengeStore {
    store: Arc<MemoryRepository>,
}

impl ChallengeStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `challenge`, superseding any previous challenge for the same
    /// flow. Supersede, not merge: the old challenge id is gone.
    pub async fn set(&self, challenge: Challenge) -> Result<(), RepositoryError> {
        self.store
            .set(challenge.flow.to_string(), challenge)
            .await
    }

    /// The active challenge for `flow`, if any.
    pub async fn get(&self, flow: FlowKind) -> Result<Option<Challenge>, RepositoryError> {
        self.store.get(flow.to_string()).await
    }

    /// Drops the challenge for `flow`.
    pub async fn clear(&self, flow: FlowKind) -> Result<(), RepositoryError> {
        <MemoryRepository as Repository<Challenge>>::remove(&self.store, flow.to_string()).await
    }

    /// Records a failed code submission against the active challenge and
    /// returns the updated attempt count.
    pub(crate) async fn record_attempt(&self, flow: FlowKind) -> Result<u32, RepositoryError> {
        match self.get(flow).await? {
            Some(mut challenge) => {
                challenge.attempts += 1;
                let attempts = challenge.attempts;
                self.set(challenge).await?;
                Ok(attempts)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(id: &str, flow: FlowKind) -> Challenge {
        Challenge::new(id.into(), flow, ChallengeMethod::Email)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn get_before_set_is_absent() {
        let store = ChallengeStore::new();
        assert_eq!(store.get(FlowKind::Login).await.unwrap(), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn set_supersedes_previous_challenge() {
        let store = ChallengeStore::new();
        store.set(challenge("c1", FlowKind::Login)).await.unwrap();
        store.set(challenge("c2", FlowKind::Login)).await.unwrap();

        let active = store.get(FlowKind::Login).await.unwrap().unwrap();
        assert_eq!(active.challenge_id, "c2");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn flows_are_isolated() {
        let store = ChallengeStore::new();
        store.set(challenge("c1", FlowKind::Login)).await.unwrap();
        store
            .set(challenge("p1", FlowKind::PasswordReset))
            .await
            .unwrap();

        store.clear(FlowKind::Login).await.unwrap();
        assert_eq!(store.get(FlowKind::Login).await.unwrap(), None);
        assert!(store.get(FlowKind::PasswordReset).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn record_attempt_increments() {
        let store = ChallengeStore::new();
        store.set(challenge("c1", FlowKind::Login)).await.unwrap();

        assert_eq!(store.record_attempt(FlowKind::Login).await.unwrap(), 1);
        assert_eq!(store.record_attempt(FlowKind::Login).await.unwrap(), 2);

        // A superseding challenge starts over.
        store.set(challenge("c2", FlowKind::Login)).await.unwrap();
        assert_eq!(store.record_attempt(FlowKind::Login).await.unwrap(), 1);
    }
}
