//! Session credential storage and the token extraction contract.

use std::sync::Arc;

use entrar_state::{register_repository_item, Repository, RepositoryError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Field names that may carry the session token in a terminal response, in
/// priority order. The first field present with a non-empty string wins.
/// This is a documented contract with the identity service, not opportunistic
/// probing: servers of different vintages use different field names.
const TOKEN_FIELDS: &[&str] = &["access_token", "token", "jwt"];

const CREDENTIAL_KEY: &str = "session_credential";

/// The access credential issued when a login flow completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    /// Bearer token for the authenticated session.
    pub token: String,
}

register_repository_item!(SessionCredential, "SessionCredential");

/// Errors from storing or retrieving the session credential.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No token field was present in a nominally successful response.
    #[error("Response did not contain a session credential (access_token, token or jwt)")]
    MissingCredential,

    /// The storage backend failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Persists and exposes the session credential.
///
/// The backing repository is supplied by the embedder and is expected to be
/// durable across restarts, unlike the session-scoped challenge store. The
/// orchestrator calls [`SessionClient::store`] only from a login flow's
/// terminal transition; nothing else writes the credential.
#[derive(Clone)]
pub struct SessionClient {
    repository: Arc<dyn Repository<SessionCredential>>,
}

impl SessionClient {
    /// Creates a session client over the given credential repository.
    pub fn new(repository: Arc<dyn Repository<SessionCredential>>) -> Self {
        Self { repository }
    }

    /// Extracts the token from a terminal response and persists it.
    ///
    /// Fails with [`SessionError::MissingCredential`] when no token field is
    /// present — a flow must treat that as a failure even though the request
    /// itself succeeded. Storing the same artifact twice is harmless.
    pub async fn store(&self, artifact: &Value) -> Result<SessionCredential, SessionError> {
        let token = extract_token(artifact).ok_or(SessionError::MissingCredential)?;
        let credential = SessionCredential {
            token: token.to_owned(),
        };
        self.repository
            .set(CREDENTIAL_KEY.into(), credential.clone())
            .await?;
        Ok(credential)
    }

    /// The current session credential, if one is stored. Absence means the
    /// user is not authenticated.
    pub async fn current(&self) -> Result<Option<SessionCredential>, SessionError> {
        Ok(self.repository.get(CREDENTIAL_KEY.into()).await?)
    }

    /// Drops the stored credential (logout or explicit invalidation).
    pub async fn clear(&self) -> Result<(), SessionError> {
        Ok(self.repository.remove(CREDENTIAL_KEY.into()).await?)
    }
}

fn extract_token(artifact: &Value) -> Option<&str> {
    TOKEN_FIELDS.iter().find_map(|field| {
        artifact
            .get(field)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
    })
}
