use entrar_core::{ApiError, MissingFieldError};
use entrar_state::RepositoryError;
use thiserror::Error;

use crate::session::SessionError;

/// Errors surfaced by flow transitions.
///
/// Classification happens once, where a transport or storage result crosses
/// into the flow layer; afterwards the error is plain renderable data, which
/// is why this type is `Clone` and carries strings rather than sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// The request failed in transit or the server rejected it.
    #[error("{0}")]
    Transport(String),

    /// A nominally successful response carried no session credential.
    #[error("Response did not contain a session credential")]
    MissingCredential,

    /// The verification code was wrong, expired, or its challenge superseded.
    #[error("Invalid verification code: {0}")]
    InvalidChallenge(String),

    /// The response shape did not match what the flow requires.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// An action was attempted in a state that forbids it. This is a
    /// programming-level guard: it fails loudly instead of corrupting state.
    #[error("Action '{action}' is not allowed in state '{state}'")]
    StateViolation {
        /// The action that was attempted.
        action: &'static str,
        /// Description of the state that forbade it.
        state: String,
    },

    /// Input rejected before any request was made.
    #[error("{0}")]
    Validation(String),

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl FlowError {
    /// Classifies a transport failure during a code verification step. A
    /// server rejection means the code (or the challenge it belongs to) was
    /// not accepted; anything else is an ordinary transport failure.
    pub(crate) fn from_code_rejection(error: ApiError) -> Self {
        match error {
            ApiError::ResponseContent { message, .. } => FlowError::InvalidChallenge(message),
            other => FlowError::Transport(other.to_string()),
        }
    }
}

impl From<ApiError> for FlowError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::ResponseContent { message, .. } => FlowError::Transport(message),
            other => FlowError::Transport(other.to_string()),
        }
    }
}

impl From<MissingFieldError> for FlowError {
    fn from(error: MissingFieldError) -> Self {
        FlowError::InvalidResponse(error.to_string())
    }
}

impl From<RepositoryError> for FlowError {
    fn from(error: RepositoryError) -> Self {
        FlowError::Storage(error.to_string())
    }
}

impl From<SessionError> for FlowError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::MissingCredential => FlowError::MissingCredential,
            SessionError::Repository(error) => FlowError::Storage(error.to_string()),
        }
    }
}
