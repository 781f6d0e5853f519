use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{flow::FlowError, session::SessionCredential};

/// The authentication use cases this SDK can drive. Each kind is orchestrated
/// by an independent flow instance; they share nothing but the challenge
/// store, which is keyed by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Password login, optionally gated by a second factor.
    Login,
    /// Registration with out-of-band verification.
    Register,
    /// Password recovery via a challenge/response exchange.
    PasswordReset,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowKind::Login => "login",
            FlowKind::Register => "register",
            FlowKind::PasswordReset => "password_reset",
        };
        write!(f, "{}", name)
    }
}

/// The payload produced when a flow reaches its definitive success state.
///
/// Only a login flow produces a session credential; the other artifacts exist
/// so that, for example, an accepted password reset can never be mistaken for
/// an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalArtifact {
    /// A session credential was issued; the user is authenticated.
    Session(SessionCredential),
    /// Out-of-band verification completed.
    Verified,
    /// The server accepted the replacement password.
    ResetAccepted,
}

/// Current position of a flow.
///
/// `Success` and `Failed` are not auto-reset; callers must explicitly reset
/// the flow to start over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// Nothing submitted yet.
    Idle,
    /// Credentials (or the initial flow payload) were submitted and the
    /// request is in flight.
    AwaitingCredentials,
    /// The server issued a challenge; a verification code must be submitted.
    AwaitingChallengeCode,
    /// Registration completed pending the user following an emailed link.
    AwaitingEmailClick,
    /// The reset code was verified; a replacement password must be submitted.
    AwaitingNewPassword,
    /// The flow completed with the given terminal artifact.
    Success(TerminalArtifact),
    /// The flow failed; the error is kept until the next action changes state.
    Failed(FlowError),
}

impl FlowState {
    /// Whether the flow reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Success(_) | FlowState::Failed(_))
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            FlowState::Idle => "Idle",
            FlowState::AwaitingCredentials => "AwaitingCredentials",
            FlowState::AwaitingChallengeCode => "AwaitingChallengeCode",
            FlowState::AwaitingEmailClick => "AwaitingEmailClick",
            FlowState::AwaitingNewPassword => "AwaitingNewPassword",
            FlowState::Success(_) => "Success",
            FlowState::Failed(_) => "Failed",
        };
        write!(f, "{}", tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(FlowState::Success(TerminalArtifact::Verified).is_terminal());
        assert!(FlowState::Failed(FlowError::MissingCredential).is_terminal());
        assert!(!FlowState::Idle.is_terminal());
        assert!(!FlowState::AwaitingChallengeCode.is_terminal());
    }

    #[test]
    fn kind_display_matches_storage_keys() {
        assert_eq!(FlowKind::Login.to_string(), "login");
        assert_eq!(FlowKind::Register.to_string(), "register");
        assert_eq!(FlowKind::PasswordReset.to_string(), "password_reset");
    }
}
