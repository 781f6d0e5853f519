//! Password recovery via a challenge/response exchange.
//!
//! Three steps: request a recovery challenge for an email, verify the
//! received code (which yields a short-lived reset token), then submit the
//! replacement password with that token. The terminal artifact is an
//! accepted reset, deliberately distinct from a login success: this flow
//! never touches the session credential store.

use std::sync::{Arc, RwLock};

use entrar_core::{require, Client};

use crate::{
    api::{
        endpoint::Endpoint,
        request::{ChallengeCodePayload, ForgotPasswordRequest, PasswordResetPayload},
        response::{ChallengeIssuedResponse, OkResponse, ResetVerifyResponse},
    },
    challenge::{Challenge, ChallengeMethod, ChallengeStore},
    flow::{
        common::FlowCommon,
        engine::{Begin, FlowEngine},
        FlowError, FlowKind, FlowPolicy, FlowState, TerminalArtifact,
    },
};

/// A positive code verification must carry the reset token; without it the
/// flow cannot continue and must fail rather than pretend to.
fn verified_reset_token(outcome: ResetVerifyResponse) -> Result<String, FlowError> {
    Ok(require!(outcome.token.filter(|token| !token.is_empty())))
}

/// Drives the password recovery flow. Clones share the same flow instance.
#[derive(Clone)]
pub struct PasswordResetClient {
    common: Arc<FlowCommon>,
    context: Arc<RwLock<ResetContext>>,
}

#[derive(Default)]
struct ResetContext {
    /// Email the recovery was requested for, kept for resends.
    email: Option<String>,
    /// Delivery method chosen for the recovery code.
    method: Option<ChallengeMethod>,
    /// Token issued by a successful code verification, consumed by the final
    /// reset request.
    reset_token: Option<String>,
    resends: u32,
}

impl PasswordResetClient {
    pub(crate) fn new(client: Client, challenges: ChallengeStore, policy: FlowPolicy) -> Self {
        Self {
            common: Arc::new(FlowCommon {
                client,
                engine: FlowEngine::new(FlowKind::PasswordReset),
                challenges,
                policy,
            }),
            context: Arc::new(RwLock::new(ResetContext::default())),
        }
    }

    /// Current position of the flow.
    pub fn state(&self) -> FlowState {
        self.common.engine.state()
    }

    /// The most recent error, retained until the next action changes state.
    pub fn last_error(&self) -> Option<FlowError> {
        self.common.engine.last_error()
    }

    /// Whether a request is currently in flight.
    pub fn is_in_flight(&self) -> bool {
        self.common.engine.is_in_flight()
    }

    /// Abandons the in-flight request, if any; its late response is discarded.
    pub fn cancel(&self) {
        self.common.engine.cancel();
    }

    /// Returns the flow to `Idle`, dropping the active challenge and any
    /// reset token.
    pub async fn reset(&self) -> FlowState {
        self.common.clear_challenge().await;
        *self
            .context
            .write()
            .expect("RwLock should not be poisoned") = ResetContext::default();
        self.common.engine.reset()
    }

    /// Requests a recovery challenge for the given email. Allowed from `Idle`
    /// and, to permit another try after a rejection, from `Failed`.
    pub async fn submit_email(&self, request: ForgotPasswordRequest) -> FlowState {
        if request.email.trim().is_empty() {
            return self
                .common
                .engine
                .reject(FlowError::Validation("Email is required".into()));
        }

        let attempt = match self.common.engine.begin(
            "submit_email",
            |state| matches!(state, FlowState::Idle | FlowState::Failed(_)),
            Some(FlowState::AwaitingCredentials),
        ) {
            Begin::Started(attempt) => attempt,
            Begin::Busy(state) | Begin::Violation(state) => return state,
        };

        {
            let mut context = self
                .context
                .write()
                .expect("RwLock should not be poisoned");
            context.email = Some(request.email.clone());
            context.method = Some(request.method);
            context.reset_token = None;
            context.resends = 0;
        }

        let result = self
            .common
            .api()
            .post(Endpoint::PasswordForgot.path(), &request)
            .await;
        if let Some(state) = self.common.engine.discard_if_stale(attempt) {
            return state;
        }
        match result {
            Ok(body) => {
                let issued: ChallengeIssuedResponse =
                    serde_json::from_value(body).unwrap_or_default();
                match issued.issued_challenge() {
                    Some(challenge_id) => {
                        let challenge =
                            Challenge::new(challenge_id, FlowKind::PasswordReset, request.method);
                        if let Err(state) = self.common.store_challenge(attempt, challenge).await {
                            return state;
                        }
                        self.common
                            .engine
                            .complete(attempt, FlowState::AwaitingChallengeCode)
                    }
                    None => self.common.engine.fail(
                        attempt,
                        FlowError::InvalidResponse(
                            "Recovery response did not include a challenge".into(),
                        ),
                        None,
                    ),
                }
            }
            Err(error) => self.common.engine.fail(attempt, error.into(), None),
        }
    }

    /// Submits the recovery code. On success the server issues the reset
    /// token and the flow waits for the replacement password; a rejected code
    /// keeps the flow in `AwaitingChallengeCode` for another try.
    pub async fn submit_code(&self, code: &str) -> FlowState {
        let code = code.trim();
        if code.is_empty() {
            return self
                .common
                .engine
                .reject(FlowError::Validation("Recovery code is required".into()));
        }

        let attempt = match self.common.engine.begin(
            "submit_code",
            |state| matches!(state, FlowState::AwaitingChallengeCode),
            None,
        ) {
            Begin::Started(attempt) => attempt,
            Begin::Busy(state) | Begin::Violation(state) => return state,
        };

        let challenge = match self.common.active_challenge(attempt, "submit_code").await {
            Ok(challenge) => challenge,
            Err(state) => return state,
        };

        let payload = ChallengeCodePayload {
            challenge_id: challenge.challenge_id,
            code: code.to_owned(),
        };
        let result = self
            .common
            .api()
            .post(Endpoint::PasswordVerify.path(), &payload)
            .await;
        if let Some(state) = self.common.engine.discard_if_stale(attempt) {
            return state;
        }
        match result {
            Ok(body) => {
                let outcome: ResetVerifyResponse = serde_json::from_value(body).unwrap_or_default();
                match outcome.ok {
                    Some(true) => {
                        let token = match verified_reset_token(outcome) {
                            Ok(token) => token,
                            Err(error) => return self.common.engine.fail(attempt, error, None),
                        };
                        self.context
                            .write()
                            .expect("RwLock should not be poisoned")
                            .reset_token = Some(token);
                        self.common.clear_challenge().await;
                        self.common
                            .engine
                            .complete(attempt, FlowState::AwaitingNewPassword)
                    }
                    Some(false) => {
                        self.common
                            .code_rejected(
                                attempt,
                                "The recovery code was rejected".into(),
                                FlowState::AwaitingChallengeCode,
                            )
                            .await
                    }
                    None => self.common.engine.fail(
                        attempt,
                        FlowError::InvalidResponse(
                            "Verification response did not include an outcome".into(),
                        ),
                        None,
                    ),
                }
            }
            Err(error) => {
                self.common
                    .code_rejection(attempt, error, FlowState::AwaitingChallengeCode)
                    .await
            }
        }
    }

    /// Submits the replacement password using the verified reset token. The
    /// terminal artifact is an accepted reset, never a session credential.
    pub async fn submit_new_password(&self, password: &str) -> FlowState {
        if password.is_empty() {
            return self
                .common
                .engine
                .reject(FlowError::Validation("A new password is required".into()));
        }

        let attempt = match self.common.engine.begin(
            "submit_new_password",
            |state| matches!(state, FlowState::AwaitingNewPassword),
            None,
        ) {
            Begin::Started(attempt) => attempt,
            Begin::Busy(state) | Begin::Violation(state) => return state,
        };

        let token = self
            .context
            .read()
            .expect("RwLock should not be poisoned")
            .reset_token
            .clone();
        let Some(token) = token else {
            return self.common.engine.fail(
                attempt,
                FlowError::StateViolation {
                    action: "submit_new_password",
                    state: "no reset token on record".into(),
                },
                None,
            );
        };

        let payload = PasswordResetPayload {
            token,
            password: password.to_owned(),
        };
        let result = self
            .common
            .api()
            .post(Endpoint::PasswordReset.path(), &payload)
            .await;
        if let Some(state) = self.common.engine.discard_if_stale(attempt) {
            return state;
        }
        match result {
            Ok(body) => {
                let outcome: OkResponse = serde_json::from_value(body).unwrap_or_default();
                match outcome.ok {
                    Some(true) => {
                        self.context
                            .write()
                            .expect("RwLock should not be poisoned")
                            .reset_token = None;
                        self.common
                            .engine
                            .complete(attempt, FlowState::Success(TerminalArtifact::ResetAccepted))
                    }
                    // A rejected token cannot be retried; the flow must
                    // restart from the email step.
                    Some(false) => self.common.engine.fail(
                        attempt,
                        FlowError::InvalidChallenge("The reset token was rejected".into()),
                        None,
                    ),
                    None => self.common.engine.fail(
                        attempt,
                        FlowError::InvalidResponse(
                            "Reset response did not include an outcome".into(),
                        ),
                        None,
                    ),
                }
            }
            // Password policy rejections arrive as server errors; the user
            // may try a different password with the same token.
            Err(error) => self.common.engine.fail(
                attempt,
                error.into(),
                Some(FlowState::AwaitingNewPassword),
            ),
        }
    }

    /// Requests a fresh recovery challenge for the same email, superseding
    /// the previous one.
    pub async fn resend(&self) -> FlowState {
        let attempt = match self.common.engine.begin(
            "resend",
            |state| matches!(state, FlowState::AwaitingChallengeCode),
            None,
        ) {
            Begin::Started(attempt) => attempt,
            Begin::Busy(state) | Begin::Violation(state) => return state,
        };

        let resends = self
            .context
            .read()
            .expect("RwLock should not be poisoned")
            .resends;
        if self.common.policy.resends_exhausted(resends) {
            return self.common.engine.fail(
                attempt,
                FlowError::StateViolation {
                    action: "resend",
                    state: "resend budget exhausted".into(),
                },
                Some(FlowState::AwaitingChallengeCode),
            );
        }

        if let Err(state) = self.common.active_challenge(attempt, "resend").await {
            return state;
        }

        let (email, method) = {
            let context = self.context.read().expect("RwLock should not be poisoned");
            (context.email.clone(), context.method)
        };
        let (Some(email), Some(method)) = (email, method) else {
            return self.common.engine.fail(
                attempt,
                FlowError::StateViolation {
                    action: "resend",
                    state: "no recovery request on record".into(),
                },
                None,
            );
        };

        // Recovery has no dedicated resend endpoint; re-requesting the
        // challenge re-issues the code.
        let request = ForgotPasswordRequest { email, method };
        let result = self
            .common
            .api()
            .post(Endpoint::PasswordForgot.path(), &request)
            .await;
        if let Some(state) = self.common.engine.discard_if_stale(attempt) {
            return state;
        }
        match result {
            Ok(body) => {
                let issued: ChallengeIssuedResponse =
                    serde_json::from_value(body).unwrap_or_default();
                match issued.issued_challenge() {
                    Some(challenge_id) => {
                        let challenge =
                            Challenge::new(challenge_id, FlowKind::PasswordReset, method);
                        if let Err(state) = self.common.store_challenge(attempt, challenge).await {
                            return state;
                        }
                        self.context
                            .write()
                            .expect("RwLock should not be poisoned")
                            .resends += 1;
                        self.common
                            .engine
                            .complete(attempt, FlowState::AwaitingChallengeCode)
                    }
                    None => self.common.engine.fail(
                        attempt,
                        FlowError::InvalidResponse(
                            "Recovery response did not include a challenge".into(),
                        ),
                        Some(FlowState::AwaitingChallengeCode),
                    ),
                }
            }
            Err(error) => self.common.engine.fail(
                attempt,
                error.into(),
                Some(FlowState::AwaitingChallengeCode),
            ),
        }
    }
}
