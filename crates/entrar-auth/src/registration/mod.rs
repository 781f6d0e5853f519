//! Registration with out-of-band verification.
//!
//! After the initial registration request the flow branches: a challenge id
//! means the account verifies by SMS code, while a bare confirmation means a
//! verification link was emailed and the flow waits for the user to follow
//! it. The email-link state has no submit action of its own; it resolves
//! through a one-shot token check triggered by the link.

use std::sync::{Arc, RwLock};

use entrar_core::Client;

use crate::{
    api::{
        endpoint::Endpoint,
        request::{RegisterRequest, ResendPayload, SmsVerifyPayload},
        response::{ChallengeIssuedResponse, OkResponse},
    },
    challenge::{Challenge, ChallengeMethod, ChallengeStore},
    flow::{
        common::FlowCommon,
        engine::{Begin, FlowEngine},
        FlowError, FlowKind, FlowPolicy, FlowState, TerminalArtifact,
    },
};

/// Drives the registration flow. Clones share the same flow instance.
#[derive(Clone)]
pub struct RegistrationClient {
    common: Arc<FlowCommon>,
    context: Arc<RwLock<RegistrationContext>>,
}

#[derive(Default)]
struct RegistrationContext {
    /// Email of the account being registered, kept for verification and
    /// resends.
    email: Option<String>,
    resends: u32,
}

impl RegistrationClient {
    pub(crate) fn new(client: Client, challenges: ChallengeStore, policy: FlowPolicy) -> Self {
        Self {
            common: Arc::new(FlowCommon {
                client,
                engine: FlowEngine::new(FlowKind::Register),
                challenges,
                policy,
            }),
            context: Arc::new(RwLock::new(RegistrationContext::default())),
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

    /// Returns the flow to `Idle`, dropping the active challenge.
    pub async fn reset(&self) -> FlowState {
        self.common.clear_challenge().await;
        *self
            .context
            .write()
            .expect("RwLock should not be poisoned") = RegistrationContext::default();
        self.common.engine.reset()
    }

    /// Submits the registration details. Allowed from `Idle` and, to permit
    /// resubmission after a rejection, from `Failed`.
    pub async fn submit_details(&self, request: RegisterRequest) -> FlowState {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return self
                .common
                .engine
                .reject(FlowError::Validation("Email and password are required".into()));
        }

        let attempt = match self.common.engine.begin(
            "submit_details",
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
            context.resends = 0;
        }

        let result = self
            .common
            .api()
            .post(Endpoint::Register.path(), &request)
            .await;
        if let Some(state) = self.common.engine.discard_if_stale(attempt) {
            return state;
        }
        match result {
            Ok(body) => {
                let issued: ChallengeIssuedResponse =
                    serde_json::from_value(body).unwrap_or_default();
                let issued_ok = issued.ok;
                if let Some(challenge_id) = issued.issued_challenge() {
                    let challenge =
                        Challenge::new(challenge_id, FlowKind::Register, ChallengeMethod::Sms);
                    if let Err(state) = self.common.store_challenge(attempt, challenge).await {
                        return state;
                    }
                    return self
                        .common
                        .engine
                        .complete(attempt, FlowState::AwaitingChallengeCode);
                }
                if issued_ok == Some(true) {
                    return self
                        .common
                        .engine
                        .complete(attempt, FlowState::AwaitingEmailClick);
                }
                self.common.engine.fail(
                    attempt,
                    FlowError::InvalidResponse(
                        "Registration confirmed neither a challenge nor a verification email"
                            .into(),
                    ),
                    None,
                )
            }
            Err(error) => self.common.engine.fail(attempt, error.into(), None),
        }
    }

    /// Submits the SMS verification code. A rejected code keeps the flow in
    /// `AwaitingChallengeCode` for another try.
    pub async fn submit_code(&self, code: &str) -> FlowState {
        let code = code.trim();
        if code.is_empty() {
            return self
                .common
                .engine
                .reject(FlowError::Validation("Verification code is required".into()));
        }

        let attempt = match self.common.engine.begin(
            "submit_code",
            |state| matches!(state, FlowState::AwaitingChallengeCode),
            None,
        ) {
            Begin::Started(attempt) => attempt,
            Begin::Busy(state) | Begin::Violation(state) => return state,
        };

        // The verify endpoint is keyed by email, but the challenge still
        // gates the state machine: expired or superseded challenges must not
        // reach the server.
        if let Err(state) = self.common.active_challenge(attempt, "submit_code").await {
            return state;
        }

        let email = self
            .context
            .read()
            .expect("RwLock should not be poisoned")
            .email
            .clone();
        let Some(email) = email else {
            return self.common.engine.fail(
                attempt,
                FlowError::StateViolation {
                    action: "submit_code",
                    state: "no email on record".into(),
                },
                None,
            );
        };

        let payload = SmsVerifyPayload {
            email,
            code: code.to_owned(),
        };
        let result = self
            .common
            .api()
            .post(Endpoint::VerifySms.path(), &payload)
            .await;
        if let Some(state) = self.common.engine.discard_if_stale(attempt) {
            return state;
        }
        match result {
            Ok(body) => {
                let outcome: OkResponse = serde_json::from_value(body).unwrap_or_default();
                match outcome.ok {
                    Some(true) => {
                        self.common.clear_challenge().await;
                        self.common
                            .engine
                            .complete(attempt, FlowState::Success(TerminalArtifact::Verified))
                    }
                    Some(false) => {
                        self.common
                            .code_rejected(
                                attempt,
                                "The verification code was rejected".into(),
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

    /// Checks the token the user received by email link. One-shot: a positive
    /// outcome completes the flow, a negative one fails it — the flow never
    /// stays pending after the server has spoken.
    pub async fn verify_email_token(&self, token: &str) -> FlowState {
        let token = token.trim();
        if token.is_empty() {
            return self
                .common
                .engine
                .reject(FlowError::Validation("Verification token is required".into()));
        }

        let attempt = match self.common.engine.begin(
            "verify_email_token",
            |state| matches!(state, FlowState::AwaitingEmailClick),
            None,
        ) {
            Begin::Started(attempt) => attempt,
            Begin::Busy(state) | Begin::Violation(state) => return state,
        };

        let result = self
            .common
            .api()
            .get(
                Endpoint::VerifyEmailToken.path(),
                &[("token", token), ("json", "1")],
            )
            .await;
        if let Some(state) = self.common.engine.discard_if_stale(attempt) {
            return state;
        }
        match result {
            Ok(body) => {
                let outcome: OkResponse = serde_json::from_value(body).unwrap_or_default();
                match outcome.ok {
                    Some(true) => self
                        .common
                        .engine
                        .complete(attempt, FlowState::Success(TerminalArtifact::Verified)),
                    Some(false) => self.common.engine.fail(
                        attempt,
                        FlowError::InvalidChallenge("Email verification was rejected".into()),
                        None,
                    ),
                    None => self.common.engine.fail(
                        attempt,
                        FlowError::InvalidResponse(
                            "Verification response did not include an outcome".into(),
                        ),
                        None,
                    ),
                }
            }
            // The user can follow the link again once the network recovers.
            Err(error) => self.common.engine.fail(
                attempt,
                error.into(),
                Some(FlowState::AwaitingEmailClick),
            ),
        }
    }

    /// Requests that the verification be re-sent: the SMS code while a
    /// challenge is active, or the email link while waiting for the click.
    /// A re-sent SMS challenge supersedes the previous one.
    pub async fn resend(&self) -> FlowState {
        let attempt = match self.common.engine.begin(
            "resend",
            |state| {
                matches!(
                    state,
                    FlowState::AwaitingChallengeCode | FlowState::AwaitingEmailClick
                )
            },
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
                Some(self.common.engine.state()),
            );
        }

        let email = self
            .context
            .read()
            .expect("RwLock should not be poisoned")
            .email
            .clone();
        let Some(email) = email else {
            return self.common.engine.fail(
                attempt,
                FlowError::StateViolation {
                    action: "resend",
                    state: "no email on record".into(),
                },
                None,
            );
        };

        match self.common.engine.state() {
            FlowState::AwaitingChallengeCode => {
                let challenge = match self.common.active_challenge(attempt, "resend").await {
                    Ok(challenge) => challenge,
                    Err(state) => return state,
                };
                let result = self
                    .common
                    .api()
                    .post(Endpoint::ResendSms.path(), &ResendPayload { email })
                    .await;
                if let Some(state) = self.common.engine.discard_if_stale(attempt) {
                    return state;
                }
                match result {
                    Ok(body) => {
                        let issued: ChallengeIssuedResponse =
                            serde_json::from_value(body).unwrap_or_default();
                        let reissued = Challenge::new(
                            issued
                                .issued_challenge()
                                .unwrap_or(challenge.challenge_id),
                            FlowKind::Register,
                            ChallengeMethod::Sms,
                        );
                        if let Err(state) = self.common.store_challenge(attempt, reissued).await {
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
                    Err(error) => self.common.engine.fail(
                        attempt,
                        error.into(),
                        Some(FlowState::AwaitingChallengeCode),
                    ),
                }
            }
            FlowState::AwaitingEmailClick => {
                let result = self
                    .common
                    .api()
                    .post(Endpoint::ResendEmail.path(), &ResendPayload { email })
                    .await;
                if let Some(state) = self.common.engine.discard_if_stale(attempt) {
                    return state;
                }
                match result {
                    Ok(_) => {
                        self.context
                            .write()
                            .expect("RwLock should not be poisoned")
                            .resends += 1;
                        self.common
                            .engine
                            .complete(attempt, FlowState::AwaitingEmailClick)
                    }
                    Err(error) => self.common.engine.fail(
                        attempt,
                        error.into(),
                        Some(FlowState::AwaitingEmailClick),
                    ),
                }
            }
            // The flow was reset out from under the attempt; applying the
            // stale attempt below is a no-op either way.
            other => self.common.engine.fail(
                attempt,
                FlowError::StateViolation {
                    action: "resend",
                    state: other.to_string(),
                },
                None,
            ),
        }
    }
}
