//! Password login, optionally gated by a second factor.

use std::sync::{Arc, RwLock};

use entrar_core::Client;
use serde_json::Value;

use crate::{
    api::{
        endpoint::Endpoint,
        request::{ChallengeCodePayload, LoginRequest, ResendPayload},
        response::ChallengeIssuedResponse,
    },
    challenge::{Challenge, ChallengeMethod, ChallengeStore},
    flow::{
        common::FlowCommon,
        engine::{Begin, FlowEngine},
        FlowError, FlowKind, FlowPolicy, FlowState, TerminalArtifact,
    },
    session::SessionClient,
};

/// Drives the password login flow.
///
/// On success the issued session credential is handed to the session manager
/// before the flow reports `Success`; a response that carries neither a
/// challenge nor a token fails the flow rather than succeeding empty-handed.
/// Clones share the same flow instance.
#[derive(Clone)]
pub struct LoginClient {
    common: Arc<FlowCommon>,
    session: SessionClient,
    context: Arc<RwLock<LoginContext>>,
}

#[derive(Default)]
struct LoginContext {
    /// Email of the account being logged in, kept for resends.
    email: Option<String>,
    resends: u32,
}

impl LoginClient {
    pub(crate) fn new(
        client: Client,
        challenges: ChallengeStore,
        session: SessionClient,
        policy: FlowPolicy,
    ) -> Self {
        Self {
            common: Arc::new(FlowCommon {
                client,
                engine: FlowEngine::new(FlowKind::Login),
                challenges,
                policy,
            }),
            session,
            context: Arc::new(RwLock::new(LoginContext::default())),
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
            .expect("RwLock should not be poisoned") = LoginContext::default();
        self.common.engine.reset()
    }

    /// Submits the user's credentials. Allowed from `Idle` and, to permit
    /// resubmission after a rejection, from `Failed`.
    pub async fn submit_credentials(&self, request: LoginRequest) -> FlowState {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return self
                .common
                .engine
                .reject(FlowError::Validation("Email and password are required".into()));
        }

        let attempt = match self.common.engine.begin(
            "submit_credentials",
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

        let method = request.method;
        let result = self.common.api().post(Endpoint::Login.path(), &request).await;
        if let Some(state) = self.common.engine.discard_if_stale(attempt) {
            return state;
        }
        match result {
            Ok(body) => self.conclude_credentials(attempt, body, method).await,
            Err(error) => self.common.engine.fail(attempt, error.into(), None),
        }
    }

    /// Interprets the login response: a challenge id means a second factor is
    /// required, otherwise the body must carry the session token.
    async fn conclude_credentials(
        &self,
        attempt: u64,
        body: Value,
        method: Option<ChallengeMethod>,
    ) -> FlowState {
        let issued: ChallengeIssuedResponse = match serde_json::from_value(body.clone()) {
            Ok(issued) => issued,
            Err(error) => {
                return self.common.engine.fail(
                    attempt,
                    FlowError::InvalidResponse(error.to_string()),
                    None,
                )
            }
        };

        if let Some(challenge_id) = issued.issued_challenge() {
            let challenge = Challenge::new(
                challenge_id,
                FlowKind::Login,
                method.unwrap_or(ChallengeMethod::Email),
            );
            if let Err(state) = self.common.store_challenge(attempt, challenge).await {
                return state;
            }
            return self
                .common
                .engine
                .complete(attempt, FlowState::AwaitingChallengeCode);
        }

        match self.session.store(&body).await {
            Ok(credential) => self.common.engine.complete(
                attempt,
                FlowState::Success(TerminalArtifact::Session(credential)),
            ),
            Err(error) => self.common.engine.fail(attempt, error.into(), None),
        }
    }

    /// Submits a second-factor code against the active challenge. A rejected
    /// code keeps the flow in `AwaitingChallengeCode` for another try.
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
            .post(Endpoint::TwoFactorVerify.path(), &payload)
            .await;
        if let Some(state) = self.common.engine.discard_if_stale(attempt) {
            return state;
        }
        match result {
            Ok(body) => match self.session.store(&body).await {
                Ok(credential) => {
                    self.common.clear_challenge().await;
                    self.common.engine.complete(
                        attempt,
                        FlowState::Success(TerminalArtifact::Session(credential)),
                    )
                }
                Err(error) => self.common.engine.fail(attempt, error.into(), None),
            },
            Err(error) => {
                self.common
                    .code_rejection(attempt, error, FlowState::AwaitingChallengeCode)
                    .await
            }
        }
    }

    /// Requests a fresh verification code. The previous challenge is
    /// superseded, never merged: the next submission must use the newest
    /// challenge id, and the attempt counter starts over.
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

        let challenge = match self.common.active_challenge(attempt, "resend").await {
            Ok(challenge) => challenge,
            Err(state) => return state,
        };
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

        let endpoint = match challenge.method {
            ChallengeMethod::Email => Endpoint::ResendEmail,
            ChallengeMethod::Sms => Endpoint::ResendSms,
        };
        let result = self
            .common
            .api()
            .post(endpoint.path(), &ResendPayload { email })
            .await;
        if let Some(state) = self.common.engine.discard_if_stale(attempt) {
            return state;
        }
        match result {
            Ok(body) => {
                let issued: ChallengeIssuedResponse =
                    serde_json::from_value(body).unwrap_or_default();
                // Some deployments re-key the challenge in place and return no
                // id; the old challenge is superseded either way.
                let reissued = Challenge::new(
                    issued
                        .issued_challenge()
                        .unwrap_or(challenge.challenge_id),
                    FlowKind::Login,
                    challenge.method,
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
}
