use entrar_core::{api::ApiConfiguration, ApiError, Client};
use tracing::warn;

use crate::{
    challenge::{Challenge, ChallengeStore},
    flow::{engine::FlowEngine, FlowError, FlowPolicy, FlowState},
};

/// State shared by every flow client: the core client, the state engine, the
/// challenge store, and the policy. Flow clients wrap this in an `Arc` so
/// that clones of a client drive the same flow instance.
pub(crate) struct FlowCommon {
    pub(crate) client: Client,
    pub(crate) engine: FlowEngine,
    pub(crate) challenges: ChallengeStore,
    pub(crate) policy: FlowPolicy,
}

impl FlowCommon {
    pub(crate) fn api(&self) -> &ApiConfiguration {
        self.client.internal.get_api_configuration()
    }

    /// Reads the active challenge for this flow, failing the attempt when
    /// none is usable: an absent or expired challenge means no verification
    /// is in progress and the flow must restart from the credential step.
    pub(crate) async fn active_challenge(
        &self,
        attempt: u64,
        action: &'static str,
    ) -> Result<Challenge, FlowState> {
        let flow = self.engine.kind();
        match self.challenges.get(flow).await {
            Ok(Some(challenge)) => {
                if self.policy.challenge_expired(&challenge) {
                    self.clear_challenge().await;
                    return Err(self.engine.fail(
                        attempt,
                        FlowError::StateViolation {
                            action,
                            state: format!("{} (challenge expired)", self.engine.state()),
                        },
                        None,
                    ));
                }
                Ok(challenge)
            }
            Ok(None) => Err(self.engine.fail(
                attempt,
                FlowError::StateViolation {
                    action,
                    state: format!("{} (no active challenge)", self.engine.state()),
                },
                None,
            )),
            Err(error) => Err(self.engine.fail(attempt, error.into(), None)),
        }
    }

    /// Resolves a failed code verification request. Server rejections count
    /// against the challenge's attempt budget; transport failures do not.
    pub(crate) async fn code_rejection(
        &self,
        attempt: u64,
        error: ApiError,
        retry_state: FlowState,
    ) -> FlowState {
        match FlowError::from_code_rejection(error) {
            FlowError::InvalidChallenge(message) => {
                self.code_rejected(attempt, message, retry_state).await
            }
            other => self.engine.fail(attempt, other, Some(retry_state)),
        }
    }

    /// Records a rejected code against the attempt budget. Within budget the
    /// flow stays in `retry_state` with the error retained; past it the
    /// challenge is dropped and the flow fails.
    pub(crate) async fn code_rejected(
        &self,
        attempt: u64,
        message: String,
        retry_state: FlowState,
    ) -> FlowState {
        match self.challenges.record_attempt(self.engine.kind()).await {
            Ok(attempts) if self.policy.attempts_exhausted(attempts) => {
                self.clear_challenge().await;
                self.engine.fail(
                    attempt,
                    FlowError::InvalidChallenge("Too many failed attempts, restart the flow".into()),
                    None,
                )
            }
            Ok(_) => self.engine.fail(
                attempt,
                FlowError::InvalidChallenge(message),
                Some(retry_state),
            ),
            Err(storage) => self.engine.fail(attempt, storage.into(), None),
        }
    }

    /// Stores a freshly issued challenge, failing the attempt on a storage
    /// fault.
    pub(crate) async fn store_challenge(
        &self,
        attempt: u64,
        challenge: Challenge,
    ) -> Result<(), FlowState> {
        self.challenges
            .set(challenge)
            .await
            .map_err(|error| self.engine.fail(attempt, error.into(), None))
    }

    /// Drops this flow's challenge. Storage faults are logged, not surfaced:
    /// the caller is already on a terminal or superseding path.
    pub(crate) async fn clear_challenge(&self) {
        if let Err(error) = self.challenges.clear(self.engine.kind()).await {
            warn!(flow = %self.engine.kind(), %error, "failed to clear challenge");
        }
    }
}
