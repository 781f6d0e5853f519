use std::sync::RwLock;

use tracing::{debug, info, warn};

use crate::flow::{FlowError, FlowKind, FlowState};

/// Generic state machine mechanics shared by every flow: the current state,
/// the retained last error, and the in-flight request guard.
///
/// Each request-bearing action first calls [`FlowEngine::begin`], performs the
/// network call without holding any lock, and then applies the outcome with
/// [`FlowEngine::complete`] or [`FlowEngine::fail`] using the attempt id it
/// was handed. A response whose attempt is no longer current — because the
/// flow was cancelled, reset, or a newer attempt started — is discarded
/// rather than applied out of order.
pub(crate) struct FlowEngine {
    kind: FlowKind,
    inner: RwLock<EngineInner>,
}

struct EngineInner {
    state: FlowState,
    last_error: Option<FlowError>,
    in_flight: Option<u64>,
    attempts_started: u64,
}

/// Outcome of trying to start a request-bearing action.
pub(crate) enum Begin {
    /// The action may proceed; resolve it with the given attempt id.
    Started(u64),
    /// Another request is in flight; the action was ignored.
    Busy(FlowState),
    /// The current state forbids the action; the flow failed loudly.
    Violation(FlowState),
}

impl FlowEngine {
    pub(crate) fn new(kind: FlowKind) -> Self {
        Self {
            kind,
            inner: RwLock::new(EngineInner {
                state: FlowState::Idle,
                last_error: None,
                in_flight: None,
                attempts_started: 0,
            }),
        }
    }

    pub(crate) fn kind(&self) -> FlowKind {
        self.kind
    }

    pub(crate) fn state(&self) -> FlowState {
        self.read().state.clone()
    }

    pub(crate) fn last_error(&self) -> Option<FlowError> {
        self.read().last_error.clone()
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.read().in_flight.is_some()
    }

    /// Starts `action` if no request is in flight and the current state
    /// satisfies `allowed`. `transit` replaces the state tag for the duration
    /// of the request (e.g. a credential submission shows as
    /// `AwaitingCredentials` while in flight).
    pub(crate) fn begin(
        &self,
        action: &'static str,
        allowed: impl FnOnce(&FlowState) -> bool,
        transit: Option<FlowState>,
    ) -> Begin {
        let mut inner = self.write();

        if inner.in_flight.is_some() {
            debug!(flow = %self.kind, action, "ignoring action, a request is already in flight");
            return Begin::Busy(inner.state.clone());
        }

        if !allowed(&inner.state) {
            let error = FlowError::StateViolation {
                action,
                state: inner.state.to_string(),
            };
            warn!(flow = %self.kind, action, state = %inner.state, "action not allowed in current state");
            inner.state = FlowState::Failed(error.clone());
            inner.last_error = Some(error);
            return Begin::Violation(inner.state.clone());
        }

        inner.attempts_started += 1;
        let attempt = inner.attempts_started;
        inner.in_flight = Some(attempt);
        if let Some(state) = transit {
            inner.state = state;
        }
        info!(flow = %self.kind, action, attempt, "user action started");
        Begin::Started(attempt)
    }

    /// Checks whether `attempt` is still the one in flight. Response handlers
    /// call this right after the network call returns, before any side effect
    /// (storing a credential or challenge, counting an attempt): a response
    /// that arrived after the flow was cancelled or reset is discarded here.
    /// The final transition re-checks under the same lock.
    pub(crate) fn discard_if_stale(&self, attempt: u64) -> Option<FlowState> {
        let inner = self.read();
        if inner.in_flight == Some(attempt) {
            return None;
        }
        warn!(flow = %self.kind, attempt, "discarding stale response");
        Some(inner.state.clone())
    }

    /// Applies a successful transition for `attempt`.
    pub(crate) fn complete(&self, attempt: u64, next: FlowState) -> FlowState {
        let mut inner = self.write();
        if inner.in_flight != Some(attempt) {
            warn!(flow = %self.kind, attempt, "discarding stale response");
            return inner.state.clone();
        }
        inner.in_flight = None;
        inner.last_error = None;
        info!(flow = %self.kind, attempt, from = %inner.state, to = %next, "flow advanced");
        inner.state = next;
        inner.state.clone()
    }

    /// Applies a failed transition for `attempt`. With `retry_state` the flow
    /// stays in (or returns to) a retryable state and only retains the error;
    /// without it the flow fails.
    pub(crate) fn fail(
        &self,
        attempt: u64,
        error: FlowError,
        retry_state: Option<FlowState>,
    ) -> FlowState {
        let mut inner = self.write();
        if inner.in_flight != Some(attempt) {
            warn!(flow = %self.kind, attempt, "discarding stale response");
            return inner.state.clone();
        }
        inner.in_flight = None;
        warn!(flow = %self.kind, attempt, %error, "flow action failed");
        inner.state = match retry_state {
            Some(state) => state,
            None => FlowState::Failed(error.clone()),
        };
        inner.last_error = Some(error);
        inner.state.clone()
    }

    /// Retains a pre-request rejection (e.g. input validation) without
    /// changing the state tag or touching the in-flight guard.
    pub(crate) fn reject(&self, error: FlowError) -> FlowState {
        let mut inner = self.write();
        debug!(flow = %self.kind, %error, "action rejected before any request was made");
        inner.last_error = Some(error);
        inner.state.clone()
    }

    /// Forgets the in-flight request, if any. Its response, once it arrives,
    /// no longer matches the current attempt and is discarded.
    pub(crate) fn cancel(&self) {
        let mut inner = self.write();
        if inner.in_flight.take().is_some() {
            debug!(flow = %self.kind, "in-flight request cancelled");
        }
    }

    /// Returns the flow to `Idle`, dropping any retained error.
    pub(crate) fn reset(&self) -> FlowState {
        let mut inner = self.write();
        inner.in_flight = None;
        inner.last_error = None;
        inner.state = FlowState::Idle;
        info!(flow = %self.kind, "flow reset");
        inner.state.clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, EngineInner> {
        self.inner.read().expect("RwLock should not be poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, EngineInner> {
        self.inner.write().expect("RwLock should not be poisoned")
    }
}
