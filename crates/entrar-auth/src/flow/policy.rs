use chrono::{Duration, Utc};

use crate::challenge::Challenge;

/// Configurable limits applied by the flow orchestrator.
///
/// The identity service does not document challenge lifetimes or attempt
/// budgets, so none are assumed: every limit is opt-in and unlimited by
/// default.
#[derive(Debug, Clone, Default)]
pub struct FlowPolicy {
    /// How long an issued challenge stays usable. An expired challenge reads
    /// as absent, forcing a restart from the credential step.
    pub challenge_ttl: Option<Duration>,
    /// Failed code submissions tolerated per challenge before the flow fails.
    /// Resends reset the counter along with the challenge.
    pub max_code_attempts: Option<u32>,
    /// Resends tolerated per flow run before further resends are rejected.
    pub max_resends: Option<u32>,
}

impl FlowPolicy {
    /// Whether `challenge` has outlived the configured TTL.
    pub(crate) fn challenge_expired(&self, challenge: &Challenge) -> bool {
        self.challenge_ttl
            .is_some_and(|ttl| Utc::now() - challenge.created_at >= ttl)
    }

    /// Whether another failed code submission is still within budget.
    pub(crate) fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.max_code_attempts.is_some_and(|max| attempts >= max)
    }

    /// Whether another resend is still within budget.
    pub(crate) fn resends_exhausted(&self, resends: u32) -> bool {
        self.max_resends.is_some_and(|max| resends >= max)
    }
}
