//! Response models for the identity service.
//!
//! Responses are decoded leniently: every field is optional and the flow
//! decides what a missing field means for its current step. Token fields are
//! deliberately not modeled here — extracting the session credential is the
//! session manager's contract.

use serde::Deserialize;

/// Response of endpoints that may issue a verification challenge.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChallengeIssuedResponse {
    pub challenge_id: Option<String>,
    pub ok: Option<bool>,
}

impl ChallengeIssuedResponse {
    /// The issued challenge id, treating an empty string as absent.
    pub(crate) fn issued_challenge(self) -> Option<String> {
        self.challenge_id.filter(|id| !id.is_empty())
    }
}

/// Response of verification endpoints that report a bare outcome flag.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OkResponse {
    pub ok: Option<bool>,
}

/// Response of the password-verify endpoint: the outcome flag plus the reset
/// token consumed by the final password-reset request.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResetVerifyResponse {
    pub ok: Option<bool>,
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn challenge_response_ignores_unknown_fields() {
        let response: ChallengeIssuedResponse =
            serde_json::from_value(json!({"challengeId": "c1", "expiresIn": 300})).unwrap();
        assert_eq!(response.issued_challenge(), Some("c1".into()));
    }

    #[test]
    fn empty_challenge_id_reads_as_absent() {
        let response: ChallengeIssuedResponse =
            serde_json::from_value(json!({"challengeId": ""})).unwrap();
        assert_eq!(response.issued_challenge(), None);
    }

    #[test]
    fn empty_body_has_no_outcome() {
        let response: OkResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response.ok, None);
    }
}
