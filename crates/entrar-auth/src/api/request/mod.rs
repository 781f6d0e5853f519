//! Request payloads sent to the identity service.

use serde::Serialize;

use crate::challenge::ChallengeMethod;

/// Payload for the login endpoint. Ephemeral: exists only for the duration of
/// the request and is never stored.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    /// Account email address.
    pub email: String,
    /// Account password.
    pub password: String,
    /// Preferred second-factor delivery method, when the account requires one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<ChallengeMethod>,
}

/// Payload for the register endpoint.
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    /// Display name for the new account.
    pub name: String,
    /// Account email address.
    pub email: String,
    /// Account password.
    pub password: String,
    /// Phone number for SMS verification, when chosen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Payload for the password-forgot endpoint.
#[derive(Debug, Serialize)]
pub struct ForgotPasswordRequest {
    /// Account email address.
    pub email: String,
    /// Where the recovery code should be delivered.
    pub method: ChallengeMethod,
}

/// Payload for code verification against a challenge (2FA and password
/// recovery).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChallengeCodePayload {
    pub challenge_id: String,
    pub code: String,
}

/// Payload for SMS code verification during registration, which the service
/// keys by email rather than challenge id.
#[derive(Debug, Serialize)]
pub(crate) struct SmsVerifyPayload {
    pub email: String,
    pub code: String,
}

/// Payload for the resend endpoints.
#[derive(Debug, Serialize)]
pub(crate) struct ResendPayload {
    pub email: String,
}

/// Payload for the password-reset endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct PasswordResetPayload {
    pub token: String,
    pub password: String,
}
