/// Logical endpoints exposed by the identity service. Flows address the
/// service through these names; the path mapping lives here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Login,
    TwoFactorVerify,
    Register,
    VerifySms,
    VerifyEmailToken,
    ResendEmail,
    ResendSms,
    PasswordForgot,
    PasswordVerify,
    PasswordReset,
}

impl Endpoint {
    /// The request path for this endpoint, relative to the API base URL.
    pub(crate) fn path(self) -> &'static str {
        match self {
            Endpoint::Login => "/auth/login",
            Endpoint::TwoFactorVerify => "/auth/2fa/verify",
            Endpoint::Register => "/auth/register",
            Endpoint::VerifySms => "/auth/verify-sms",
            Endpoint::VerifyEmailToken => "/auth/verify-email",
            Endpoint::ResendEmail => "/auth/resend-email",
            Endpoint::ResendSms => "/auth/resend-sms",
            Endpoint::PasswordForgot => "/auth/password/forgot",
            Endpoint::PasswordVerify => "/auth/password/verify",
            Endpoint::PasswordReset => "/auth/password/reset",
        }
    }
}
