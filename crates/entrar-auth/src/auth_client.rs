use std::sync::Arc;

use entrar_core::Client;
use entrar_state::Repository;

use crate::{
    challenge::ChallengeStore,
    flow::FlowPolicy,
    login::LoginClient,
    password_reset::PasswordResetClient,
    registration::RegistrationClient,
    session::{SessionClient, SessionCredential},
};

/// Subclient containing the authentication flows.
///
/// Flow state lives in this client: the accessors return handles onto the
/// same flow instances, so a presentation layer can re-read state after each
/// action without holding on to anything else.
#[derive(Clone)]
pub struct AuthClient {
    login: LoginClient,
    registration: RegistrationClient,
    password_reset: PasswordResetClient,
    session: SessionClient,
}

impl AuthClient {
    /// Constructs a new `AuthClient` over the given core client.
    ///
    /// `credentials` is the repository the session credential is persisted
    /// in; supply a durable backend so the session survives restarts. The
    /// challenge store is session-scoped and created here on purpose.
    pub fn new(
        client: Client,
        credentials: Arc<dyn Repository<SessionCredential>>,
        policy: FlowPolicy,
    ) -> Self {
        let challenges = ChallengeStore::new();
        let session = SessionClient::new(credentials);
        Self {
            login: LoginClient::new(
                client.clone(),
                challenges.clone(),
                session.clone(),
                policy.clone(),
            ),
            registration: RegistrationClient::new(client.clone(), challenges.clone(), policy.clone()),
            password_reset: PasswordResetClient::new(client, challenges, policy),
            session,
        }
    }

    /// Client for the password login flow.
    pub fn login(&self) -> LoginClient {
        self.login.clone()
    }

    /// Client for the registration flow.
    pub fn registration(&self) -> RegistrationClient {
        self.registration.clone()
    }

    /// Client for the password recovery flow.
    pub fn password_reset(&self) -> PasswordResetClient {
        self.password_reset.clone()
    }

    /// Access to the stored session credential.
    pub fn session(&self) -> SessionClient {
        self.session.clone()
    }
}

/// Extension trait for `Client` to provide access to the `AuthClient`.
pub trait AuthClientExt {
    /// Creates a new `AuthClient` persisting session credentials in
    /// `credentials`.
    fn auth(
        &self,
        credentials: Arc<dyn Repository<SessionCredential>>,
        policy: FlowPolicy,
    ) -> AuthClient;
}

impl AuthClientExt for Client {
    fn auth(
        &self,
        credentials: Arc<dyn Repository<SessionCredential>>,
        policy: FlowPolicy,
    ) -> AuthClient {
        AuthClient::new(self.clone(), credentials, policy)
    }
}
