//! Integration tests for the login flow

use std::{sync::Arc, time::Duration};

use entrar_auth::{
    api::request::LoginRequest,
    flow::{FlowError, FlowPolicy, FlowState, TerminalArtifact},
    session::SessionCredential,
    AuthClient, AuthClientExt,
};
use entrar_state::MemoryRepository;
use entrar_test::start_api_mock;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn make_auth(mocks: Vec<Mock>) -> (MockServer, AuthClient) {
    make_auth_with_policy(mocks, FlowPolicy::default()).await
}

async fn make_auth_with_policy(mocks: Vec<Mock>, policy: FlowPolicy) -> (MockServer, AuthClient) {
    let (server, client) = start_api_mock(mocks).await;
    let auth = client.auth(Arc::new(MemoryRepository::new()), policy);
    (server, auth)
}

fn credentials() -> LoginRequest {
    LoginRequest {
        email: "a@b.com".into(),
        password: "x".into(),
        method: None,
    }
}

mod submit_credentials_tests {
    use super::*;

    #[tokio::test]
    async fn login_without_second_factor_round_trips() {
        let mock = Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_string_contains("a@b.com"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "tok"})),
            );
        let (_server, auth) = make_auth(vec![mock]).await;
        let login = auth.login();

        let state = login.submit_credentials(credentials()).await;

        assert_eq!(
            state,
            FlowState::Success(TerminalArtifact::Session(SessionCredential {
                token: "tok".into()
            }))
        );
        assert_eq!(
            auth.session().current().await.unwrap(),
            Some(SessionCredential {
                token: "tok".into()
            })
        );
    }

    #[tokio::test]
    async fn rejected_credentials_fail_and_allow_resubmission() {
        let bad = Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_string_contains("wrong"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"message": "invalid credentials"})),
            );
        let good = Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_string_contains("right"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "tok"})),
            );
        let (_server, auth) = make_auth(vec![bad, good]).await;
        let login = auth.login();

        let state = login
            .submit_credentials(LoginRequest {
                email: "a@b.com".into(),
                password: "wrong".into(),
                method: None,
            })
            .await;
        assert_eq!(
            state,
            FlowState::Failed(FlowError::Transport("invalid credentials".into()))
        );

        // Submission is legal again from Failed.
        let state = login
            .submit_credentials(LoginRequest {
                email: "a@b.com".into(),
                password: "right".into(),
                method: None,
            })
            .await;
        assert!(matches!(state, FlowState::Success(_)));
    }

    #[tokio::test]
    async fn empty_login_response_fails_with_missing_credential() {
        let mock = Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})));
        let (_server, auth) = make_auth(vec![mock]).await;
        let login = auth.login();

        let state = login.submit_credentials(credentials()).await;

        assert_eq!(state, FlowState::Failed(FlowError::MissingCredential));
        assert_eq!(auth.session().current().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_fields_are_rejected_before_any_request() {
        // No mocks: a request would fail the test with an unexpected call.
        let (_server, auth) = make_auth(vec![]).await;
        let login = auth.login();

        let state = login
            .submit_credentials(LoginRequest {
                email: "".into(),
                password: "x".into(),
                method: None,
            })
            .await;

        assert_eq!(state, FlowState::Idle);
        assert!(matches!(
            login.last_error(),
            Some(FlowError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_submission_while_in_flight_is_ignored() {
        let mock = Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(100))
                    .set_body_json(serde_json::json!({"access_token": "tok"})),
            )
            .expect(1);
        let (server, auth) = make_auth(vec![mock]).await;
        let login = auth.login();

        let (first, second) = tokio::join!(
            login.submit_credentials(credentials()),
            login.submit_credentials(credentials()),
        );

        // One of the two submissions resolved the flow, the other was a no-op
        // snapshot of the in-flight state.
        let mut outcomes = [first, second];
        outcomes.sort_by_key(|state| matches!(state, FlowState::Success(_)));
        assert_eq!(outcomes[0], FlowState::AwaitingCredentials);
        assert!(matches!(outcomes[1], FlowState::Success(_)));

        // Mock::expect(1) verifies exactly one network call on drop.
        drop(server);
    }

    #[tokio::test]
    async fn cancelled_submission_discards_the_late_response() {
        let mock = Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(150))
                    .set_body_json(serde_json::json!({"access_token": "tok"})),
            );
        let (_server, auth) = make_auth(vec![mock]).await;
        let login = auth.login();

        let (state, _) = tokio::join!(login.submit_credentials(credentials()), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            login.cancel();
        });

        // The response arrived after cancellation and was not applied.
        assert_eq!(state, FlowState::AwaitingCredentials);
        assert_eq!(login.state(), FlowState::AwaitingCredentials);
        assert_eq!(auth.session().current().await.unwrap(), None);
    }
}

mod second_factor_tests {
    use super::*;

    fn login_issuing_challenge(id: &str) -> Mock {
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"challengeId": id})),
            )
    }

    #[tokio::test]
    async fn wrong_code_retries_then_succeeds() {
        let wrong_code = Mock::given(method("POST"))
            .and(path("/auth/2fa/verify"))
            .and(body_string_contains("000000"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"message": "invalid code"})),
            );
        let right_code = Mock::given(method("POST"))
            .and(path("/auth/2fa/verify"))
            .and(body_string_contains("123456"))
            .and(body_string_contains("c1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "tok"})),
            );
        let (_server, auth) =
            make_auth(vec![login_issuing_challenge("c1"), wrong_code, right_code]).await;
        let login = auth.login();

        let state = login.submit_credentials(credentials()).await;
        assert_eq!(state, FlowState::AwaitingChallengeCode);

        let state = login.submit_code("000000").await;
        assert_eq!(state, FlowState::AwaitingChallengeCode);
        assert_eq!(
            login.last_error(),
            Some(FlowError::InvalidChallenge("invalid code".into()))
        );

        let state = login.submit_code("123456").await;
        assert_eq!(
            state,
            FlowState::Success(TerminalArtifact::Session(SessionCredential {
                token: "tok".into()
            }))
        );
        assert_eq!(
            auth.session().current().await.unwrap(),
            Some(SessionCredential {
                token: "tok".into()
            })
        );
    }

    #[tokio::test]
    async fn resend_supersedes_the_previous_challenge() {
        let resend = Mock::given(method("POST"))
            .and(path("/auth/resend-email"))
            .and(body_string_contains("a@b.com"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"challengeId": "c2"})),
            );
        // A submission carrying the superseded id would be rejected.
        let superseded = Mock::given(method("POST"))
            .and(path("/auth/2fa/verify"))
            .and(body_string_contains("c1"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"message": "challenge superseded"})),
            )
            .expect(0);
        let current = Mock::given(method("POST"))
            .and(path("/auth/2fa/verify"))
            .and(body_string_contains("c2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "tok"})),
            )
            .expect(1);
        let (server, auth) = make_auth(vec![
            login_issuing_challenge("c1"),
            resend,
            superseded,
            current,
        ])
        .await;
        let login = auth.login();

        login.submit_credentials(credentials()).await;
        let state = login.resend().await;
        assert_eq!(state, FlowState::AwaitingChallengeCode);

        let state = login.submit_code("123456").await;
        assert!(matches!(state, FlowState::Success(_)));

        drop(server);
    }

    #[tokio::test]
    async fn resend_budget_is_enforced() {
        let policy = FlowPolicy {
            max_resends: Some(0),
            ..FlowPolicy::default()
        };
        let (_server, auth) =
            make_auth_with_policy(vec![login_issuing_challenge("c1")], policy).await;
        let login = auth.login();

        login.submit_credentials(credentials()).await;
        let state = login.resend().await;

        // The flow stays usable; only the resend was rejected.
        assert_eq!(state, FlowState::AwaitingChallengeCode);
        assert!(matches!(
            login.last_error(),
            Some(FlowError::StateViolation { action: "resend", .. })
        ));
    }
}

mod state_guard_tests {
    use super::*;

    #[tokio::test]
    async fn code_submission_without_a_challenge_fails_loudly() {
        let (_server, auth) = make_auth(vec![]).await;
        let login = auth.login();

        let state = login.submit_code("123456").await;

        assert!(matches!(
            state,
            FlowState::Failed(FlowError::StateViolation {
                action: "submit_code",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn terminal_states_require_an_explicit_reset() {
        let mock = Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "tok"})),
            );
        let (_server, auth) = make_auth(vec![mock]).await;
        let login = auth.login();

        let state = login.submit_credentials(credentials()).await;
        assert!(matches!(state, FlowState::Success(_)));
        assert!(matches!(login.state(), FlowState::Success(_)));

        assert_eq!(login.reset().await, FlowState::Idle);
        assert_eq!(login.last_error(), None);
    }
}
