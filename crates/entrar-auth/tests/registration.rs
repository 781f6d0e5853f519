//! Integration tests for the registration flow

use std::sync::Arc;

use entrar_auth::{
    api::request::RegisterRequest,
    flow::{FlowError, FlowPolicy, FlowState, TerminalArtifact},
    AuthClient, AuthClientExt,
};
use entrar_state::MemoryRepository;
use entrar_test::start_api_mock;
use wiremock::{
    matchers::{body_string_contains, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

async fn make_auth(mocks: Vec<Mock>) -> (MockServer, AuthClient) {
    let (server, client) = start_api_mock(mocks).await;
    let auth = client.auth(Arc::new(MemoryRepository::new()), FlowPolicy::default());
    (server, auth)
}

fn details(phone: Option<&str>) -> RegisterRequest {
    RegisterRequest {
        name: "Ana".into(),
        email: "ana@example.com".into(),
        password: "hunter2".into(),
        phone: phone.map(Into::into),
    }
}

fn register_responding(body: serde_json::Value) -> Mock {
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
}

mod sms_path_tests {
    use super::*;

    #[tokio::test]
    async fn registration_with_phone_verifies_by_code() {
        let verify = Mock::given(method("POST"))
            .and(path("/auth/verify-sms"))
            .and(body_string_contains("ana@example.com"))
            .and(body_string_contains("123456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})));
        let (_server, auth) = make_auth(vec![
            register_responding(serde_json::json!({"challengeId": "r1"})),
            verify,
        ])
        .await;
        let registration = auth.registration();

        let state = registration.submit_details(details(Some("+34600000000"))).await;
        assert_eq!(state, FlowState::AwaitingChallengeCode);

        let state = registration.submit_code("123456").await;
        assert_eq!(state, FlowState::Success(TerminalArtifact::Verified));
    }

    #[tokio::test]
    async fn rejected_code_keeps_the_flow_retryable() {
        let verify = Mock::given(method("POST"))
            .and(path("/auth/verify-sms"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"message": "código inválido"})),
            );
        let (_server, auth) = make_auth(vec![
            register_responding(serde_json::json!({"challengeId": "r1"})),
            verify,
        ])
        .await;
        let registration = auth.registration();

        registration.submit_details(details(Some("+34600000000"))).await;
        let state = registration.submit_code("000000").await;

        assert_eq!(state, FlowState::AwaitingChallengeCode);
        assert_eq!(
            registration.last_error(),
            Some(FlowError::InvalidChallenge("código inválido".into()))
        );
    }

    #[tokio::test]
    async fn ok_false_counts_as_a_rejected_code() {
        let verify = Mock::given(method("POST"))
            .and(path("/auth/verify-sms"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": false})),
            );
        let (_server, auth) = make_auth(vec![
            register_responding(serde_json::json!({"challengeId": "r1"})),
            verify,
        ])
        .await;
        let registration = auth.registration();

        registration.submit_details(details(Some("+34600000000"))).await;
        let state = registration.submit_code("000000").await;

        assert_eq!(state, FlowState::AwaitingChallengeCode);
        assert!(matches!(
            registration.last_error(),
            Some(FlowError::InvalidChallenge(_))
        ));
    }
}

mod email_path_tests {
    use super::*;

    #[tokio::test]
    async fn registration_waits_for_the_email_link() {
        let verify = Mock::given(method("GET"))
            .and(path("/auth/verify-email"))
            .and(query_param("token", "tkn-1"))
            .and(query_param("json", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})));
        let (_server, auth) = make_auth(vec![
            register_responding(serde_json::json!({"ok": true})),
            verify,
        ])
        .await;
        let registration = auth.registration();

        let state = registration.submit_details(details(None)).await;
        assert_eq!(state, FlowState::AwaitingEmailClick);

        let state = registration.verify_email_token("tkn-1").await;
        assert_eq!(state, FlowState::Success(TerminalArtifact::Verified));
    }

    #[tokio::test]
    async fn rejected_email_token_fails_instead_of_pending_forever() {
        let verify = Mock::given(method("GET"))
            .and(path("/auth/verify-email"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": false})),
            );
        let (_server, auth) = make_auth(vec![
            register_responding(serde_json::json!({"ok": true})),
            verify,
        ])
        .await;
        let registration = auth.registration();

        registration.submit_details(details(None)).await;
        let state = registration.verify_email_token("tkn-1").await;

        assert!(matches!(
            state,
            FlowState::Failed(FlowError::InvalidChallenge(_))
        ));
    }

    #[tokio::test]
    async fn email_link_can_be_resent() {
        let resend = Mock::given(method("POST"))
            .and(path("/auth/resend-email"))
            .and(body_string_contains("ana@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1);
        let (server, auth) = make_auth(vec![
            register_responding(serde_json::json!({"ok": true})),
            resend,
        ])
        .await;
        let registration = auth.registration();

        registration.submit_details(details(None)).await;
        let state = registration.resend().await;

        assert_eq!(state, FlowState::AwaitingEmailClick);
        assert_eq!(registration.last_error(), None);

        drop(server);
    }
}

mod response_shape_tests {
    use super::*;

    #[tokio::test]
    async fn empty_registration_response_never_succeeds() {
        let (_server, auth) =
            make_auth(vec![register_responding(serde_json::json!({}))]).await;
        let registration = auth.registration();

        let state = registration.submit_details(details(None)).await;

        assert!(matches!(
            state,
            FlowState::Failed(FlowError::InvalidResponse(_))
        ));
        assert!(!matches!(registration.state(), FlowState::Success(_)));
    }

    #[tokio::test]
    async fn verification_without_an_outcome_fails() {
        let verify = Mock::given(method("POST"))
            .and(path("/auth/verify-sms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})));
        let (_server, auth) = make_auth(vec![
            register_responding(serde_json::json!({"challengeId": "r1"})),
            verify,
        ])
        .await;
        let registration = auth.registration();

        registration.submit_details(details(Some("+34600000000"))).await;
        let state = registration.submit_code("123456").await;

        assert!(matches!(
            state,
            FlowState::Failed(FlowError::InvalidResponse(_))
        ));
    }
}
