use entrar_core::{Client, ClientSettings};

/// Helper for testing the entrar SDK against a wiremock server.
///
/// Warning: when using `Mock::expect` ensure the returned server is not
/// dropped before the test completes.
pub async fn start_api_mock(mocks: Vec<wiremock::Mock>) -> (wiremock::MockServer, Client) {
    let server = wiremock::MockServer::start().await;

    for mock in mocks {
        server.register(mock).await;
    }

    let client = Client::new(Some(ClientSettings {
        api_url: server.uri(),
        user_agent: "Entrar Rust-SDK [TEST]".into(),
    }));

    (server, client)
}
