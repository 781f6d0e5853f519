use std::sync::Arc;

use super::internal::InternalClient;
use crate::{api::ApiConfiguration, client::client_settings::ClientSettings};

/// The main struct to interact with the entrar SDK.
#[derive(Debug, Clone)]
pub struct Client {
    // The [`Client`] struct requires its `Clone` implementation to return an owned reference to
    // the same instance, so any mutable state must live behind an Arc as part of the
    // [`InternalClient`] struct.
    #[doc(hidden)]
    pub internal: Arc<InternalClient>,
}

impl Client {
    /// Create a new entrar client, falling back to default settings when none are given.
    pub fn new(settings: Option<ClientSettings>) -> Self {
        let settings = settings.unwrap_or_default();

        let http_client = reqwest::Client::builder()
            .build()
            .expect("HTTP Client build should not fail");

        Self {
            internal: Arc::new(InternalClient {
                api_configuration: ApiConfiguration {
                    base_path: settings.api_url,
                    user_agent: settings.user_agent,
                    client: http_client,
                },
            }),
        }
    }
}
