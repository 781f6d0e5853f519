use crate::api::ApiConfiguration;

/// Internal state of a [`crate::Client`], shared between all of its clones.
#[derive(Debug)]
pub struct InternalClient {
    pub(crate) api_configuration: ApiConfiguration,
}

impl InternalClient {
    /// Returns the API configuration used to reach the identity service.
    pub fn get_api_configuration(&self) -> &ApiConfiguration {
        &self.api_configuration
    }
}
