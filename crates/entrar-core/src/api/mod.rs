//! Transport adapter for the identity service API.
//!
//! All requests in the SDK go through [`ApiConfiguration`], which performs the
//! network call and normalizes the response: bodies are decoded as JSON even
//! on error statuses, since the server embeds human-readable error detail in
//! them.

use reqwest::{header, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// Connection parameters and the HTTP client shared by all API calls.
#[derive(Debug, Clone)]
pub struct ApiConfiguration {
    /// Base URL of the identity service, without a trailing slash.
    pub base_path: String,
    /// The user agent sent with every request.
    pub user_agent: String,
    /// The underlying HTTP client.
    pub client: reqwest::Client,
}

impl ApiConfiguration {
    /// Sends a POST request with a JSON body to `path` (relative to the base URL).
    pub async fn post<B>(&self, path: &str, payload: &B) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_path, path))
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, &self.user_agent)
            .json(payload)
            .send()
            .await?;

        read_body(response).await
    }

    /// Sends a GET request with `query` serialized into the query string.
    pub async fn get<Q>(&self, path: &str, query: &Q) -> Result<Value, ApiError>
    where
        Q: Serialize + ?Sized,
    {
        let response = self
            .client
            .get(format!("{}{}", self.base_path, path))
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, &self.user_agent)
            .query(query)
            .send()
            .await?;

        read_body(response).await
    }
}

/// Decodes a response body, regardless of status code.
///
/// A successful status with an undecodable body yields an empty object, so
/// callers validating the presence of required fields fail with a useful
/// error instead of a decoding one.
async fn read_body(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    let text = response.text().await?;
    let body = serde_json::from_str::<Value>(&text).ok();

    if status.is_success() {
        return Ok(body.unwrap_or_else(|| Value::Object(serde_json::Map::new())));
    }

    Err(ApiError::ResponseContent {
        status,
        message: error_message(body.as_ref(), &text, status),
    })
}

/// Picks the best available error detail: a structured `message` field,
/// then the raw body text, then a generic `Error <status>` string.
fn error_message(body: Option<&Value>, text: &str, status: StatusCode) -> String {
    let detail = body
        .and_then(|body| body.get("message"))
        .and_then(|message| match message {
            Value::Null => None,
            Value::String(detail) if detail.is_empty() => None,
            Value::String(detail) => Some(detail.clone()),
            other => Some(other.to_string()),
        });

    detail
        .or_else(|| (!text.is_empty()).then(|| text.to_owned()))
        .unwrap_or_else(|| format!("Error {}", status.as_u16()))
}
