//! Databricks model serving endpoint client.
//!
//! The only network-calling component. One logical operation: send a prompt,
//! get the model's raw text back. The response is opaque to the rest of the
//! pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EndpointConfig;
use crate::error::AppError;

/// Convert any displayable error into `AppError::Endpoint`.
fn endpoint_err(e: impl std::fmt::Display) -> AppError {
    AppError::Endpoint(e.to_string())
}

/// Seam between the scheduler and the model backend. Tests substitute a
/// scripted implementation here.
#[async_trait]
pub trait Convert: Send + Sync {
    /// Send one assembled prompt and return the model's raw text response.
    async fn convert(&self, prompt: &str) -> Result<String, AppError>;
}

// ============================================================================
// Request / response bodies (serving-endpoint chat invocation)
// ============================================================================

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct InvocationBody<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct InvocationResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

// ============================================================================
// ServingEndpointClient
// ============================================================================

/// HTTP client for `POST /serving-endpoints/{name}/invocations`.
pub struct ServingEndpointClient {
    http: reqwest::Client,
    config: EndpointConfig,
}

impl ServingEndpointClient {
    /// Create a client for the configured endpoint.
    ///
    /// The underlying `reqwest::Client` carries a 10-minute timeout; a large
    /// batch of DAX measures can keep the model busy for several minutes.
    pub fn new(config: EndpointConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(600))
            .build()
            .map_err(endpoint_err)?;

        Ok(Self { http, config })
    }

    fn invocations_url(&self) -> String {
        format!(
            "{}/serving-endpoints/{}/invocations",
            self.config.host, self.config.endpoint
        )
    }
}

#[async_trait]
impl Convert for ServingEndpointClient {
    async fn convert(&self, prompt: &str) -> Result<String, AppError> {
        let body = InvocationBody {
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            // Deterministic-as-possible output for a conversion task.
            temperature: 0.0,
        };

        let response: InvocationResponse = self
            .http
            .post(self.invocations_url())
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await
            .map_err(endpoint_err)?
            .error_for_status()
            .map_err(endpoint_err)?
            .json()
            .await
            .map_err(endpoint_err)?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Endpoint("endpoint returned no choices".into()))?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocations_url_shape() {
        let client = ServingEndpointClient::new(EndpointConfig {
            host: "https://adb-1.azuredatabricks.net".into(),
            token: "dapi-test".into(),
            endpoint: "databricks-claude-sonnet-4".into(),
        })
        .unwrap();
        assert_eq!(
            client.invocations_url(),
            "https://adb-1.azuredatabricks.net/serving-endpoints/databricks-claude-sonnet-4/invocations"
        );
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"- name: X\n  expr: SUM(x)"}}]}"#;
        let parsed: InvocationResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content,
            "- name: X\n  expr: SUM(x)"
        );
    }
}
