//! OpenAI client configuration with sensible defaults.

use crate::error::{KapittelError, Result};
use async_openai::{config::OpenAIConfig, error::OpenAIError, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client with the default timeout.
pub fn create_client() -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client whose HTTP layer gives up after `timeout`.
///
/// The retry loop applies its own per-attempt timeout on top of this one.
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| KapittelError::Config(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Client::with_config(OpenAIConfig::default()).with_http_client(http_client))
}

/// Check if the OpenAI API key is configured.
pub fn is_api_key_configured() -> bool {
    std::env::var("OPENAI_API_KEY").is_ok_and(|key| !key.is_empty())
}

/// Map a client error to a Kapittel error.
///
/// Request validation errors are not retryable; everything else is treated as
/// a transport failure.
pub fn map_openai_error(service: &str, error: OpenAIError) -> KapittelError {
    match error {
        OpenAIError::InvalidArgument(msg) => {
            KapittelError::InvalidInput(format!("{} request rejected: {}", service, msg))
        }
        other => KapittelError::OpenAI(format!("{} API error: {}", service, other)),
    }
}
