use std::sync::Arc;

use async_trait::async_trait;

use crate::config::LLMConfig;
use crate::types::{AppError, AppResult, LLMProvider, LLMRequest, LLMResponse};

/// Capability every LLM backend offers: one chat completion per call.
#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Error for a non-success HTTP status. Timeouts, rate limits and server
/// errors are transient; any other status means the request itself is wrong
/// (bad key, unknown model) and retrying cannot help.
pub fn status_error(provider: &str, status: reqwest::StatusCode, message: &str) -> AppError {
    let detail = format!("{} API error ({}): {}", provider, status, message);
    if status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        AppError::LLMBackendUnavailable(detail)
    } else {
        AppError::LLMRequestRejected(detail)
    }
}

/// Build the adapter for the configured provider.
///
/// Fails with `MissingCredential` when the provider has no API key, so a
/// misconfigured deployment is caught at start-up instead of mid-conversation.
pub fn create_adapter(config: &LLMConfig) -> AppResult<Arc<dyn LLMAdapter>> {
    let api_key = config
        .active_api_key()
        .ok_or_else(|| AppError::MissingCredential(config.provider.to_string()))?;

    let adapter: Arc<dyn LLMAdapter> = match config.provider {
        LLMProvider::Google => Arc::new(crate::llm::google::GoogleAdapter::new(
            &api_key,
            config.timeout(),
        )?),
        LLMProvider::OpenAI => match &config.openai_base_url {
            Some(base) => Arc::new(crate::llm::openai::OpenAIAdapter::with_base_url(
                &api_key,
                base,
                config.timeout(),
            )?),
            None => Arc::new(crate::llm::openai::OpenAIAdapter::new(
                &api_key,
                config.timeout(),
            )?),
        },
    };
    Ok(adapter)
}
