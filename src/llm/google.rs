// Google Gemini adapter (generateContent REST API)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::provider::{status_error, LLMAdapter};
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

pub struct GoogleAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl GoogleAdapter {
    pub fn new(api_key: &str, timeout: Duration) -> AppResult<Self> {
        Self::with_base_url(api_key, GEMINI_API_BASE, timeout)
    }

    pub fn with_base_url(api_key: &str, base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Gemini calls the assistant "model" and takes the system prompt separately.
    fn build_request(request: &LLMRequest) -> GenerateRequest {
        let mut system_parts: Vec<Part> = request
            .system_instruction
            .iter()
            .map(|s| Part { text: s.clone() })
            .collect();

        let mut contents = Vec::new();
        for msg in &request.messages {
            let role = match msg.role.as_str() {
                "assistant" => "model",
                "system" => {
                    system_parts.push(Part {
                        text: msg.content.clone(),
                    });
                    continue;
                }
                _ => "user",
            };
            contents.push(Content {
                role: Some(role.to_string()),
                parts: vec![Part {
                    text: msg.content.clone(),
                }],
            });
        }

        GenerateRequest {
            contents,
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(Content {
                    role: None,
                    parts: system_parts,
                })
            },
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        }
    }
}

#[async_trait]
impl LLMAdapter for GoogleAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| AppError::LLMBackendUnavailable(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error("Gemini", status, &error_text));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            AppError::LLMBackendUnavailable(format!("Failed to parse Gemini response: {}", e))
        })?;

        let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
            AppError::LLMBackendUnavailable("Gemini returned no candidates".to_string())
        })?;

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = parsed
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content,
            finish_reason: candidate.finish_reason.unwrap_or_else(|| "STOP".to_string()),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LLMMessage;

    fn request() -> LLMRequest {
        LLMRequest {
            model: "gemini-1.5-pro-001".to_string(),
            messages: vec![
                LLMMessage::user("What is the mean amount?"),
                LLMMessage::assistant("15.25"),
                LLMMessage::user("And the max?"),
            ],
            max_tokens: Some(128),
            temperature: Some(0.0),
            system_instruction: Some("You analyse CSV files.".to_string()),
        }
    }

    #[test]
    fn test_roles_are_mapped() {
        let body = serde_json::to_value(GoogleAdapter::build_request(&request())).unwrap();
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"].as_array().unwrap().len(), 3);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You analyse CSV files.");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 128);
    }

    #[tokio::test]
    async fn test_generate_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-pro-001:generateContent")
            .match_header("x-goog-api-key", "g-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"The max "},{"text":"is 20."}]},"finishReason":"STOP"}],
                    "usageMetadata":{"promptTokenCount":30,"candidatesTokenCount":4,"totalTokenCount":34}}"#,
            )
            .create_async()
            .await;

        let adapter =
            GoogleAdapter::with_base_url("g-test", &server.url(), Duration::from_secs(5)).unwrap();
        let response = adapter.create_chat_completion(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "The max is 20.");
        assert_eq!(response.usage.prompt_tokens, 30);
    }

    #[tokio::test]
    async fn test_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-pro-001:generateContent")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let adapter =
            GoogleAdapter::with_base_url("g-test", &server.url(), Duration::from_secs(5)).unwrap();
        let err = adapter.create_chat_completion(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::LLMBackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_invalid_key_is_not_retryable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-pro-001:generateContent")
            .with_status(401)
            .with_body(r#"{"error":{"code":401,"message":"API key not valid"}}"#)
            .create_async()
            .await;

        let adapter =
            GoogleAdapter::with_base_url("bad-key", &server.url(), Duration::from_secs(5)).unwrap();
        let err = adapter.create_chat_completion(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::LLMRequestRejected(ref m) if m.contains("API key not valid")));
        assert!(!err.is_retryable());
    }
}
