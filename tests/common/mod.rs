#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use tabular_chat::agents::{AgentFactory, AgentSettings};
use tabular_chat::config::{IngestConfig, SandboxConfig};
use tabular_chat::llm::LLMAdapter;
use tabular_chat::session::Session;
use tabular_chat::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};

pub enum Step {
    Reply(String),
    Unavailable(String),
}

/// Deterministic backend: plays back scripted steps, then echoes the last
/// user message. Every request is recorded.
#[derive(Default)]
pub struct StubBackend {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<LLMRequest>>,
}

impl StubBackend {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMAdapter for StubBackend {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self.script.lock().unwrap().pop_front();
        let content = match step {
            Some(Step::Reply(text)) => text,
            Some(Step::Unavailable(reason)) => return Err(AppError::LLMBackendUnavailable(reason)),
            None => format!(
                "echo: {}",
                request.messages.last().map(|m| m.content.as_str()).unwrap_or_default()
            ),
        };
        Ok(LLMResponse {
            content,
            finish_reason: "stop".to_string(),
            usage: TokenUsage::default(),
        })
    }
}

pub fn settings(max_attempts: u32) -> AgentSettings {
    AgentSettings {
        model: "stub-model".to_string(),
        temperature: 0.0,
        max_tokens: 256,
        max_attempts,
        retry_delay: Duration::from_millis(1),
    }
}

pub fn factory(backend: Arc<StubBackend>, sandbox: SandboxConfig) -> AgentFactory {
    AgentFactory::with_backend(backend, settings(1), sandbox)
}

pub fn ingest(root: &TempDir) -> IngestConfig {
    IngestConfig {
        workspace_root: Some(root.path().to_path_buf()),
        ..IngestConfig::default()
    }
}

pub fn session(root: &TempDir) -> Session {
    Session::new(ingest(root)).unwrap()
}

pub const SALES_CSV: &str = "id,amount\n1,10.5\n2,20.0\n";
pub const REGIONS_CSV: &str = "region,population\nnorth,1200\nsouth,800\neast,950\n";
