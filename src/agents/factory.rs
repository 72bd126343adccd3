use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::agents::query::QueryAgent;
use crate::agents::sandbox::AnalysisSandbox;
use crate::config::{Config, SandboxConfig};
use crate::llm::{create_adapter, LLMAdapter};
use crate::models::CanonicalDataset;
use crate::profile::DatasetProfile;
use crate::table::Table;
use crate::types::{AppError, AppResult};

/// Per-agent LLM call settings
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            max_attempts: config.llm.max_retries + 1,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Builds one `QueryAgent` per dataset selection.
///
/// Agents are never cached or shared: every call returns an agent with empty
/// memory, so history from one dataset cannot leak into another.
pub struct AgentFactory {
    backend: Arc<dyn LLMAdapter>,
    settings: AgentSettings,
    sandbox: SandboxConfig,
}

impl AgentFactory {
    /// Fails with `MissingCredential` when no API key is configured.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let backend = create_adapter(&config.llm)?;
        info!(
            provider = %config.llm.provider,
            model = %config.llm.model,
            "LLM backend configured"
        );
        Ok(Self::with_backend(
            backend,
            AgentSettings::from_config(config),
            config.sandbox.clone(),
        ))
    }

    pub fn with_backend(
        backend: Arc<dyn LLMAdapter>,
        settings: AgentSettings,
        sandbox: SandboxConfig,
    ) -> Self {
        if sandbox.allow_code_execution {
            warn!(
                interpreter = %sandbox.interpreter,
                timeout_secs = sandbox.timeout_secs,
                "Code execution is ENABLED: the query agent will run LLM-generated code \
                 against uploaded datasets with the privileges of this process"
            );
        }
        Self {
            backend,
            settings,
            sandbox,
        }
    }

    pub fn code_execution_enabled(&self) -> bool {
        self.sandbox.allow_code_execution
    }

    /// Bind a fresh agent to the dataset's canonical CSV. Sandbox runs are
    /// placed under `work_dir`.
    pub fn create_agent(&self, dataset: &CanonicalDataset, work_dir: &Path) -> AppResult<QueryAgent> {
        let table = Table::load(&dataset.source_path)
            .map_err(|e| AppError::Internal(format!("{:#}", e)))?;
        let profile = DatasetProfile::build(&dataset.display_name, &table);

        let sandbox = self
            .sandbox
            .allow_code_execution
            .then(|| AnalysisSandbox::new(self.sandbox.clone()));

        info!(
            dataset = %dataset.display_name,
            code_execution = sandbox.is_some(),
            "Query agent created"
        );

        Ok(QueryAgent::new(
            dataset.clone(),
            profile,
            self.backend.clone(),
            self.settings.clone(),
            sandbox,
            work_dir.to_path_buf(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IngestConfig, LLMConfig, ServerConfig};
    use crate::types::LLMProvider;

    fn config(google_key: &str) -> Config {
        Config {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                cors_allowed_origins: vec![],
            },
            llm: LLMConfig {
                provider: LLMProvider::Google,
                model: "gemini-1.5-pro-001".to_string(),
                google_api_key: google_key.to_string(),
                openai_api_key: String::new(),
                openai_base_url: None,
                temperature: 0.0,
                max_tokens: 256,
                timeout_secs: 5,
                max_retries: 0,
            },
            ingest: IngestConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }

    #[test]
    fn test_missing_credential_fails_construction() {
        let err = AgentFactory::from_config(&config("")).err().unwrap();
        assert!(matches!(err, AppError::MissingCredential(p) if p == "google"));
    }

    #[test]
    fn test_factory_builds_with_key() {
        let factory = AgentFactory::from_config(&config("g-key")).unwrap();
        assert!(!factory.code_execution_enabled());
        assert_eq!(factory.settings.max_attempts, 1);
    }
}
