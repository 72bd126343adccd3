use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::types::LLMProvider;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub ingest: IngestConfig,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub model: String,
    pub google_api_key: String,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl LLMConfig {
    /// API key for the configured provider, if one is set
    pub fn active_api_key(&self) -> Option<String> {
        let key = match self.provider {
            LLMProvider::Google => &self.google_api_key,
            LLMProvider::OpenAI => &self.openai_api_key,
        };
        let key = key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// What happens when an upload reuses a display name already in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Last upload wins.
    #[default]
    Overwrite,
    Reject,
    /// Register under "name (2)", "name (3)", ...
    Rename,
}

impl FromStr for CollisionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(CollisionPolicy::Overwrite),
            "reject" => Ok(CollisionPolicy::Reject),
            "rename" => Ok(CollisionPolicy::Rename),
            other => bail!("Unknown dataset name collision policy: {}", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    pub max_upload_bytes: usize,
    pub collision_policy: CollisionPolicy,
    /// Parent directory for per-session workspaces (system temp dir if unset)
    pub workspace_root: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
            collision_policy: CollisionPolicy::Overwrite,
            workspace_root: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
    /// Operator acknowledgement that the agent may run generated code
    pub allow_code_execution: bool,
    pub interpreter: String,
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
    pub max_steps: usize,
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            allow_code_execution: false,
            interpreter: "python3".to_string(),
            timeout_secs: 30,
            max_output_bytes: 16 * 1024,
            max_steps: 3,
        }
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{} has invalid value {:?}: {}", name, raw, e))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let provider_id = env::var("LLM_PROVIDER").unwrap_or_else(|_| "google".to_string());
        let provider = LLMProvider::from_id(&provider_id)
            .with_context(|| format!("Unsupported LLM_PROVIDER: {}", provider_id))?;
        let default_model = match provider {
            LLMProvider::Google => "gemini-1.5-pro-001",
            LLMProvider::OpenAI => "gpt-4o-mini",
        };

        Ok(Self {
            server: ServerConfig {
                port: parse_var("PORT", "3000")?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            llm: LLMConfig {
                provider,
                model: env::var("LLM_MODEL").unwrap_or_else(|_| default_model.to_string()),
                google_api_key: env::var("GEMINI_API_KEY")
                    .or_else(|_| env::var("GOOGLE_API_KEY"))
                    .unwrap_or_default(),
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                openai_base_url: env::var("OPENAI_BASE_URL").ok(),
                temperature: parse_var("LLM_TEMPERATURE", "0.0")?,
                max_tokens: parse_var("LLM_MAX_TOKENS", "2048")?,
                timeout_secs: parse_var("LLM_TIMEOUT_SECS", "60")?,
                max_retries: parse_var("LLM_MAX_RETRIES", "2")?,
            },
            ingest: IngestConfig {
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", "52428800")?,
                collision_policy: parse_var("DATASET_NAME_COLLISION", "overwrite")?,
                workspace_root: env::var("WORKSPACE_ROOT").ok().map(PathBuf::from),
            },
            sandbox: SandboxConfig {
                allow_code_execution: parse_var("ALLOW_CODE_EXECUTION", "false")?,
                interpreter: env::var("ANALYSIS_INTERPRETER")
                    .unwrap_or_else(|_| "python3".to_string()),
                timeout_secs: parse_var("ANALYSIS_TIMEOUT_SECS", "30")?,
                max_output_bytes: parse_var("ANALYSIS_MAX_OUTPUT_BYTES", "16384")?,
                max_steps: parse_var("MAX_ANALYSIS_STEPS", "3")?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm_config(provider: LLMProvider) -> LLMConfig {
        LLMConfig {
            provider,
            model: "m".to_string(),
            google_api_key: "g-key".to_string(),
            openai_api_key: "  ".to_string(),
            openai_base_url: None,
            temperature: 0.0,
            max_tokens: 256,
            timeout_secs: 5,
            max_retries: 1,
        }
    }

    #[test]
    fn test_active_api_key_follows_provider() {
        assert_eq!(
            llm_config(LLMProvider::Google).active_api_key(),
            Some("g-key".to_string())
        );
        assert_eq!(llm_config(LLMProvider::OpenAI).active_api_key(), None);
    }

    #[test]
    fn test_collision_policy_parse() {
        assert_eq!("Rename".parse::<CollisionPolicy>().unwrap(), CollisionPolicy::Rename);
        assert_eq!(" reject ".parse::<CollisionPolicy>().unwrap(), CollisionPolicy::Reject);
        assert!("merge".parse::<CollisionPolicy>().is_err());
    }
}
