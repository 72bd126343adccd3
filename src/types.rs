// Type definitions and error taxonomy

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    Google,
    OpenAI,
}

impl LLMProvider {
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_lowercase().as_str() {
            "google" | "gemini" => Some(LLMProvider::Google),
            "openai" => Some(LLMProvider::OpenAI),
            _ => None,
        }
    }
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::Google => write!(f, "google"),
            LLMProvider::OpenAI => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A file excluded from an upload batch, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FileRejection {
    pub file_name: String,
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} contains no data rows or no columns")]
    EmptyDataset(String),

    #[error("{file} could not be read: {reason}")]
    CorruptFile { file: String, reason: String },

    #[error("None of the {} uploaded file(s) could be loaded", .0.len())]
    NoValidFiles(Vec<FileRejection>),

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("A dataset named {0} is already registered")]
    DuplicateDataset(String),

    #[error("No LLM API key configured for provider {0}")]
    MissingCredential(String),

    #[error("LLM backend unavailable: {0}")]
    LLMBackendUnavailable(String),

    #[error("LLM backend rejected the request: {0}")]
    LLMRequestRejected(String),

    #[error("Analysis execution failed: {0}")]
    AnalysisExecution(String),

    #[error("Cannot go from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("No dataset selected")]
    NothingSelected,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::EmptyDataset(_) => "empty_dataset",
            AppError::CorruptFile { .. } => "corrupt_file",
            AppError::NoValidFiles(_) => "no_valid_files",
            AppError::UnknownDataset(_) => "unknown_dataset",
            AppError::DuplicateDataset(_) => "duplicate_dataset",
            AppError::MissingCredential(_) => "missing_credential",
            AppError::LLMBackendUnavailable(_) => "llm_backend_unavailable",
            AppError::LLMRequestRejected(_) => "llm_request_rejected",
            AppError::AnalysisExecution(_) => "analysis_execution_error",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::NothingSelected => "nothing_selected",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::LLMBackendUnavailable(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::EmptyDataset(_)
            | AppError::CorruptFile { .. }
            | AppError::NoValidFiles(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UnknownDataset(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateDataset(_)
            | AppError::InvalidTransition { .. }
            | AppError::NothingSelected => StatusCode::CONFLICT,
            AppError::MissingCredential(_) | AppError::LLMBackendUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::LLMRequestRejected(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AnalysisExecution(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn rejection(&self, file_name: &str) -> FileRejection {
        FileRejection {
            file_name: file_name.to_string(),
            kind: self.kind().to_string(),
            reason: self.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
            "retryable": self.is_retryable(),
        });
        if let AppError::NoValidFiles(rejected) = &self {
            body["rejected"] = serde_json::to_value(rejected).unwrap_or_default();
        }
        (self.status_code(), Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
