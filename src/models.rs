use std::path::PathBuf;
use std::sync::Arc;

use crate::agents::AgentFactory;
use crate::config::Config;
use crate::session::{SessionStore, View};
use crate::types::FileRejection;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    /// `None` when no LLM credential is configured; queries then fail with
    /// `MissingCredential` while ingestion and plotting keep working.
    pub agent_factory: Option<Arc<AgentFactory>>,
}

/// Raw upload handed over by the UI collaborator.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Normalized dataset: always backed by a CSV file on disk.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CanonicalDataset {
    pub display_name: String,
    pub source_path: PathBuf,
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UploadReport {
    pub accepted: Vec<CanonicalDataset>,
    pub rejected: Vec<FileRejection>,
    pub view: View,
    pub selected: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSnapshot {
    pub session_id: uuid::Uuid,
    pub view: View,
    pub datasets: Vec<CanonicalDataset>,
    pub selected: Option<String>,
    pub has_agent: bool,
    pub turns: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Context a sub-view receives on entry.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ViewContext {
    pub view: View,
    pub dataset_name: String,
    pub canonical_path: PathBuf,
}

// API Request/Response types

#[derive(Debug, serde::Deserialize)]
pub struct SelectRequest {
    pub name: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct NavigateRequest {
    pub view: View,
}

#[derive(Debug, serde::Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, serde::Serialize)]
pub struct QueryResponse {
    pub dataset: String,
    pub text: String,
    pub artifacts: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct AiVisualizationRequest {
    pub query: String,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub agent_available: bool,
    pub sessions: usize,
}
