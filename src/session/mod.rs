//! Session Controller
//!
//! One `Session` holds everything a single user's interaction needs: the
//! current view, the dataset registry, the bound query agent and a scoped
//! workspace directory for canonical files. Dropping or resetting the session
//! deletes the workspace.
//!
//! ```text
//! Landing ──(≥1 file accepted)──▶ Dashboard ◀──▶ Visualization
//!                                     │  ▲   ◀──▶ GeospatialMap
//!                          select ────┘  │   ◀──▶ MultipleCsvs
//! ```

pub mod store;

pub use store::SessionStore;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tracing::{debug, info};
use uuid::Uuid;

use crate::agents::{AgentFactory, QueryAgent, QueryAnswer};
use crate::config::IngestConfig;
use crate::data_registry::DatasetRegistry;
use crate::models::{SessionSnapshot, UploadReport, UploadedFile, ViewContext};
use crate::normalizer::FileNormalizer;
use crate::table::Table;
use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Landing,
    Dashboard,
    Visualization,
    GeospatialMap,
    MultipleCsvs,
}

impl View {
    pub fn is_sub_view(&self) -> bool {
        matches!(
            self,
            View::Visualization | View::GeospatialMap | View::MultipleCsvs
        )
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            View::Landing => write!(f, "landing"),
            View::Dashboard => write!(f, "dashboard"),
            View::Visualization => write!(f, "visualization"),
            View::GeospatialMap => write!(f, "geospatial_map"),
            View::MultipleCsvs => write!(f, "multiple_csvs"),
        }
    }
}

pub struct Session {
    id: Uuid,
    view: View,
    registry: DatasetRegistry,
    agent: Option<QueryAgent>,
    workspace: TempDir,
    ingest: IngestConfig,
    table_cache: HashMap<PathBuf, Arc<Table>>,
    created_at: DateTime<Utc>,
}

fn create_workspace(ingest: &IngestConfig) -> AppResult<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("tabular-chat-");
    let dir = match &ingest.workspace_root {
        Some(root) => {
            std::fs::create_dir_all(root)?;
            builder.tempdir_in(root)?
        }
        None => builder.tempdir()?,
    };
    Ok(dir)
}

impl Session {
    pub fn new(ingest: IngestConfig) -> AppResult<Self> {
        let workspace = create_workspace(&ingest)?;
        let id = Uuid::new_v4();
        debug!(session = %id, workspace = %workspace.path().display(), "Session created");
        Ok(Self {
            id,
            view: View::Landing,
            registry: DatasetRegistry::new(ingest.collision_policy),
            agent: None,
            workspace,
            ingest,
            table_cache: HashMap::new(),
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    pub fn agent(&self) -> Option<&QueryAgent> {
        self.agent.as_ref()
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    /// Normalize and register an upload batch.
    ///
    /// The first accepted dataset is selected when nothing is selected yet, and
    /// Landing moves to Dashboard. With no accepted file the view is unchanged.
    pub fn upload(&mut self, files: &[UploadedFile]) -> AppResult<UploadReport> {
        let normalizer = FileNormalizer::new(
            self.workspace.path().join("datasets"),
            self.ingest.max_upload_bytes,
        );
        let outcome = normalizer.ingest_batch(files, &mut self.registry)?;
        for path in &outcome.replaced {
            self.table_cache.remove(path);
        }

        if self.registry.get_selected().is_none() {
            if let Some(first) = outcome.accepted.first() {
                self.registry.select(&first.display_name)?;
            }
        }
        if self.view == View::Landing {
            self.view = View::Dashboard;
        }

        info!(
            session = %self.id,
            accepted = outcome.accepted.len(),
            rejected = outcome.rejected.len(),
            "Upload processed"
        );

        Ok(UploadReport {
            accepted: outcome.accepted,
            rejected: outcome.rejected,
            view: self.view,
            selected: self.registry.selected_name().map(str::to_string),
        })
    }

    /// Pick the dataset to analyse. Switching to a different dataset drops the
    /// bound agent, and with it the conversation memory.
    pub fn select(&mut self, name: &str) -> AppResult<()> {
        if self.view != View::Dashboard {
            return Err(AppError::InvalidTransition {
                from: self.view.to_string(),
                to: format!("selection of {}", name),
            });
        }
        let previous = self.registry.selected_name().map(str::to_string);
        self.registry.select(name)?;
        if previous.as_deref() != Some(name) {
            info!(session = %self.id, dataset = %name, "Selected dataset changed");
            self.agent = None;
        }
        Ok(())
    }

    pub fn navigate(&mut self, target: View) -> AppResult<ViewContext> {
        let allowed = match target {
            View::Landing => false,
            View::Dashboard => self.view != View::Landing,
            _ => self.view == View::Dashboard || self.view == target,
        };
        if !allowed {
            return Err(AppError::InvalidTransition {
                from: self.view.to_string(),
                to: target.to_string(),
            });
        }

        let mut context = self.selected_context()?;
        self.view = target;
        context.view = target;
        debug!(session = %self.id, view = %target, "Navigated");
        Ok(context)
    }

    /// The one piece of context a sub-view receives.
    pub fn selected_context(&self) -> AppResult<ViewContext> {
        let dataset = self
            .registry
            .get_selected()
            .ok_or(AppError::NothingSelected)?;
        Ok(ViewContext {
            view: self.view,
            dataset_name: dataset.display_name.clone(),
            canonical_path: dataset.source_path.clone(),
        })
    }

    /// Load (once) the canonical file of the selected dataset.
    pub fn selected_table(&mut self) -> AppResult<(ViewContext, Arc<Table>)> {
        let context = self.selected_context()?;
        let table = self.load_table(&context.canonical_path)?;
        Ok((context, table))
    }

    pub fn load_table(&mut self, path: &Path) -> AppResult<Arc<Table>> {
        if let Some(table) = self.table_cache.get(path) {
            return Ok(table.clone());
        }
        let table = Arc::new(Table::load(path).map_err(|e| AppError::Internal(format!("{:#}", e)))?);
        self.table_cache.insert(path.to_path_buf(), table.clone());
        Ok(table)
    }

    /// Ask the agent bound to the selected dataset, building it on first use.
    pub async fn query(&mut self, factory: &AgentFactory, question: &str) -> AppResult<QueryAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidRequest("question must not be empty".to_string()));
        }
        if self.view == View::Landing {
            return Err(AppError::InvalidTransition {
                from: self.view.to_string(),
                to: "query".to_string(),
            });
        }

        let dataset = self
            .registry
            .get_selected()
            .ok_or(AppError::NothingSelected)?
            .clone();

        let stale = self
            .agent
            .as_ref()
            .map_or(true, |agent| agent.dataset_path() != dataset.source_path);
        if stale {
            self.agent = Some(factory.create_agent(&dataset, self.workspace.path())?);
        }

        match self.agent.as_mut() {
            Some(agent) => agent.answer(question).await,
            None => Err(AppError::Internal("agent missing after creation".to_string())),
        }
    }

    /// Back to Landing with an empty registry; canonical files are deleted.
    pub fn reset(&mut self) -> AppResult<()> {
        let workspace = create_workspace(&self.ingest)?;
        self.workspace = workspace;
        self.registry.clear();
        self.agent = None;
        self.table_cache.clear();
        self.view = View::Landing;
        info!(session = %self.id, "Session reset");
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            view: self.view,
            datasets: self.registry.iter().cloned().collect(),
            selected: self.registry.selected_name().map(str::to_string),
            has_agent: self.agent.is_some(),
            turns: self.agent.as_ref().map_or(0, |a| a.memory().len()),
            created_at: self.created_at,
        }
    }
}
