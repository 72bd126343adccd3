use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::session::Session;
use crate::types::{AppError, AppResult};

/// All live sessions. Each session sits behind its own mutex, so events for
/// one session are handled one at a time while other sessions proceed.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>>,
    ingest: IngestConfig,
}

impl SessionStore {
    pub fn new(ingest: IngestConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ingest,
        }
    }

    pub async fn create(&self) -> AppResult<Uuid> {
        let session = Session::new(self.ingest.clone())?;
        let id = session.id();
        let mut guard = self.inner.write().await;
        guard.insert(id, Arc::new(Mutex::new(session)));
        info!(session = %id, live = guard.len(), "Session started");
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Arc<Mutex<Session>>> {
        let guard = self.inner.read().await;
        guard
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("session {}", id)))
    }

    /// End a session; its workspace is deleted once the last handle drops.
    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        guard
            .remove(&id)
            .map(|_| info!(session = %id, "Session ended"))
            .ok_or_else(|| AppError::NotFound(format!("session {}", id)))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadedFile;
    use tempfile::TempDir;

    fn store(root: &TempDir) -> SessionStore {
        SessionStore::new(IngestConfig {
            workspace_root: Some(root.path().to_path_buf()),
            ..IngestConfig::default()
        })
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        let a = store.create().await.unwrap();
        let b = store.create().await.unwrap();
        assert_ne!(a, b);

        {
            let session = store.get(a).await.unwrap();
            let mut session = session.lock().await;
            session
                .upload(&[UploadedFile::new("a.csv", "x\n1\n")])
                .unwrap();
        }

        let other = store.get(b).await.unwrap();
        assert!(other.lock().await.registry().is_empty());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_remove_deletes_workspace() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        let id = store.create().await.unwrap();
        let workspace = {
            let session = store.get(id).await.unwrap();
            let path = session.lock().await.workspace_path().to_path_buf();
            path
        };
        assert!(workspace.exists());

        store.remove(id).await.unwrap();
        assert!(!workspace.exists());
        assert!(matches!(store.get(id).await, Err(AppError::NotFound(_))));
        assert!(store.remove(id).await.is_err());
    }
}
