//! Persistence of canvases and settings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use canvas_core::{CanvasId, CanvasRecord, Settings};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::OpsResult;

const CANVASES_DIR: &str = "canvases";
const SETTINGS_FILE: &str = "settings.json";

/// Document store behind the operations layer.
#[async_trait]
pub trait CanvasRepository: Send + Sync {
    async fn load_canvas(&self, id: CanvasId) -> OpsResult<Option<CanvasRecord>>;

    async fn save_canvas(&self, record: &CanvasRecord) -> OpsResult<()>;

    /// Returns whether a canvas was removed.
    async fn delete_canvas(&self, id: CanvasId) -> OpsResult<bool>;

    async fn list_canvases(&self) -> OpsResult<Vec<CanvasRecord>>;

    async fn load_settings(&self) -> OpsResult<Option<Settings>>;

    async fn save_settings(&self, settings: &Settings) -> OpsResult<()>;
}

// =============================================================================
// JSON files
// =============================================================================

/// One pretty-printed JSON file per canvas under `<root>/canvases/`.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn canvases_dir(&self) -> PathBuf {
        self.root.join(CANVASES_DIR)
    }

    fn canvas_path(&self, id: CanvasId) -> PathBuf {
        self.canvases_dir().join(format!("{}.json", id))
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }
}

/// Write through a sibling temp file so readers never see a partial document.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> OpsResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), "Saved document");
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> OpsResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl CanvasRepository for JsonFileRepository {
    async fn load_canvas(&self, id: CanvasId) -> OpsResult<Option<CanvasRecord>> {
        read_json(&self.canvas_path(id)).await
    }

    async fn save_canvas(&self, record: &CanvasRecord) -> OpsResult<()> {
        write_json(&self.canvas_path(record.id), record).await
    }

    async fn delete_canvas(&self, id: CanvasId) -> OpsResult<bool> {
        match tokio::fs::remove_file(self.canvas_path(id)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_canvases(&self) -> OpsResult<Vec<CanvasRecord>> {
        let dir = self.canvases_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<CanvasRecord>(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(err) => warn!(path = %path.display(), error = %err, "Skipping unreadable canvas"),
            }
        }
        Ok(records)
    }

    async fn load_settings(&self) -> OpsResult<Option<Settings>> {
        read_json(&self.settings_path()).await
    }

    async fn save_settings(&self, settings: &Settings) -> OpsResult<()> {
        write_json(&self.settings_path(), settings).await
    }
}

// =============================================================================
// In memory
// =============================================================================

/// Volatile repository for tests and `serve --memory`.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    canvases: RwLock<HashMap<CanvasId, CanvasRecord>>,
    settings: RwLock<Option<Settings>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CanvasRepository for MemoryRepository {
    async fn load_canvas(&self, id: CanvasId) -> OpsResult<Option<CanvasRecord>> {
        Ok(self.canvases.read().await.get(&id).cloned())
    }

    async fn save_canvas(&self, record: &CanvasRecord) -> OpsResult<()> {
        self.canvases
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn delete_canvas(&self, id: CanvasId) -> OpsResult<bool> {
        Ok(self.canvases.write().await.remove(&id).is_some())
    }

    async fn list_canvases(&self) -> OpsResult<Vec<CanvasRecord>> {
        Ok(self.canvases.read().await.values().cloned().collect())
    }

    async fn load_settings(&self) -> OpsResult<Option<Settings>> {
        Ok(self.settings.read().await.clone())
    }

    async fn save_settings(&self, settings: &Settings) -> OpsResult<()> {
        *self.settings.write().await = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::{FieldKey, UserId};
    use tempfile::TempDir;

    #[tokio::test]
    async fn json_repository_round_trips_canvases() {
        let temp_dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::new(temp_dir.path());

        let record = CanvasRecord::new(UserId::from("alice"), Some("Claims".into()));
        assert!(repo.load_canvas(record.id).await.unwrap().is_none());

        repo.save_canvas(&record).await.unwrap();
        let path = temp_dir
            .path()
            .join("canvases")
            .join(format!("{}.json", record.id));
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = repo.load_canvas(record.id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(repo.list_canvases().await.unwrap().len(), 1);

        assert!(repo.delete_canvas(record.id).await.unwrap());
        assert!(!repo.delete_canvas(record.id).await.unwrap());
        assert!(repo.list_canvases().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_repository_skips_corrupt_files() {
        let temp_dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::new(temp_dir.path());
        repo.save_canvas(&CanvasRecord::new(UserId::from("a"), None))
            .await
            .unwrap();
        std::fs::write(temp_dir.path().join("canvases").join("broken.json"), "{").unwrap();
        std::fs::write(temp_dir.path().join("canvases").join("notes.txt"), "hi").unwrap();

        assert_eq!(repo.list_canvases().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn settings_persist_in_both_repositories() {
        let temp_dir = TempDir::new().unwrap();
        let file_repo = JsonFileRepository::new(temp_dir.path());
        let memory_repo = MemoryRepository::new();
        let repos: [&dyn CanvasRepository; 2] = [&file_repo, &memory_repo];

        let settings = Settings {
            llm: None,
            disabled_fields: [FieldKey::Governance].into(),
        };
        for repo in repos {
            assert!(repo.load_settings().await.unwrap().is_none());
            repo.save_settings(&settings).await.unwrap();
            assert_eq!(repo.load_settings().await.unwrap(), Some(settings.clone()));
        }
    }
}
