//! Persistence collaborator contract and the JSON file adapter
//!
//! The reconciler only talks to a [`TaskStore`]. `JsonFileStore` keeps
//! every user's tasks in one JSON document and writes a backup next to it
//! before each save.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use weekwise_core::{NewTask, Task, TaskId, TaskPatch, UserId};

/// Failures of a persistence call
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Task {0} not found in store")]
    NotFound(TaskId),

    #[error("Store IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Store data is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an unavailable error with a message
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: None,
        }
    }
}

/// Narrow CRUD contract of the remote task store
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks of `user`, date ascending with unscheduled first
    async fn list_tasks(&self, user: &UserId) -> Result<Vec<Task>, StoreError>;

    /// Persist a new record; the store assigns the id
    async fn create_task(&self, fields: NewTask) -> Result<Task, StoreError>;

    /// Replace the fields named by `patch`
    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError>;

    /// Delete every completed task of `user`, returns how many went away
    async fn delete_completed(&self, user: &UserId) -> Result<usize, StoreError>;
}

/// Listing order of the store: date ascending, unscheduled first
pub fn sort_for_listing(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| a.date.cmp(&b.date));
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct StoreDocument {
    #[serde(default)]
    tasks: Vec<StoredTask>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct StoredTask {
    user_id: UserId,
    #[serde(flatten)]
    task: Task,
}

/// JSON document storage adapter
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a new storage adapter for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Get the storage path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the backup file path
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".bak");
        self.path.with_file_name(name)
    }

    /// Check if backup exists
    pub async fn backup_exists(&self) -> bool {
        tokio::fs::try_exists(self.backup_path()).await.unwrap_or(false)
    }

    /// Replace the document with the backup, returns how many tasks it holds
    pub async fn recover(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let backup = self.backup_path();
        if !tokio::fs::try_exists(&backup).await.unwrap_or(false) {
            return Err(StoreError::unavailable(format!(
                "No backup file at {}",
                backup.display()
            )));
        }

        let doc = Self::read_from(&backup).await?;
        let json = serde_json::to_string_pretty(&doc)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| StoreError::io(format!("Failed to write {}", self.path.display()), e))?;

        warn!(backup = %backup.display(), tasks = doc.tasks.len(), "store recovered from backup");
        Ok(doc.tasks.len())
    }

    async fn read(&self) -> Result<StoreDocument, StoreError> {
        Self::read_from(&self.path).await
    }

    async fn read_from(path: &Path) -> Result<StoreDocument, StoreError> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(StoreDocument::default()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(StoreError::io(
                format!("Failed to read {}", path.display()),
                e,
            )),
        }
    }

    async fn write(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(format!("Failed to create {}", parent.display()), e))?;
        }

        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            let backup = self.backup_path();
            if let Err(e) = tokio::fs::copy(&self.path, &backup).await {
                warn!(error = %e, backup = %backup.display(), "could not write store backup");
            }
        }

        let json = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| StoreError::io(format!("Failed to write {}", self.path.display()), e))
    }
}

#[async_trait]
impl TaskStore for JsonFileStore {
    async fn list_tasks(&self, user: &UserId) -> Result<Vec<Task>, StoreError> {
        let _guard = self.lock.lock().await;
        let doc = self.read().await?;

        let mut tasks: Vec<Task> = doc
            .tasks
            .into_iter()
            .filter(|stored| &stored.user_id == user)
            .map(|stored| stored.task)
            .collect();
        sort_for_listing(&mut tasks);
        debug!(count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    async fn create_task(&self, fields: NewTask) -> Result<Task, StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;

        let user_id = fields.user_id.clone();
        let task = fields.into_task(TaskId::new(Uuid::new_v4().to_string()));
        doc.tasks.push(StoredTask {
            user_id,
            task: task.clone(),
        });
        self.write(&doc).await?;

        debug!(id = %task.id, "created task");
        Ok(task)
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;

        let stored = doc
            .tasks
            .iter_mut()
            .find(|stored| &stored.task.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        stored.task.apply(patch);
        self.write(&doc).await?;

        debug!(id = %id, fields = ?patch.fields(), "updated task");
        Ok(())
    }

    async fn delete_completed(&self, user: &UserId) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;

        let before = doc.tasks.len();
        doc.tasks
            .retain(|stored| !(stored.task.is_completed && &stored.user_id == user));
        let removed = before - doc.tasks.len();
        if removed > 0 {
            self.write(&doc).await?;
        }

        debug!(removed, "deleted completed tasks");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use tempfile::tempdir;

    fn user() -> UserId {
        UserId::new("user-1")
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("tasks.json"));
        assert!(store.list_tasks(&user()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_assigns_unique_ids() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("tasks.json"));

        let a = store
            .create_task(NewTask::new("First", user()).unwrap())
            .await
            .unwrap();
        let b = store
            .create_task(NewTask::new("Second", user()).unwrap())
            .await
            .unwrap();

        assert_ne!(a.id, b.id);
        assert!(!a.is_completed);
        assert_eq!(store.list_tasks(&user()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_listing_is_date_ascending_and_scoped() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("tasks.json"));

        for (title, date) in [
            ("later", NaiveDate::from_ymd_opt(2024, 5, 3)),
            ("sooner", NaiveDate::from_ymd_opt(2024, 5, 1)),
            ("whenever", None),
        ] {
            let fields = NewTask::new(title, user()).unwrap().with_schedule(date, None);
            store.create_task(fields).await.unwrap();
        }
        store
            .create_task(NewTask::new("not mine", UserId::new("someone-else")).unwrap())
            .await
            .unwrap();

        let titles: Vec<String> = store
            .list_tasks(&user())
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["whenever", "sooner", "later"]);
    }

    #[tokio::test]
    async fn test_update_and_backup() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("tasks.json"));
        let task = store
            .create_task(NewTask::new("Standup", user()).unwrap())
            .await
            .unwrap();

        let patch = TaskPatch::new()
            .date(NaiveDate::from_ymd_opt(2024, 5, 2))
            .time(NaiveTime::from_hms_opt(9, 0, 0));
        store.update_task(&task.id, &patch).await.unwrap();

        let listed = store.list_tasks(&user()).await.unwrap();
        assert_eq!(listed[0].time, NaiveTime::from_hms_opt(9, 0, 0));
        assert!(store.backup_path().exists());
        assert!(store.backup_path().ends_with("tasks.json.bak"));

        let missing = store.update_task(&TaskId::from("nope"), &patch).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_completed_only_for_user() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("tasks.json"));
        let mine = store
            .create_task(NewTask::new("Done", user()).unwrap())
            .await
            .unwrap();
        let theirs = store
            .create_task(NewTask::new("Theirs", UserId::new("other")).unwrap())
            .await
            .unwrap();
        store.create_task(NewTask::new("Open", user()).unwrap()).await.unwrap();

        let done = TaskPatch::new().completed(true);
        store.update_task(&mine.id, &done).await.unwrap();
        store.update_task(&theirs.id, &done).await.unwrap();

        assert_eq!(store.delete_completed(&user()).await.unwrap(), 1);
        assert_eq!(store.list_tasks(&user()).await.unwrap().len(), 1);
        assert_eq!(store.list_tasks(&UserId::new("other")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recover_from_backup() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("tasks.json"));
        assert!(!store.backup_exists().await);
        assert!(matches!(store.recover().await, Err(StoreError::Unavailable { .. })));

        store.create_task(NewTask::new("Keep me", user()).unwrap()).await.unwrap();
        store.create_task(NewTask::new("Oops", user()).unwrap()).await.unwrap();
        assert!(store.backup_exists().await);

        assert_eq!(store.recover().await.unwrap(), 1);
        let titles: Vec<String> = store
            .list_tasks(&user())
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["Keep me"]);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.list_tasks(&user()).await, Err(StoreError::Json(_))));
    }
}
