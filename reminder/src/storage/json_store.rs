//! Flat key-value task store
//!
//! Keeps every task in one JSON document, split into the `to_do`,
//! `always_on` and `done` buckets. The document is rewritten atomically
//! on every change: the temp file is synced to disk before the rename.

use crate::database::{Task, TaskFields, TaskFilter};
use crate::error::{AppError, Result};
use crate::storage::TaskStore;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Buckets {
    #[serde(default)]
    to_do: Vec<Task>,
    #[serde(default)]
    always_on: Vec<Task>,
    #[serde(default)]
    done: Vec<Task>,
}

impl Buckets {
    fn insert(&mut self, task: Task) {
        if task.is_completed() {
            self.done.push(task);
        } else if task.due_date.is_some() {
            self.to_do.push(task);
        } else {
            self.always_on.push(task);
        }
    }

    fn take(&mut self, id: &str) -> Option<Task> {
        for bucket in [&mut self.to_do, &mut self.always_on, &mut self.done] {
            if let Some(index) = bucket.iter().position(|t| t.id == id) {
                return Some(bucket.remove(index));
            }
        }
        None
    }

    fn find(&self, id: &str) -> Option<&Task> {
        self.iter().find(|t| t.id == id)
    }

    fn iter(&self) -> impl Iterator<Item = &Task> {
        self.to_do
            .iter()
            .chain(self.always_on.iter())
            .chain(self.done.iter())
    }
}

/// Task store backed by a single JSON file
pub struct JsonTaskStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Buckets> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Buckets::default());
        }

        let content = fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Buckets::default());
        }

        Ok(serde_json::from_str(&content)?)
    }

    async fn save(&self, buckets: &Buckets) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(buckets)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, &self.path).await?;

        tracing::debug!("Saved task store to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl TaskStore for JsonTaskStore {
    async fn create(&self, fields: &TaskFields) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut buckets = self.load().await?;

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: fields.title.clone(),
            note: fields.note.clone(),
            due_date: fields.due_date,
            recurrence: fields.recurrence,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        buckets.insert(task.clone());
        self.save(&buckets).await?;

        tracing::debug!("Created task: {}", task.id);
        Ok(task)
    }

    async fn get(&self, id: &str) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let buckets = self.load().await?;

        buckets
            .find(id)
            .cloned()
            .ok_or_else(|| AppError::TaskNotFound(id.to_string()))
    }

    async fn update(&self, id: &str, fields: &TaskFields) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut buckets = self.load().await?;

        let mut task = buckets
            .take(id)
            .ok_or_else(|| AppError::TaskNotFound(id.to_string()))?;
        task.apply(fields, Utc::now());

        buckets.insert(task.clone());
        self.save(&buckets).await?;

        tracing::debug!("Updated task: {}", id);
        Ok(task)
    }

    async fn complete(&self, id: &str) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut buckets = self.load().await?;

        if let Some(task) = buckets.find(id) {
            if task.is_completed() {
                tracing::debug!("Task {} already completed", id);
                return Ok(task.clone());
            }
        }

        let mut task = buckets
            .take(id)
            .ok_or_else(|| AppError::TaskNotFound(id.to_string()))?;
        let now = Utc::now();
        task.completed_at = Some(now);
        task.updated_at = now;

        buckets.insert(task.clone());
        self.save(&buckets).await?;

        tracing::debug!("Completed task: {}", id);
        Ok(task)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut buckets = self.load().await?;

        if buckets.take(id).is_some() {
            self.save(&buckets).await?;
            tracing::debug!("Deleted task: {}", id);
        }

        Ok(())
    }

    async fn query(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let _guard = self.lock.lock().await;
        let buckets = self.load().await?;

        let mut tasks: Vec<Task> = buckets
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        filter.sort(&mut tasks);

        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Recurrence;
    use chrono::{Duration, Weekday};
    use tempfile::TempDir;

    fn create_test_store() -> (JsonTaskStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonTaskStore::new(temp_dir.path().join("reminders.json"));
        (store, temp_dir)
    }

    fn due_fields(title: &str, hours_from_now: i64) -> TaskFields {
        TaskFields {
            title: title.to_string(),
            note: String::new(),
            due_date: Some(Utc::now() + Duration::hours(hours_from_now)),
            recurrence: None,
        }
    }

    #[tokio::test]
    async fn test_empty_store_lists_nothing() {
        let (store, _temp) = create_test_store();

        assert!(store.query(TaskFilter::Active).await.unwrap().is_empty());
        assert!(matches!(
            store.get("nope").await,
            Err(AppError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_tasks_land_in_buckets() {
        let (store, _temp) = create_test_store();

        let dated = store.create(&due_fields("Dated", 1)).await.unwrap();
        let recurring = store
            .create(&TaskFields {
                title: "Water plants".to_string(),
                note: String::new(),
                due_date: None,
                recurrence: Some(Recurrence::daily(8, 0).unwrap()),
            })
            .await
            .unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        let buckets: Buckets = serde_json::from_str(&content).unwrap();
        assert_eq!(buckets.to_do[0].id, dated.id);
        assert_eq!(buckets.always_on[0].id, recurring.id);
        assert!(buckets.done.is_empty());

        store.complete(&dated.id).await.unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        let buckets: Buckets = serde_json::from_str(&content).unwrap();
        assert!(buckets.to_do.is_empty());
        assert_eq!(buckets.done[0].id, dated.id);
    }

    #[tokio::test]
    async fn test_update_moves_between_buckets() {
        let (store, _temp) = create_test_store();
        let task = store.create(&due_fields("Flexible", 2)).await.unwrap();

        let updated = store
            .update(
                &task.id,
                &TaskFields {
                    title: "Flexible".to_string(),
                    note: "now weekly".to_string(),
                    due_date: None,
                    recurrence: Some(Recurrence::weekly(18, 0, Weekday::Fri).unwrap()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, task.id);
        assert_eq!(updated.created_at, task.created_at);
        assert!(store.query(TaskFilter::ToDo).await.unwrap().is_empty());
        assert_eq!(store.query(TaskFilter::AlwaysOn).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_complete_and_delete_are_idempotent() {
        let (store, _temp) = create_test_store();
        let task = store.create(&due_fields("Once", 1)).await.unwrap();

        let first = store.complete(&task.id).await.unwrap();
        let second = store.complete(&task.id).await.unwrap();
        assert_eq!(first.completed_at, second.completed_at);
        assert_eq!(store.query(TaskFilter::Done).await.unwrap().len(), 1);

        store.delete(&task.id).await.unwrap();
        store.delete(&task.id).await.unwrap();
        assert!(store.query(TaskFilter::Done).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_todo_sorted_by_due_date() {
        let (store, _temp) = create_test_store();
        store.create(&due_fields("Later", 5)).await.unwrap();
        store.create(&due_fields("Sooner", 1)).await.unwrap();

        let todo = store.query(TaskFilter::ToDo).await.unwrap();
        assert_eq!(todo[0].title, "Sooner");
        assert_eq!(todo[1].title, "Later");
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reminders.json");

        let id = {
            let store = JsonTaskStore::new(&path);
            store.create(&due_fields("Persisted", 1)).await.unwrap().id
        };

        let store = JsonTaskStore::new(&path);
        assert_eq!(store.get(&id).await.unwrap().title, "Persisted");
    }

    #[tokio::test]
    async fn test_save_replaces_document_without_leftovers() {
        let (store, temp) = create_test_store();
        store.create(&due_fields("Synced", 1)).await.unwrap();
        store.create(&due_fields("Synced too", 2)).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["reminders.json".to_string()]);

        let content = std::fs::read_to_string(store.path()).unwrap();
        let buckets: Buckets = serde_json::from_str(&content).unwrap();
        assert_eq!(buckets.to_do.len(), 2);
    }

    #[tokio::test]
    async fn test_out_of_range_interval_in_file_rejected() {
        let (store, _temp) = create_test_store();
        std::fs::write(
            store.path(),
            r#"{
                "to_do": [],
                "always_on": [{
                    "id": "t1",
                    "title": "Broken",
                    "note": "",
                    "due_date": null,
                    "recurrence": {"kind": "every_n_minutes", "minutes": 0},
                    "completed_at": null,
                    "created_at": "2025-03-01T09:00:00Z",
                    "updated_at": "2025-03-01T09:00:00Z"
                }],
                "done": []
            }"#,
        )
        .unwrap();

        let result = store.query(TaskFilter::Active).await;
        assert!(matches!(result, Err(AppError::Serialization(_))));
    }
}
