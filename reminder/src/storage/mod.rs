//! Storage module
//!
//! The task store contract shared by every persistence backend, plus the
//! flat key-value backend. The SQLite backend lives in `database`.

pub mod json_store;

pub use json_store::JsonTaskStore;

use crate::database::{Task, TaskFields, TaskFilter};
use crate::error::Result;
use async_trait::async_trait;

/// Persistent collection of tasks
///
/// Writes must be durable when the returned future resolves.
/// `delete` and `complete` are idempotent: deleting a missing task is a
/// no-op and completing a completed task returns it unchanged.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task with a fresh id
    async fn create(&self, fields: &TaskFields) -> Result<Task>;

    /// Fetch a task by id
    async fn get(&self, id: &str) -> Result<Task>;

    /// Replace the editable fields of a task
    async fn update(&self, id: &str, fields: &TaskFields) -> Result<Task>;

    /// Mark a task completed
    async fn complete(&self, id: &str) -> Result<Task>;

    /// Remove a task permanently
    async fn delete(&self, id: &str) -> Result<()>;

    /// List tasks in one of the named views
    async fn query(&self, filter: TaskFilter) -> Result<Vec<Task>>;
}
