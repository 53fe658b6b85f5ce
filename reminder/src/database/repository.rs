//! Repository layer for database operations
//!
//! SQLite implementation of the task store. Every write is a single
//! statement, so it is durable once the call returns.

use super::models::*;
use crate::error::{AppError, Result};
use crate::storage::TaskStore;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new task
    pub async fn create_task(&self, fields: &TaskFields) -> Result<Task> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let rule = RecurrenceColumns::from(fields.recurrence);

        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            INSERT INTO tasks (id, title, note, due_date, recurrence_kind, recurrence_interval,
                               recurrence_hour, recurrence_minute, recurrence_weekday,
                               completed_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&fields.title)
        .bind(&fields.note)
        .bind(fields.due_date)
        .bind(rule.kind)
        .bind(rule.interval)
        .bind(rule.hour)
        .bind(rule.minute)
        .bind(rule.weekday)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created task: {}", id);
        Task::try_from(row)
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: &str) -> Result<Task> {
        let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::TaskNotFound(id.to_string()))?;

        Task::try_from(row)
    }

    /// Replace a task's editable fields
    pub async fn update_task(&self, id: &str, fields: &TaskFields) -> Result<Task> {
        let now = Utc::now();
        let rule = RecurrenceColumns::from(fields.recurrence);

        let rows_affected = sqlx::query(
            r#"
            UPDATE tasks
            SET title = ?, note = ?, due_date = ?, recurrence_kind = ?, recurrence_interval = ?,
                recurrence_hour = ?, recurrence_minute = ?, recurrence_weekday = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.note)
        .bind(fields.due_date)
        .bind(rule.kind)
        .bind(rule.interval)
        .bind(rule.hour)
        .bind(rule.minute)
        .bind(rule.weekday)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::TaskNotFound(id.to_string()));
        }

        tracing::debug!("Updated task: {}", id);
        self.get_task(id).await
    }

    /// Mark a task completed, keeping the first completion time
    pub async fn complete_task(&self, id: &str) -> Result<Task> {
        let now = Utc::now();

        let rows = sqlx::query(
            "UPDATE tasks SET completed_at = ?, updated_at = ? WHERE id = ? AND completed_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            tracing::debug!("Task {} already completed or missing", id);
        } else {
            tracing::debug!("Completed task: {}", id);
        }

        self.get_task(id).await
    }

    /// Permanently delete a task
    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Deleted task: {} ({} rows)", id, rows);
        Ok(())
    }

    /// List tasks in a named view
    pub async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let sql = match filter {
            TaskFilter::ToDo => {
                r#"
                SELECT * FROM tasks
                WHERE due_date IS NOT NULL AND completed_at IS NULL
                ORDER BY due_date ASC, created_at ASC
                "#
            }
            TaskFilter::AlwaysOn => {
                r#"
                SELECT * FROM tasks
                WHERE due_date IS NULL AND recurrence_kind IS NOT NULL AND completed_at IS NULL
                ORDER BY CASE recurrence_kind
                    WHEN 'minutes' THEN 0
                    WHEN 'hours' THEN 1
                    WHEN 'daily' THEN 2
                    ELSE 3
                END, created_at ASC
                "#
            }
            TaskFilter::Done => {
                r#"
                SELECT * FROM tasks
                WHERE completed_at IS NOT NULL
                ORDER BY completed_at DESC
                "#
            }
            TaskFilter::Active => {
                r#"
                SELECT * FROM tasks
                WHERE completed_at IS NULL
                ORDER BY created_at ASC
                "#
            }
        };

        let rows = sqlx::query_as::<_, TaskRow>(sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Task::try_from).collect()
    }
}

#[async_trait]
impl TaskStore for Repository {
    async fn create(&self, fields: &TaskFields) -> Result<Task> {
        self.create_task(fields).await
    }

    async fn get(&self, id: &str) -> Result<Task> {
        self.get_task(id).await
    }

    async fn update(&self, id: &str, fields: &TaskFields) -> Result<Task> {
        self.update_task(id, fields).await
    }

    async fn complete(&self, id: &str) -> Result<Task> {
        self.complete_task(id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.delete_task(id).await
    }

    async fn query(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        self.list_tasks(filter).await
    }
}
