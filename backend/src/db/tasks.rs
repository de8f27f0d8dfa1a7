//! Task and subtask store operations.
//!
//! Tasks are scoped by project id. Subtasks are scoped through their parent task,
//! so a subtask is only visible through the project that owns that task.

use sqlx::Row;

use super::{timestamp, Repository};
use crate::errors::AppError;
use crate::models::{
    Attachment, CreateSubTaskRequest, CreateTaskRequest, SubTask, Task, TaskStatus,
    UpdateSubTaskRequest, UpdateTaskRequest, UserSummary,
};

const TASK_COLUMNS: &str = "id, project_id, title, description, assigned_to, assigned_by, status, attachments, created_at, updated_at";

/// Task rows joined with the assignee's and assigner's public profiles.
const TASK_SELECT: &str = r#"SELECT t.id, t.project_id, t.title, t.description, t.status, t.attachments,
           t.created_at, t.updated_at,
           t.assigned_to, ua.username AS assigned_to_username, ua.full_name AS assigned_to_full_name,
           t.assigned_by, ub.username AS assigned_by_username, ub.full_name AS assigned_by_full_name
    FROM tasks t
    JOIN users ua ON ua.id = t.assigned_to
    JOIN users ub ON ub.id = t.assigned_by"#;

impl Repository {
    // ==================== TASK OPERATIONS ====================

    /// List a project's tasks, newest first.
    pub async fn list_tasks(&self, project_id: &str) -> Result<Vec<Task>, AppError> {
        let rows = sqlx::query(&format!(
            "{} WHERE t.project_id = ? ORDER BY t.created_at DESC, t.rowid DESC",
            TASK_SELECT
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(task_from_row).collect()
    }

    /// Get a task, provided it belongs to the given project.
    pub async fn get_task(&self, project_id: &str, task_id: &str) -> Result<Option<Task>, AppError> {
        let row = sqlx::query(&format!(
            "{} WHERE t.id = ? AND t.project_id = ?",
            TASK_SELECT
        ))
        .bind(task_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(task_from_row).transpose()
    }

    /// Reload a task just written, with its user profiles.
    async fn reload_task(&self, project_id: &str, task_id: &str) -> Result<Task, AppError> {
        self.get_task(project_id, task_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Task {} vanished after write", task_id)))
    }

    pub async fn create_task(
        &self,
        project_id: &str,
        assigned_by: &str,
        request: &CreateTaskRequest,
    ) -> Result<Task, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();
        let attachments_json = serde_json::to_string(&request.attachments)?;

        sqlx::query(&format!(
            "INSERT INTO tasks ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            TASK_COLUMNS
        ))
        .bind(&id)
        .bind(project_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.assigned_to)
        .bind(assigned_by)
        .bind(request.status.as_str())
        .bind(&attachments_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::info!(project_id = %project_id, task_id = %id, "Task created");

        self.reload_task(project_id, &id).await
    }

    /// Update a task. Only fields present in the request change; a `null`
    /// description clears it.
    pub async fn update_task(
        &self,
        project_id: &str,
        task_id: &str,
        request: &UpdateTaskRequest,
    ) -> Result<Task, AppError> {
        let existing = self
            .get_task(project_id, task_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;

        let now = timestamp();
        let title = request.title.clone().unwrap_or(existing.title);
        let description = request.description.clone().unwrap_or(existing.description);
        let assigned_to = request
            .assigned_to
            .clone()
            .unwrap_or(existing.assigned_to.id);
        let status = request.status.unwrap_or(existing.status);
        let attachments = request.attachments.clone().unwrap_or(existing.attachments);
        let attachments_json = serde_json::to_string(&attachments)?;

        sqlx::query(
            r#"UPDATE tasks SET
                title = ?, description = ?, assigned_to = ?, status = ?, attachments = ?, updated_at = ?
            WHERE id = ? AND project_id = ?"#,
        )
        .bind(&title)
        .bind(&description)
        .bind(&assigned_to)
        .bind(status.as_str())
        .bind(&attachments_json)
        .bind(&now)
        .bind(task_id)
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(project_id = %project_id, task_id = %task_id, status = %status, "Task updated");

        self.reload_task(project_id, task_id).await
    }

    /// Delete a task and its subtasks.
    pub async fn delete_task(&self, project_id: &str, task_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query("SELECT 1 FROM tasks WHERE id = ? AND project_id = ?")
            .bind(task_id)
            .bind(project_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owned.is_none() {
            return Err(AppError::NotFound("Task not found".to_string()));
        }

        sqlx::query("DELETE FROM subtasks WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(project_id = %project_id, task_id = %task_id, "Task deleted");
        Ok(())
    }

    // ==================== SUBTASK OPERATIONS ====================

    /// List a task's subtasks in creation order.
    pub async fn list_subtasks(&self, task_id: &str) -> Result<Vec<SubTask>, AppError> {
        let rows = sqlx::query(
            "SELECT id, task_id, title, is_completed, created_by, created_at, updated_at FROM subtasks WHERE task_id = ? ORDER BY created_at, rowid",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(subtask_from_row).collect())
    }

    /// Get a subtask whose parent task belongs to the given project.
    pub async fn get_subtask(
        &self,
        project_id: &str,
        subtask_id: &str,
    ) -> Result<Option<SubTask>, AppError> {
        let row = sqlx::query(
            r#"SELECT s.id, s.task_id, s.title, s.is_completed, s.created_by, s.created_at, s.updated_at
               FROM subtasks s
               JOIN tasks t ON t.id = s.task_id
               WHERE s.id = ? AND t.project_id = ?"#,
        )
        .bind(subtask_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(subtask_from_row))
    }

    /// Create a subtask. Callers must have checked that the task is in the caller's project.
    pub async fn create_subtask(
        &self,
        task_id: &str,
        created_by: &str,
        request: &CreateSubTaskRequest,
    ) -> Result<SubTask, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();

        sqlx::query(
            "INSERT INTO subtasks (id, task_id, title, is_completed, created_by, created_at, updated_at) VALUES (?, ?, ?, 0, ?, ?, ?)",
        )
        .bind(&id)
        .bind(task_id)
        .bind(&request.title)
        .bind(created_by)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::info!(task_id = %task_id, subtask_id = %id, "Subtask created");

        Ok(SubTask {
            id,
            task_id: task_id.to_string(),
            title: request.title.clone(),
            is_completed: false,
            created_by: created_by.to_string(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Update a subtask reached through its project. Only fields present in the request change.
    pub async fn update_subtask(
        &self,
        project_id: &str,
        subtask_id: &str,
        request: &UpdateSubTaskRequest,
    ) -> Result<SubTask, AppError> {
        let existing = self
            .get_subtask(project_id, subtask_id)
            .await?
            .ok_or_else(|| AppError::NotFound("SubTask not found".to_string()))?;

        let now = timestamp();
        let title = request.title.clone().unwrap_or(existing.title);
        let is_completed = request.is_completed.unwrap_or(existing.is_completed);

        sqlx::query("UPDATE subtasks SET title = ?, is_completed = ?, updated_at = ? WHERE id = ?")
            .bind(&title)
            .bind(is_completed as i32)
            .bind(&now)
            .bind(subtask_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(subtask_id = %subtask_id, is_completed, "Subtask updated");

        Ok(SubTask {
            title,
            is_completed,
            updated_at: now,
            ..existing
        })
    }

    /// Delete a subtask reached through its project.
    pub async fn delete_subtask(&self, project_id: &str, subtask_id: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "DELETE FROM subtasks WHERE id = ? AND task_id IN (SELECT id FROM tasks WHERE project_id = ?)",
        )
        .bind(subtask_id)
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("SubTask not found".to_string()));
        }

        tracing::info!(subtask_id = %subtask_id, "Subtask deleted");
        Ok(())
    }
}

// Helper functions for row conversion

fn task_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Task, AppError> {
    let status: String = row.get("status");
    let attachments: String = row.get("attachments");

    Ok(Task {
        id: row.get("id"),
        project_id: row.get("project_id"),
        title: row.get("title"),
        description: row.get("description"),
        assigned_to: UserSummary {
            id: row.get("assigned_to"),
            username: row.get("assigned_to_username"),
            full_name: row.get("assigned_to_full_name"),
        },
        assigned_by: UserSummary {
            id: row.get("assigned_by"),
            username: row.get("assigned_by_username"),
            full_name: row.get("assigned_by_full_name"),
        },
        status: status.parse::<TaskStatus>().map_err(AppError::Internal)?,
        attachments: parse_attachments(&attachments)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn subtask_from_row(row: &sqlx::sqlite::SqliteRow) -> SubTask {
    let is_completed: i32 = row.get("is_completed");
    SubTask {
        id: row.get("id"),
        task_id: row.get("task_id"),
        title: row.get("title"),
        is_completed: is_completed != 0,
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn parse_attachments(raw: &str) -> Result<Vec<Attachment>, AppError> {
    serde_json::from_str(raw)
        .map_err(|err| AppError::Internal(format!("Corrupt attachments column: {}", err)))
}
