//! Note store operations. Every lookup is scoped by project.

use sqlx::Row;

use super::{timestamp, Repository};
use crate::errors::AppError;
use crate::models::{CreateNoteRequest, Note, UpdateNoteRequest};

impl Repository {
    /// List a project's notes, newest first.
    pub async fn list_notes(&self, project_id: &str) -> Result<Vec<Note>, AppError> {
        let rows = sqlx::query(
            "SELECT id, project_id, created_by, content, created_at, updated_at FROM notes WHERE project_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(note_from_row).collect())
    }

    /// Get a note, provided it belongs to the given project.
    pub async fn get_note(&self, project_id: &str, note_id: &str) -> Result<Option<Note>, AppError> {
        let row = sqlx::query(
            "SELECT id, project_id, created_by, content, created_at, updated_at FROM notes WHERE id = ? AND project_id = ?",
        )
        .bind(note_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(note_from_row))
    }

    pub async fn create_note(
        &self,
        project_id: &str,
        author_id: &str,
        request: &CreateNoteRequest,
    ) -> Result<Note, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();

        sqlx::query(
            "INSERT INTO notes (id, project_id, created_by, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(project_id)
        .bind(author_id)
        .bind(&request.content)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::info!(project_id = %project_id, note_id = %id, "Note created");

        Ok(Note {
            id,
            project_id: project_id.to_string(),
            created_by: author_id.to_string(),
            content: request.content.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn update_note(
        &self,
        project_id: &str,
        note_id: &str,
        request: &UpdateNoteRequest,
    ) -> Result<Note, AppError> {
        let existing = self
            .get_note(project_id, note_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Note not found".to_string()))?;

        let now = timestamp();
        let content = request.content.clone().unwrap_or(existing.content);

        sqlx::query("UPDATE notes SET content = ?, updated_at = ? WHERE id = ? AND project_id = ?")
            .bind(&content)
            .bind(&now)
            .bind(note_id)
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(project_id = %project_id, note_id = %note_id, "Note updated");

        Ok(Note {
            content,
            updated_at: now,
            ..existing
        })
    }

    pub async fn delete_note(&self, project_id: &str, note_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ? AND project_id = ?")
            .bind(note_id)
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Note not found".to_string()));
        }

        tracing::info!(project_id = %project_id, note_id = %note_id, "Note deleted");
        Ok(())
    }
}

fn note_from_row(row: &sqlx::sqlite::SqliteRow) -> Note {
    Note {
        id: row.get("id"),
        project_id: row.get("project_id"),
        created_by: row.get("created_by"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
