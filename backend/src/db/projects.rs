//! Project store operations.

use sqlx::Row;

use super::members::parse_role;
use super::{timestamp, Repository};
use crate::errors::AppError;
use crate::models::{
    CreateProjectRequest, Project, ProjectRole, ProjectSummary, UpdateProjectRequest, UserProject,
};

impl Repository {
    /// Get a project by ID.
    pub async fn get_project(&self, id: &str) -> Result<Option<Project>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, description, created_by, created_at, updated_at FROM projects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(project_from_row))
    }

    /// List the projects a user belongs to, newest first, with member counts and the user's role.
    pub async fn list_projects_for_user(&self, user_id: &str) -> Result<Vec<UserProject>, AppError> {
        let rows = sqlx::query(
            r#"SELECT p.id, p.name, p.description, p.created_by, p.created_at, pm.role,
                      (SELECT COUNT(*) FROM project_members c WHERE c.project_id = p.id) AS members
               FROM project_members pm
               JOIN projects p ON p.id = pm.project_id
               WHERE pm.user_id = ?
               ORDER BY p.created_at DESC, p.rowid DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<UserProject, AppError> {
                Ok(UserProject {
                    project: ProjectSummary {
                        id: row.get("id"),
                        name: row.get("name"),
                        description: row.get("description"),
                        created_by: row.get("created_by"),
                        created_at: row.get("created_at"),
                        members: row.get("members"),
                    },
                    role: parse_role(&row.get::<String, _>("role"))?,
                })
            })
            .collect()
    }

    /// Create a project and its owner's ADMIN membership in one transaction.
    pub async fn create_project(
        &self,
        owner_id: &str,
        request: &CreateProjectRequest,
    ) -> Result<Project, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO projects (id, name, description, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(owner_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO project_members (project_id, user_id, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(ProjectRole::Admin.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(project_id = %id, owner_id = %owner_id, "Project created");

        Ok(Project {
            id,
            name: request.name.clone(),
            description: request.description.clone(),
            created_by: owner_id.to_string(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Update a project. Only fields present in the request change; a `null`
    /// description clears it.
    pub async fn update_project(
        &self,
        id: &str,
        request: &UpdateProjectRequest,
    ) -> Result<Project, AppError> {
        let existing = self
            .get_project(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", id)))?;

        let now = timestamp();
        let name = request.name.clone().unwrap_or(existing.name);
        let description = request.description.clone().unwrap_or(existing.description);

        sqlx::query("UPDATE projects SET name = ?, description = ?, updated_at = ? WHERE id = ?")
            .bind(&name)
            .bind(&description)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        tracing::info!(project_id = %id, "Project updated");

        Ok(Project {
            id: id.to_string(),
            name,
            description,
            created_by: existing.created_by,
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    /// Delete a project together with its subtasks, tasks, notes and memberships.
    pub async fn delete_project(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM subtasks WHERE task_id IN (SELECT id FROM tasks WHERE project_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        for statement in [
            "DELETE FROM tasks WHERE project_id = ?",
            "DELETE FROM notes WHERE project_id = ?",
            "DELETE FROM project_members WHERE project_id = ?",
        ] {
            sqlx::query(statement).bind(id).execute(&mut *tx).await?;
        }

        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back the cascade above.
            return Err(AppError::NotFound(format!("Project {} not found", id)));
        }

        tx.commit().await?;

        tracing::info!(project_id = %id, "Project deleted");
        Ok(())
    }
}

fn project_from_row(row: &sqlx::sqlite::SqliteRow) -> Project {
    Project {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
