//! Membership store: the (project, user, role) rows every authorization decision reads.

use sqlx::Row;

use super::{timestamp, Repository};
use crate::errors::AppError;
use crate::models::{Membership, ProjectMember, ProjectRole, UserSummary};

const MEMBERSHIP_BY_PAIR: &str = "SELECT project_id, user_id, role, created_at, updated_at FROM project_members WHERE project_id = ? AND user_id = ?";

impl Repository {
    /// Find a user's membership in a project.
    pub async fn find_membership(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<Membership>, AppError> {
        let row = sqlx::query(MEMBERSHIP_BY_PAIR)
            .bind(project_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(membership_from_row).transpose()
    }

    /// List a project's members in join order, with their public profile.
    pub async fn list_members(&self, project_id: &str) -> Result<Vec<ProjectMember>, AppError> {
        let rows = sqlx::query(
            r#"SELECT pm.project_id, pm.role, pm.created_at, pm.updated_at,
                      u.id AS user_id, u.username, u.full_name
               FROM project_members pm
               JOIN users u ON u.id = pm.user_id
               WHERE pm.project_id = ?
               ORDER BY pm.created_at, pm.rowid"#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ProjectMember, AppError> {
                Ok(ProjectMember {
                    user: UserSummary {
                        id: row.get("user_id"),
                        username: row.get("username"),
                        full_name: row.get("full_name"),
                    },
                    project_id: row.get("project_id"),
                    role: parse_role(&row.get::<String, _>("role"))?,
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                })
            })
            .collect()
    }

    /// Add a user to a project. Fails with `Conflict` if the pair already exists.
    pub async fn add_member(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<Membership, AppError> {
        if self.find_membership(project_id, user_id).await?.is_some() {
            return Err(AppError::Conflict(
                "User is already a member of this project".to_string(),
            ));
        }

        let now = timestamp();
        sqlx::query(
            "INSERT INTO project_members (project_id, user_id, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|err| match AppError::from(err) {
            // Lost a race with a concurrent add of the same pair.
            AppError::Conflict(_) => {
                AppError::Conflict("User is already a member of this project".to_string())
            }
            other => other,
        })?;

        tracing::info!(project_id = %project_id, user_id = %user_id, role = %role, "Member added");

        Ok(Membership {
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            role,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Change a member's role. The project's last ADMIN cannot be demoted.
    ///
    /// The admin count is checked inside the `UPDATE` itself, so SQLite's write
    /// lock serializes concurrent demotions and the loser sees the new count.
    pub async fn set_member_role(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<Membership, AppError> {
        let now = timestamp();
        let result = sqlx::query(
            r#"UPDATE project_members SET role = ?1, updated_at = ?2
               WHERE project_id = ?3 AND user_id = ?4
                 AND (role != ?5 OR ?1 = ?5
                      OR (SELECT COUNT(*) FROM project_members
                          WHERE project_id = ?3 AND role = ?5) > 1)"#,
        )
        .bind(role.as_str())
        .bind(&now)
        .bind(project_id)
        .bind(user_id)
        .bind(ProjectRole::Admin.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match self.find_membership(project_id, user_id).await? {
                Some(_) => AppError::AdminProtected(
                    "A project must keep at least one admin".to_string(),
                ),
                None => AppError::NotFound("Project member not found".to_string()),
            });
        }

        tracing::info!(
            project_id = %project_id,
            user_id = %user_id,
            role = %role,
            "Member role changed"
        );

        self.find_membership(project_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Project member not found".to_string()))
    }

    /// Remove a member. ADMIN memberships are never removable.
    pub async fn remove_member(&self, project_id: &str, user_id: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "DELETE FROM project_members WHERE project_id = ? AND user_id = ? AND role != ?",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(ProjectRole::Admin.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match self.find_membership(project_id, user_id).await? {
                Some(_) => AppError::AdminProtected("Admin members cannot be removed".to_string()),
                None => AppError::NotFound("Project member not found".to_string()),
            });
        }

        tracing::info!(project_id = %project_id, user_id = %user_id, "Member removed");
        Ok(())
    }
}

/// Decode a stored role. The table's CHECK constraint keeps this infallible in practice.
pub(super) fn parse_role(raw: &str) -> Result<ProjectRole, AppError> {
    raw.parse().map_err(AppError::Internal)
}

fn membership_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Membership, AppError> {
    Ok(Membership {
        project_id: row.get("project_id"),
        user_id: row.get("user_id"),
        role: parse_role(&row.get::<String, _>("role"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
