//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for users, projects, memberships, notes and tasks.

mod members;
mod notes;
mod projects;
mod repository;
mod tasks;

pub use repository::*;

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Current time as a fixed-width RFC 3339 string, so text ordering matches time ordering.
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            username TEXT NOT NULL UNIQUE,
            full_name TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_by TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_members (
            project_id TEXT NOT NULL REFERENCES projects(id),
            user_id TEXT NOT NULL REFERENCES users(id),
            role TEXT NOT NULL CHECK (role IN ('ADMIN', 'PROJECT_ADMIN', 'MEMBER')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (project_id, user_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            created_by TEXT NOT NULL REFERENCES users(id),
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            title TEXT NOT NULL,
            description TEXT,
            assigned_to TEXT NOT NULL REFERENCES users(id),
            assigned_by TEXT NOT NULL REFERENCES users(id),
            status TEXT NOT NULL DEFAULT 'TODO' CHECK (status IN ('TODO', 'IN_PROGRESS', 'DONE')),
            attachments TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subtasks (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL REFERENCES tasks(id),
            title TEXT NOT NULL,
            is_completed INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_project_members_user ON project_members(user_id);
        CREATE INDEX IF NOT EXISTS idx_notes_project ON notes(project_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_subtasks_task ON subtasks(task_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::models::{
        CreateNoteRequest, CreateProjectRequest, CreateSubTaskRequest,
        CreateTaskRequest, CreateUserRequest, ProjectRole, TaskStatus, UpdateTaskRequest,
    };
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        (Repository::new(pool), temp_dir)
    }

    async fn user(repo: &Repository, name: &str) -> String {
        repo.create_user(&CreateUserRequest {
            email: format!("{}@example.com", name),
            username: name.to_string(),
            full_name: None,
        })
        .await
        .unwrap()
        .id
    }

    async fn project(repo: &Repository, owner: &str) -> String {
        repo.create_project(
            owner,
            &CreateProjectRequest {
                name: "Apollo".to_string(),
                description: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_timestamps_sort_chronologically() {
        let first = timestamp();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = timestamp();
        assert!(first < second);
        assert_eq!(first.len(), second.len());
    }

    #[tokio::test]
    async fn test_project_creation_adds_admin_membership() {
        let (repo, _dir) = repo().await;
        let alice = user(&repo, "alice").await;
        let project_id = project(&repo, &alice).await;

        let membership = repo.find_membership(&project_id, &alice).await.unwrap();
        assert_eq!(membership.unwrap().role, ProjectRole::Admin);
        assert_eq!(repo.list_members(&project_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_membership_conflicts() {
        let (repo, _dir) = repo().await;
        let alice = user(&repo, "alice").await;
        let bob = user(&repo, "bob").await;
        let project_id = project(&repo, &alice).await;

        repo.add_member(&project_id, &bob, ProjectRole::Member)
            .await
            .unwrap();
        let err = repo
            .add_member(&project_id, &bob, ProjectRole::ProjectAdmin)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        let members = repo.list_members(&project_id).await.unwrap();
        assert_eq!(members.len(), 2);
        let bob_entry = members.iter().find(|m| m.user.id == bob).unwrap();
        assert_eq!(bob_entry.role, ProjectRole::Member);
    }

    #[tokio::test]
    async fn test_admin_members_are_protected() {
        let (repo, _dir) = repo().await;
        let alice = user(&repo, "alice").await;
        let bob = user(&repo, "bob").await;
        let project_id = project(&repo, &alice).await;
        repo.add_member(&project_id, &bob, ProjectRole::Admin)
            .await
            .unwrap();

        let err = repo.remove_member(&project_id, &bob).await.unwrap_err();
        assert!(matches!(err, AppError::AdminProtected(_)));
        assert_eq!(repo.list_members(&project_id).await.unwrap().len(), 2);

        // Two admins: one may be demoted, the last may not.
        repo.set_member_role(&project_id, &bob, ProjectRole::Member)
            .await
            .unwrap();
        let err = repo
            .set_member_role(&project_id, &alice, ProjectRole::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AdminProtected(_)));

        repo.remove_member(&project_id, &bob).await.unwrap();
        assert!(repo
            .find_membership(&project_id, &bob)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_membership_is_not_found() {
        let (repo, _dir) = repo().await;
        let alice = user(&repo, "alice").await;
        let bob = user(&repo, "bob").await;
        let project_id = project(&repo, &alice).await;

        let err = repo.remove_member(&project_id, &bob).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = repo
            .set_member_role(&project_id, &bob, ProjectRole::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_project_delete_cascades() {
        let (repo, _dir) = repo().await;
        let alice = user(&repo, "alice").await;
        let project_id = project(&repo, &alice).await;

        let note = repo
            .create_note(
                &project_id,
                &alice,
                &CreateNoteRequest {
                    content: "kickoff".to_string(),
                },
            )
            .await
            .unwrap();
        let task = repo
            .create_task(
                &project_id,
                &alice,
                &CreateTaskRequest {
                    title: "Plan".to_string(),
                    description: None,
                    assigned_to: alice.clone(),
                    status: TaskStatus::Todo,
                    attachments: Vec::new(),
                },
            )
            .await
            .unwrap();
        let subtask = repo
            .create_subtask(
                &task.id,
                &alice,
                &CreateSubTaskRequest {
                    title: "Draft".to_string(),
                },
            )
            .await
            .unwrap();

        repo.delete_project(&project_id).await.unwrap();

        assert!(repo.get_project(&project_id).await.unwrap().is_none());
        assert!(repo
            .find_membership(&project_id, &alice)
            .await
            .unwrap()
            .is_none());
        assert!(repo.get_note(&project_id, &note.id).await.unwrap().is_none());
        assert!(repo.get_task(&project_id, &task.id).await.unwrap().is_none());
        assert!(repo
            .get_subtask(&project_id, &subtask.id)
            .await
            .unwrap()
            .is_none());
        assert!(repo.list_projects_for_user(&alice).await.unwrap().is_empty());

        let err = repo.delete_project(&project_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_partial_task_update_keeps_other_fields() {
        let (repo, _dir) = repo().await;
        let alice = user(&repo, "alice").await;
        let project_id = project(&repo, &alice).await;
        let task = repo
            .create_task(
                &project_id,
                &alice,
                &CreateTaskRequest {
                    title: "Ship".to_string(),
                    description: Some("v1".to_string()),
                    assigned_to: alice.clone(),
                    status: TaskStatus::Todo,
                    attachments: Vec::new(),
                },
            )
            .await
            .unwrap();

        let updated = repo
            .update_task(
                &project_id,
                &task.id,
                &UpdateTaskRequest {
                    title: None,
                    description: None,
                    assigned_to: None,
                    status: Some(TaskStatus::Done),
                    attachments: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(updated.title, "Ship");
        assert_eq!(updated.description.as_deref(), Some("v1"));
        assert_eq!(updated.assigned_to.id, alice);
        assert_eq!(updated.assigned_to.username, "alice");
        assert_eq!(updated.assigned_by.id, alice);

        let cleared = repo
            .update_task(
                &project_id,
                &task.id,
                &UpdateTaskRequest {
                    title: None,
                    description: Some(None),
                    assigned_to: None,
                    status: None,
                    attachments: None,
                },
            )
            .await
            .unwrap();
        assert!(cleared.description.is_none());
        assert_eq!(cleared.status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_subtask_scoped_to_its_project() {
        let (repo, _dir) = repo().await;
        let alice = user(&repo, "alice").await;
        let first = project(&repo, &alice).await;
        let second = project(&repo, &alice).await;
        let task = repo
            .create_task(
                &first,
                &alice,
                &CreateTaskRequest {
                    title: "Scoped".to_string(),
                    description: None,
                    assigned_to: alice.clone(),
                    status: TaskStatus::Todo,
                    attachments: Vec::new(),
                },
            )
            .await
            .unwrap();
        let subtask = repo
            .create_subtask(
                &task.id,
                &alice,
                &CreateSubTaskRequest {
                    title: "Step".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(repo.get_subtask(&first, &subtask.id).await.unwrap().is_some());
        assert!(repo
            .get_subtask(&second, &subtask.id)
            .await
            .unwrap()
            .is_none());
        let err = repo
            .delete_subtask(&second, &subtask.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_projects_counts_members() {
        let (repo, _dir) = repo().await;
        let alice = user(&repo, "alice").await;
        let bob = user(&repo, "bob").await;
        let project_id = project(&repo, &alice).await;
        repo.add_member(&project_id, &bob, ProjectRole::ProjectAdmin)
            .await
            .unwrap();

        let projects = repo.list_projects_for_user(&bob).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].project.id, project_id);
        assert_eq!(projects[0].project.members, 2);
        assert_eq!(projects[0].role, ProjectRole::ProjectAdmin);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_demotions_keep_one_admin() {
        let (repo, _dir) = repo().await;
        let alice = user(&repo, "alice").await;
        let bob = user(&repo, "bob").await;

        for _ in 0..10 {
            let project_id = project(&repo, &alice).await;
            repo.add_member(&project_id, &bob, ProjectRole::Admin)
                .await
                .unwrap();

            let (first, second) = tokio::join!(
                repo.set_member_role(&project_id, &alice, ProjectRole::Member),
                repo.set_member_role(&project_id, &bob, ProjectRole::Member),
            );

            let outcomes = [first, second];
            assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(outcomes
                .iter()
                .any(|r| matches!(r, Err(AppError::AdminProtected(_)))));

            let admins = repo
                .list_members(&project_id)
                .await
                .unwrap()
                .into_iter()
                .filter(|m| m.role == ProjectRole::Admin)
                .count();
            assert_eq!(admins, 1);
        }
    }

    #[tokio::test]
    async fn test_corrupt_attachments_are_reported() {
        let (repo, _dir) = repo().await;
        let alice = user(&repo, "alice").await;
        let project_id = project(&repo, &alice).await;
        let task = repo
            .create_task(
                &project_id,
                &alice,
                &CreateTaskRequest {
                    title: "Broken".to_string(),
                    description: None,
                    assigned_to: alice.clone(),
                    status: TaskStatus::Todo,
                    attachments: Vec::new(),
                },
            )
            .await
            .unwrap();

        sqlx::query("UPDATE tasks SET attachments = 'not json' WHERE id = ?")
            .bind(&task.id)
            .execute(&repo.pool)
            .await
            .unwrap();

        let err = repo.get_task(&project_id, &task.id).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
