//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity. Operations are
//! split across this module and its siblings by resource; this file holds the
//! repository handle and the identity store.

use sqlx::{Row, SqlitePool};

use super::timestamp;
use crate::errors::AppError;
use crate::models::{CreateUserRequest, User};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== USER OPERATIONS ====================

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, email, username, full_name, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Get a user by email address.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, email, username, full_name, created_at FROM users WHERE email = ?",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Whether a user with this ID exists.
    pub async fn user_exists(&self, id: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Register a new user. Email and username must both be unused.
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User, AppError> {
        let taken = sqlx::query("SELECT 1 FROM users WHERE email = ? OR username = ?")
            .bind(&request.email)
            .bind(&request.username)
            .fetch_optional(&self.pool)
            .await?;

        if taken.is_some() {
            return Err(AppError::Conflict(
                "A user with this email or username already exists".to_string(),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();

        sqlx::query(
            "INSERT INTO users (id, email, username, full_name, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.email)
        .bind(&request.username)
        .bind(&request.full_name)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::info!(user_id = %id, username = %request.username, "User registered");

        Ok(User {
            id,
            email: request.email.clone(),
            username: request.username.clone(),
            full_name: request.full_name.clone(),
            created_at: now,
        })
    }
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        created_at: row.get("created_at"),
    }
}
