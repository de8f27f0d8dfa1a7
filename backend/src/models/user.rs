//! User identity model.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A registered user. Other records reference users by id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub created_at: String,
}

/// Minimal public profile joined into membership listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Request body for registering a user.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    #[validate(length(
        min = 3,
        max = 64,
        message = "Username must be between 3 and 64 characters long"
    ))]
    pub username: String,
    #[serde(default)]
    #[validate(length(max = 120, message = "Full name must be at most 120 characters"))]
    pub full_name: Option<String>,
}

impl CreateUserRequest {
    /// Trim surrounding whitespace and drop an empty full name.
    pub fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_lowercase();
        self.username = self.username.trim().to_string();
        self.full_name = self
            .full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        self
    }
}
