//! User API endpoints.

use axum::extract::State;
use validator::Validate;

use super::{created, ok, ApiJson, ApiResult};
use crate::auth::Actor;
use crate::errors::AppError;
use crate::models::{CreateUserRequest, User};
use crate::AppState;

/// POST /api/users - Register a user. Guarded by the API key only.
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<User> {
    let request = request.normalized();
    request.validate()?;

    if request.username != request.username.to_lowercase() {
        return Err(AppError::invalid_field("username", "Username must be lowercase"));
    }

    let user = state.repo.create_user(&request).await?;
    created(user, "User registered successfully")
}

/// GET /api/users/me - The calling user.
pub async fn get_current_user(actor: Actor) -> ApiResult<User> {
    ok(actor.user, "Current user fetched successfully")
}
