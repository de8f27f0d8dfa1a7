//! Project membership API endpoints.

use axum::extract::{Path, State};

use super::{created, ok, ApiJson, ApiResult, GuardedJson};
use crate::auth::{authorize, Actor, RoleSet};
use crate::errors::AppError;
use crate::models::{AddMemberRequest, Membership, ProjectMember, UpdateMemberRoleRequest};
use crate::AppState;

/// GET /api/projects/{projectId}/member - Members ordered by join time.
pub async fn list_members(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<String>,
) -> ApiResult<Vec<ProjectMember>> {
    authorize(&state.repo, &actor, &project_id, RoleSet::ANY_MEMBER).await?;

    let members = state.repo.list_members(&project_id).await?;
    ok(members, "Project members fetched successfully")
}

/// POST /api/projects/{projectId}/member - Add a user, named by id or email.
pub async fn add_member(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<String>,
    body: GuardedJson<AddMemberRequest>,
) -> ApiResult<Membership> {
    authorize(&state.repo, &actor, &project_id, RoleSet::ADMIN_ONLY).await?;
    let ApiJson(request) = body?;

    let user_id = non_blank(request.user_id.as_deref());
    let email = non_blank(request.email.as_deref());

    let target = match (user_id, email) {
        (Some(id), _) => state.repo.get_user(id).await?,
        (None, Some(email)) => state.repo.find_user_by_email(email).await?,
        (None, None) => {
            return Err(AppError::invalid_field(
                "userId",
                "Either userId or email is required",
            ))
        }
    };
    let target = target.ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let membership = state
        .repo
        .add_member(&project_id, &target.id, request.role)
        .await?;
    created(membership, "Member added successfully")
}

/// PUT /api/projects/{projectId}/member/{userId} - Change a member's role.
pub async fn update_member_role(
    State(state): State<AppState>,
    actor: Actor,
    Path((project_id, user_id)): Path<(String, String)>,
    body: GuardedJson<UpdateMemberRoleRequest>,
) -> ApiResult<Membership> {
    authorize(&state.repo, &actor, &project_id, RoleSet::ADMIN_ONLY).await?;
    let ApiJson(request) = body?;

    let membership = state
        .repo
        .set_member_role(&project_id, &user_id, request.role)
        .await?;
    ok(membership, "Member role updated successfully")
}

/// DELETE /api/projects/{projectId}/member/{userId}
pub async fn remove_member(
    State(state): State<AppState>,
    actor: Actor,
    Path((project_id, user_id)): Path<(String, String)>,
) -> ApiResult<()> {
    authorize(&state.repo, &actor, &project_id, RoleSet::ADMIN_ONLY).await?;

    state.repo.remove_member(&project_id, &user_id).await?;
    ok((), "Member removed successfully")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
