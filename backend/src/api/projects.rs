//! Project API endpoints.

use axum::extract::{Path, State};
use validator::Validate;

use super::{created, ok, ApiJson, ApiResult, GuardedJson};
use crate::auth::{authorize, Actor, RoleSet};
use crate::models::{CreateProjectRequest, Project, UpdateProjectRequest, UserProject};
use crate::AppState;

/// GET /api/projects - Projects the caller belongs to, with the caller's role.
pub async fn list_projects(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Vec<UserProject>> {
    let projects = state.repo.list_projects_for_user(actor.id()).await?;
    ok(projects, "Projects fetched successfully")
}

/// POST /api/projects - Create a project; the caller becomes its ADMIN.
pub async fn create_project(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(request): ApiJson<CreateProjectRequest>,
) -> ApiResult<Project> {
    let request = request.normalized();
    request.validate()?;

    let project = state.repo.create_project(actor.id(), &request).await?;
    created(project, "Project created successfully")
}

/// GET /api/projects/{projectId}
pub async fn get_project(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<String>,
) -> ApiResult<Project> {
    let access = authorize(&state.repo, &actor, &project_id, RoleSet::ANY_MEMBER).await?;
    ok(access.project, "Project fetched successfully")
}

/// PUT /api/projects/{projectId}
pub async fn update_project(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<String>,
    body: GuardedJson<UpdateProjectRequest>,
) -> ApiResult<Project> {
    authorize(&state.repo, &actor, &project_id, RoleSet::ADMIN_ONLY).await?;
    let ApiJson(request) = body?;

    let request = request.normalized();
    request.validate()?;

    let project = state.repo.update_project(&project_id, &request).await?;
    ok(project, "Project updated successfully")
}

/// DELETE /api/projects/{projectId} - Removes the project and everything under it.
pub async fn delete_project(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<String>,
) -> ApiResult<Project> {
    let access = authorize(&state.repo, &actor, &project_id, RoleSet::ADMIN_ONLY).await?;

    state.repo.delete_project(&project_id).await?;
    tracing::info!(
        project_id = %project_id,
        user_id = %actor.id(),
        role = %access.role,
        "Project removed by member"
    );
    ok(access.project, "Project deleted successfully")
}
