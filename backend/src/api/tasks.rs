//! Task and subtask API endpoints.
//!
//! Reads need any membership; writes need ADMIN or PROJECT_ADMIN. Subtasks are
//! always reached through their project, so a subtask under another project's
//! task is reported as missing.

use axum::extract::{Path, State};
use validator::Validate;

use super::{created, ok, ApiJson, ApiResult, GuardedJson};
use crate::auth::{authorize, Actor, RoleSet};
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{
    validate_attachments, Attachment, CreateSubTaskRequest, CreateTaskRequest, SubTask, Task,
    TaskDetail, UpdateSubTaskRequest, UpdateTaskRequest,
};
use crate::AppState;

// ==================== TASKS ====================

pub async fn list_tasks(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<String>,
) -> ApiResult<Vec<Task>> {
    authorize(&state.repo, &actor, &project_id, RoleSet::ANY_MEMBER).await?;

    let tasks = state.repo.list_tasks(&project_id).await?;
    ok(tasks, "Tasks fetched successfully")
}

pub async fn create_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<String>,
    body: GuardedJson<CreateTaskRequest>,
) -> ApiResult<Task> {
    authorize(&state.repo, &actor, &project_id, RoleSet::TASK_WRITERS).await?;
    let ApiJson(request) = body?;
    request.validate()?;
    check_assignee(&state.repo, &request.assigned_to).await?;
    check_attachments(&request.attachments)?;

    let task = state
        .repo
        .create_task(&project_id, actor.id(), &request)
        .await?;
    created(task, "Task created successfully")
}

/// GET /api/projects/{projectId}/tasks/{taskId} - Task with its subtasks.
pub async fn get_task(
    State(state): State<AppState>,
    actor: Actor,
    Path((project_id, task_id)): Path<(String, String)>,
) -> ApiResult<TaskDetail> {
    authorize(&state.repo, &actor, &project_id, RoleSet::ANY_MEMBER).await?;

    let task = find_task(&state.repo, &project_id, &task_id).await?;
    let subtasks = state.repo.list_subtasks(&task.id).await?;
    ok(TaskDetail { task, subtasks }, "Task fetched successfully")
}

pub async fn update_task(
    State(state): State<AppState>,
    actor: Actor,
    Path((project_id, task_id)): Path<(String, String)>,
    body: GuardedJson<UpdateTaskRequest>,
) -> ApiResult<Task> {
    authorize(&state.repo, &actor, &project_id, RoleSet::TASK_WRITERS).await?;
    let ApiJson(request) = body?;
    request.validate()?;
    if let Some(assigned_to) = &request.assigned_to {
        check_assignee(&state.repo, assigned_to).await?;
    }
    if let Some(attachments) = &request.attachments {
        check_attachments(attachments)?;
    }

    let task = state
        .repo
        .update_task(&project_id, &task_id, &request)
        .await?;
    ok(task, "Task updated successfully")
}

pub async fn delete_task(
    State(state): State<AppState>,
    actor: Actor,
    Path((project_id, task_id)): Path<(String, String)>,
) -> ApiResult<()> {
    authorize(&state.repo, &actor, &project_id, RoleSet::TASK_WRITERS).await?;

    state.repo.delete_task(&project_id, &task_id).await?;
    ok((), "Task deleted successfully")
}

// ==================== SUBTASKS ====================

/// POST /api/projects/{projectId}/tasks/{taskId}/subtasks
pub async fn create_subtask(
    State(state): State<AppState>,
    actor: Actor,
    Path((project_id, task_id)): Path<(String, String)>,
    body: GuardedJson<CreateSubTaskRequest>,
) -> ApiResult<SubTask> {
    authorize(&state.repo, &actor, &project_id, RoleSet::TASK_WRITERS).await?;
    let ApiJson(request) = body?;
    request.validate()?;

    let task = find_task(&state.repo, &project_id, &task_id).await?;
    let subtask = state
        .repo
        .create_subtask(&task.id, actor.id(), &request)
        .await?;
    created(subtask, "Subtask created successfully")
}

/// PUT /api/projects/{projectId}/subtasks/{subTaskId}
pub async fn update_subtask(
    State(state): State<AppState>,
    actor: Actor,
    Path((project_id, subtask_id)): Path<(String, String)>,
    body: GuardedJson<UpdateSubTaskRequest>,
) -> ApiResult<SubTask> {
    authorize(&state.repo, &actor, &project_id, RoleSet::TASK_WRITERS).await?;
    let ApiJson(request) = body?;
    request.validate()?;

    let subtask = state
        .repo
        .update_subtask(&project_id, &subtask_id, &request)
        .await?;
    ok(subtask, "Subtask updated successfully")
}

/// DELETE /api/projects/{projectId}/subtasks/{subTaskId}
pub async fn delete_subtask(
    State(state): State<AppState>,
    actor: Actor,
    Path((project_id, subtask_id)): Path<(String, String)>,
) -> ApiResult<()> {
    authorize(&state.repo, &actor, &project_id, RoleSet::TASK_WRITERS).await?;

    state.repo.delete_subtask(&project_id, &subtask_id).await?;
    ok((), "Subtask deleted successfully")
}

async fn find_task(repo: &Repository, project_id: &str, task_id: &str) -> Result<Task, AppError> {
    repo.get_task(project_id, task_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

async fn check_assignee(repo: &Repository, user_id: &str) -> Result<(), AppError> {
    if repo.user_exists(user_id).await? {
        Ok(())
    } else {
        Err(AppError::invalid_field("assignedTo", "Assigned user does not exist"))
    }
}

fn check_attachments(attachments: &[Attachment]) -> Result<(), AppError> {
    validate_attachments(attachments)
        .map_err(|message| AppError::invalid_field("attachments", message))
}
