//! Project note API endpoints. Any member reads; only ADMIN writes.

use axum::extract::{Path, State};
use validator::Validate;

use super::{created, ok, ApiJson, ApiResult, GuardedJson};
use crate::auth::{authorize, Actor, RoleSet};
use crate::errors::AppError;
use crate::models::{CreateNoteRequest, Note, UpdateNoteRequest};
use crate::AppState;

pub async fn list_notes(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<String>,
) -> ApiResult<Vec<Note>> {
    authorize(&state.repo, &actor, &project_id, RoleSet::ANY_MEMBER).await?;

    let notes = state.repo.list_notes(&project_id).await?;
    ok(notes, "Notes fetched successfully")
}

pub async fn create_note(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<String>,
    body: GuardedJson<CreateNoteRequest>,
) -> ApiResult<Note> {
    authorize(&state.repo, &actor, &project_id, RoleSet::ADMIN_ONLY).await?;
    let ApiJson(request) = body?;
    request.validate()?;

    let note = state
        .repo
        .create_note(&project_id, actor.id(), &request)
        .await?;
    created(note, "Note created successfully")
}

pub async fn get_note(
    State(state): State<AppState>,
    actor: Actor,
    Path((project_id, note_id)): Path<(String, String)>,
) -> ApiResult<Note> {
    authorize(&state.repo, &actor, &project_id, RoleSet::ANY_MEMBER).await?;

    let note = state
        .repo
        .get_note(&project_id, &note_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Note not found".to_string()))?;
    ok(note, "Note fetched successfully")
}

pub async fn update_note(
    State(state): State<AppState>,
    actor: Actor,
    Path((project_id, note_id)): Path<(String, String)>,
    body: GuardedJson<UpdateNoteRequest>,
) -> ApiResult<Note> {
    authorize(&state.repo, &actor, &project_id, RoleSet::ADMIN_ONLY).await?;
    let ApiJson(request) = body?;
    request.validate()?;

    let note = state
        .repo
        .update_note(&project_id, &note_id, &request)
        .await?;
    ok(note, "Note updated successfully")
}

pub async fn delete_note(
    State(state): State<AppState>,
    actor: Actor,
    Path((project_id, note_id)): Path<(String, String)>,
) -> ApiResult<()> {
    authorize(&state.repo, &actor, &project_id, RoleSet::ADMIN_ONLY).await?;

    state.repo.delete_note(&project_id, &note_id).await?;
    ok((), "Note deleted successfully")
}
