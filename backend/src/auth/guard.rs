//! Project-scoped authorization.
//!
//! Every project resource access goes through [`authorize`]: the project must
//! exist, the actor must be a member, and the actor's role must be in the
//! required set. Nothing is cached; role changes apply on the next request.

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{Membership, Project, ProjectRole};

use super::Actor;

/// Set of roles admitted by an operation.
#[derive(Debug, Clone, Copy)]
pub struct RoleSet(&'static [ProjectRole]);

impl RoleSet {
    /// Read-level access.
    pub const ANY_MEMBER: RoleSet = RoleSet(&[
        ProjectRole::Admin,
        ProjectRole::ProjectAdmin,
        ProjectRole::Member,
    ]);

    /// Project settings, notes and member management.
    pub const ADMIN_ONLY: RoleSet = RoleSet(&[ProjectRole::Admin]);

    /// Task and subtask writes.
    pub const TASK_WRITERS: RoleSet = RoleSet(&[ProjectRole::Admin, ProjectRole::ProjectAdmin]);

    pub fn admits(&self, role: ProjectRole) -> bool {
        self.0.contains(&role)
    }
}

/// Outcome of a successful check: the loaded project and the actor's role in it.
#[derive(Debug, Clone)]
pub struct ProjectAccess {
    pub project: Project,
    pub role: ProjectRole,
}

/// Decide from an already-loaded membership.
pub fn check_membership(
    membership: Option<&Membership>,
    required: RoleSet,
) -> Result<ProjectRole, AppError> {
    match membership {
        Some(m) if required.admits(m.role) => Ok(m.role),
        Some(_) => Err(AppError::Forbidden(
            "Your role does not permit this action".to_string(),
        )),
        None => Err(AppError::Forbidden(
            "You are not a member of this project".to_string(),
        )),
    }
}

/// Resolve the actor's role in a project and require it to be in `required`.
///
/// Fails with `NotFound` if the project does not exist, checked before membership,
/// and `Forbidden` if the actor is not a member or holds a role outside the set.
pub async fn authorize(
    repo: &Repository,
    actor: &Actor,
    project_id: &str,
    required: RoleSet,
) -> Result<ProjectAccess, AppError> {
    let project = repo
        .get_project(project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {} not found", project_id)))?;

    let membership = repo.find_membership(project_id, actor.id()).await?;
    let role = check_membership(membership.as_ref(), required).inspect_err(|_| {
        tracing::debug!(
            project_id = %project_id,
            user_id = %actor.id(),
            role = ?membership.as_ref().map(|m| m.role),
            "Project access denied"
        );
    })?;

    Ok(ProjectAccess { project, role })
}
