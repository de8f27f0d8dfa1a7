//! Task and subtask models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::UserSummary;

/// Task status. Any value may follow any other; there is no workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown task status '{}'", s))
    }
}

/// File reference attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub assigned_to: UserSummary,
    pub assigned_by: UserSummary,
    pub status: TaskStatus,
    pub attachments: Vec<Attachment>,
    pub created_at: String,
    pub updated_at: String,
}

/// Task together with its subtasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<SubTask>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Assigned user is required"))]
    pub assigned_to: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Partial task update. Absent fields keep their stored value; an explicit
/// `null` description clears it.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Title must not be empty"))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    #[validate(length(min = 1, message = "Assigned user must not be empty"))]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub is_completed: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubTaskRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Title must not be empty"))]
    pub title: Option<String>,
    #[serde(default)]
    pub is_completed: Option<bool>,
}

/// Reject attachments without a usable URL.
pub fn validate_attachments(attachments: &[Attachment]) -> Result<(), String> {
    match attachments.iter().position(|a| a.url.trim().is_empty()) {
        Some(index) => Err(format!("Attachment {} is missing a url", index)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        for status in TaskStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_bogus_status_rejected_at_boundary() {
        let result = serde_json::from_str::<UpdateTaskRequest>(r#"{"status":"BOGUS"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_update_leaves_absent_fields_empty() {
        let request: UpdateTaskRequest = serde_json::from_str(r#"{"status":"DONE"}"#).unwrap();
        assert_eq!(request.status, Some(TaskStatus::Done));
        assert!(request.title.is_none());
        assert!(request.description.is_none());
        assert!(request.assigned_to.is_none());
        assert!(request.attachments.is_none());
    }

    #[test]
    fn test_null_description_clears() {
        let request: UpdateTaskRequest = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(request.description, Some(None));

        let request: UpdateTaskRequest =
            serde_json::from_str(r#"{"description":"Updated"}"#).unwrap();
        assert_eq!(request.description, Some(Some("Updated".to_string())));
    }

    #[test]
    fn test_create_defaults_to_todo() {
        let request: CreateTaskRequest =
            serde_json::from_str(r#"{"title":"Write docs","assignedTo":"u1"}"#).unwrap();
        assert_eq!(request.status, TaskStatus::Todo);
        assert!(request.attachments.is_empty());
    }

    #[test]
    fn test_validate_attachments() {
        let ok = Attachment {
            url: "https://files.example.com/a.png".to_string(),
            mime_type: Some("image/png".to_string()),
            size: Some(42),
        };
        let blank = Attachment {
            url: "  ".to_string(),
            mime_type: None,
            size: None,
        };
        assert!(validate_attachments(&[ok.clone()]).is_ok());
        assert!(validate_attachments(&[ok, blank]).is_err());
    }
}
