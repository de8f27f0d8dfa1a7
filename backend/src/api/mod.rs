//! REST API module.
//!
//! Handlers resolve the calling [`Actor`](crate::auth::Actor), run the project
//! guard where a project is in the path, and wrap results in the success envelope.

mod members;
mod notes;
mod projects;
mod tasks;
mod users;

pub use members::*;
pub use notes::*;
pub use projects::*;
pub use tasks::*;
pub use users::*;

use axum::{
    extract::FromRequest,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: true,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// 200 response.
pub fn ok<T: Serialize>(data: T, message: &str) -> ApiResult<T> {
    Ok(ApiResponse::new(StatusCode::OK, data, message))
}

/// 201 response.
pub fn created<T: Serialize>(data: T, message: &str) -> ApiResult<T> {
    Ok(ApiResponse::new(StatusCode::CREATED, data, message))
}

/// JSON body extractor whose rejections use the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Body whose parse error is held back until the handler has run the project
/// guard, so callers without access never learn anything from body validation.
pub type GuardedJson<T> = Result<ApiJson<T>, AppError>;
