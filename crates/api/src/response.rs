use axum::{response::IntoResponse, Json};
use serde::Serialize;

/// 提交成功的统一响应体：调用方凭 task_id 关联后续回调结果
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResponse {
    pub task_id: String,
}

impl SubmissionResponse {
    pub fn new(task_id: String) -> Self {
        Self { task_id }
    }
}

impl IntoResponse for SubmissionResponse {
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}
