use axum::extract::{Json, State};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use atelier_domain::value_objects::ProviderStatus;

use crate::{
    error::{ApiError, ApiResult},
    routes::AppState,
};

/// 生成服务回调载荷
///
/// 仅信任 `id`、`status`、`result.sample` 三个字段，其余内容忽略。
#[derive(Debug, Deserialize)]
pub struct ProviderCallback {
    pub id: Option<String>,
    pub status: Option<String>,
    pub result: Option<CallbackResult>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackResult {
    pub sample: Option<String>,
}

/// 回调入口
///
/// 业务性结局（成功、失败、重复、未知任务）一律 200 确认，
/// 阻止服务方无意义重试；只有内部故障返回 5xx 换取重投。
pub async fn provider_callback(
    State(state): State<AppState>,
    Json(body): Json<ProviderCallback>,
) -> ApiResult<Json<Value>> {
    let task_id = body
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("回调缺少任务 id".to_string()))?;

    let status = ProviderStatus::parse(body.status.as_deref().unwrap_or(""));
    let sample = body.result.and_then(|result| result.sample);

    info!(task_id = %task_id, "收到生成服务回调");
    state.completion.handle(&task_id, status, sample).await?;
    Ok(Json(json!({ "success": true })))
}
