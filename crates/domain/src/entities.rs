use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::OperationKind;

/// 一次用户发起的生成/编辑请求及其积分与状态生命周期
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub operation: OperationKind,
    pub prompt_text: String,
    /// 扣除的积分，创建时固定，之后不再变更；退款走账本，不回写此字段
    pub credits_used: i32,
    /// 生成服务分配的外部任务 id，派发成功前为空
    pub task_id: Option<String>,
    pub status: EditStatus,
    pub image_url: Option<String>,
    pub ai_processing_time_ms: Option<i64>,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 创建 Edit 行所需的字段（id 与时间戳由数据库生成）
#[derive(Debug, Clone)]
pub struct NewEdit {
    pub user_id: Uuid,
    pub operation: OperationKind,
    pub prompt_text: String,
    pub credits_used: i32,
    pub task_id: Option<String>,
    pub metadata: Option<SourceImageMetadata>,
}

/// 源图像元数据，随 Edit 行一并记录
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceImageMetadata {
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EditStatus {
    #[serde(rename = "queued")]
    Queued,
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl EditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditStatus::Queued => "queued",
            EditStatus::Pending => "pending",
            EditStatus::Completed => "completed",
            EditStatus::Failed => "failed",
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for EditStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for EditStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "queued" => Ok(EditStatus::Queued),
            "pending" => Ok(EditStatus::Pending),
            "completed" => Ok(EditStatus::Completed),
            "failed" => Ok(EditStatus::Failed),
            _ => Err(format!("Invalid edit status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for EditStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// 外部生成服务的关联记录，用于将异步回调解析回 Edit
///
/// 不变量：每个已派发的 Edit 恰有一条 ProviderTask；`task_id` 唯一。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTask {
    pub task_id: String,
    pub user_id: Uuid,
    pub edit_id: Uuid,
    pub status: TaskStatus,
    pub image_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProviderTask {
    pub task_id: String,
    pub user_id: Uuid,
    pub edit_id: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "error")]
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ready => "ready",
            TaskStatus::Error => "error",
        }
    }

    /// ready 与 error 均为终态，终态任务的重复回调必须幂等处理
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

impl sqlx::Type<sqlx::Postgres> for TaskStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TaskStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "ready" => Ok(TaskStatus::Ready),
            "error" => Ok(TaskStatus::Error),
            _ => Err(format!("Invalid task status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for TaskStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// 一次提示词优化运行的审计记录，只追加，写失败不阻断主流程
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationLog {
    pub user_id: Uuid,
    pub original_prompt: String,
    pub improved_prompt: String,
    pub avg_similarity: f64,
    pub matched_chunk_ids: Vec<String>,
    pub metadata: serde_json::Value,
}

/// 预置编辑模板（edit_model 操作按 id 查找激活的模板）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub default_prompt: String,
    pub active: bool,
}
