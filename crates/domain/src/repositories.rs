//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{Edit, NewEdit, NewProviderTask, OptimizationLog, ProviderTask, Template};
use atelier_errors::AtelierResult;

/// Edit 仓储抽象
#[async_trait]
pub trait EditRepository: Send + Sync {
    async fn create(&self, edit: &NewEdit) -> AtelierResult<Edit>;
    async fn find_by_id(&self, id: Uuid) -> AtelierResult<Option<Edit>>;
    /// 补偿删除：仅在扣款失败时调用
    async fn delete(&self, id: Uuid) -> AtelierResult<bool>;
    async fn set_task_id(&self, id: Uuid, task_id: &str) -> AtelierResult<()>;
    async fn mark_failed(&self, id: Uuid) -> AtelierResult<()>;
    async fn mark_completed(
        &self,
        id: Uuid,
        image_url: &str,
        ai_processing_time_ms: i64,
    ) -> AtelierResult<()>;
}

/// ProviderTask 仓储抽象，回调一律按外部 task_id 查找
#[async_trait]
pub trait ProviderTaskRepository: Send + Sync {
    async fn insert_pending(&self, task: &NewProviderTask) -> AtelierResult<ProviderTask>;
    async fn find_by_task_id(&self, task_id: &str) -> AtelierResult<Option<ProviderTask>>;
    async fn mark_ready(&self, task_id: &str, image_url: &str) -> AtelierResult<()>;
    async fn mark_error(&self, task_id: &str, error_message: &str) -> AtelierResult<()>;
}

/// 提示词优化审计日志仓储抽象
#[async_trait]
pub trait OptimizationLogRepository: Send + Sync {
    async fn insert(&self, entry: &OptimizationLog) -> AtelierResult<()>;
}

/// 编辑模板仓储抽象
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// 仅返回处于激活状态的模板
    async fn find_active(&self, id: Uuid) -> AtelierResult<Option<Template>>;
}
