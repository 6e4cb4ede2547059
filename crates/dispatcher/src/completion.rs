use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use atelier_domain::entities::ProviderTask;
use atelier_domain::ports::{ImageProviderPort, LedgerPort, ObjectStoragePort};
use atelier_domain::repositories::{EditRepository, ProviderTaskRepository};
use atelier_domain::value_objects::ProviderStatus;
use atelier_errors::AtelierResult;

/// 回调驱动的完成状态机
///
/// 回调仅以外部任务 id 为键；已处于终态的任务直接幂等确认，
/// 不会二次退款或二次上传。所有业务性结局（成功、失败、忽略）
/// 都以 `Ok(())` 返回由端点确认 200，仅内部故障向上传播。
#[derive(Clone)]
pub struct CompletionHandler {
    tasks: Arc<dyn ProviderTaskRepository>,
    edits: Arc<dyn EditRepository>,
    ledger: Arc<dyn LedgerPort>,
    provider: Arc<dyn ImageProviderPort>,
    storage: Arc<dyn ObjectStoragePort>,
}

impl CompletionHandler {
    pub fn new(
        tasks: Arc<dyn ProviderTaskRepository>,
        edits: Arc<dyn EditRepository>,
        ledger: Arc<dyn LedgerPort>,
        provider: Arc<dyn ImageProviderPort>,
        storage: Arc<dyn ObjectStoragePort>,
    ) -> Self {
        Self {
            tasks,
            edits,
            ledger,
            provider,
            storage,
        }
    }

    /// 处理一次回调
    #[instrument(skip(self, sample), fields(task_id = %task_id))]
    pub async fn handle(
        &self,
        task_id: &str,
        status: ProviderStatus,
        sample: Option<String>,
    ) -> AtelierResult<()> {
        let Some(task) = self.tasks.find_by_task_id(task_id).await? else {
            warn!("回调引用的任务不存在，直接确认");
            return Ok(());
        };

        if task.status.is_terminal() {
            info!(status = task.status.as_str(), "任务已处于终态，幂等确认重复回调");
            return Ok(());
        }

        match status {
            ProviderStatus::Other(raw) => {
                info!(raw = %raw, "未识别的回调状态，按中间态忽略");
                Ok(())
            }
            ProviderStatus::ContentModerated | ProviderStatus::RequestModerated => {
                self.fail_task(&task, "内容被服务方审核拦截").await
            }
            ProviderStatus::Error => self.fail_task(&task, "图像生成失败").await,
            ProviderStatus::Ready => self.complete_task(&task, sample).await,
        }
    }

    async fn complete_task(&self, task: &ProviderTask, sample: Option<String>) -> AtelierResult<()> {
        let Some(sample_url) = sample.filter(|s| !s.is_empty()) else {
            warn!(task_id = %task.task_id, "Ready 回调缺少结果地址");
            return self.fail_task(task, "服务返回结果无效").await;
        };

        let bytes = match self.provider.fetch_asset(&sample_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(task_id = %task.task_id, error = %e, "下载生成结果失败");
                return self.fail_task(task, "无法下载生成结果").await;
            }
        };

        let path = format!("default/{}_{}.jpeg", Utc::now().timestamp(), task.task_id);
        if let Err(e) = self.storage.upload(&path, &bytes, "image/jpeg", true).await {
            warn!(task_id = %task.task_id, error = %e, "上传生成结果失败");
            return self.fail_task(task, "保存图像失败").await;
        }

        let public_url = self.storage.public_url(&path);
        let elapsed_ms = (Utc::now() - task.created_at).num_milliseconds().max(0);

        // 先落 Edit，最后才把 Task 置为终态：终态是幂等确认的闸门，
        // 中途任一步失败时任务仍处 pending，服务方重投会重跑整条完成路径
        // （上传为 upsert，重复执行收敛到同一结果），Edit 不会滞留在 pending。
        self.edits
            .mark_completed(task.edit_id, &public_url, elapsed_ms)
            .await?;
        self.tasks.mark_ready(&task.task_id, &public_url).await?;

        info!(task_id = %task.task_id, edit_id = %task.edit_id, elapsed_ms, "生成任务完成");
        Ok(())
    }

    /// 失败收束：退款（积分为正时）、Edit 置 failed、Task 置 error
    async fn fail_task(&self, task: &ProviderTask, message: &str) -> AtelierResult<()> {
        if let Some(edit) = self.edits.find_by_id(task.edit_id).await? {
            if edit.credits_used > 0 {
                if let Err(e) = self
                    .ledger
                    .refund(task.user_id, edit.credits_used, task.edit_id)
                    .await
                {
                    warn!(edit_id = %task.edit_id, error = %e, "回调失败路径退款失败，需人工核对");
                }
            }
            self.edits.mark_failed(task.edit_id).await?;
        }
        self.tasks.mark_error(&task.task_id, message).await?;
        info!(task_id = %task.task_id, message, "生成任务以失败收束");
        Ok(())
    }
}
