use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use atelier_domain::entities::{Edit, NewEdit, NewProviderTask, SourceImageMetadata};
use atelier_domain::ports::{BackgroundRemovalPort, ImageProviderPort, ObjectStoragePort};
use atelier_domain::repositories::{EditRepository, ProviderTaskRepository};
use atelier_domain::value_objects::OperationKind;
use atelier_errors::{AtelierError, AtelierResult};
use atelier_imaging::decode_image_payload;

use crate::ledger::CreditLedgerGateway;
use crate::profiles::credit_cost;

/// 背景移除操作在 Edit 行上的固定提示词
const REMOVAL_PROMPT: &str = "remove_background";

/// 同步背景移除流程
///
/// 与异步生成不同：任务 id 在本进程生成（uuid），整个生命周期在
/// 一次请求内走完，不经过回调。失败路径与回调失败路径同构：
/// 退款、Edit 置 failed、Task 置 error。
#[derive(Clone)]
pub struct BackgroundRemovalFlow {
    removal: Arc<dyn BackgroundRemovalPort>,
    provider: Arc<dyn ImageProviderPort>,
    storage: Arc<dyn ObjectStoragePort>,
    tasks: Arc<dyn ProviderTaskRepository>,
    edits: Arc<dyn EditRepository>,
    ledger: CreditLedgerGateway,
}

impl BackgroundRemovalFlow {
    pub fn new(
        removal: Arc<dyn BackgroundRemovalPort>,
        provider: Arc<dyn ImageProviderPort>,
        storage: Arc<dyn ObjectStoragePort>,
        tasks: Arc<dyn ProviderTaskRepository>,
        edits: Arc<dyn EditRepository>,
        ledger: CreditLedgerGateway,
    ) -> Self {
        Self {
            removal,
            provider,
            storage,
            tasks,
            edits,
            ledger,
        }
    }

    /// 执行一次背景移除，成功返回任务 id
    #[instrument(skip(self, image_base64), fields(user_id = %user_id))]
    pub async fn remove_background(
        &self,
        user_id: Uuid,
        image_base64: &str,
    ) -> AtelierResult<String> {
        let payload = decode_image_payload(image_base64)?;
        let task_id = Uuid::new_v4().to_string();
        let credits = credit_cost(OperationKind::RemoveBackground, 1);

        let edit = self
            .ledger
            .charge_and_create_edit(NewEdit {
                user_id,
                operation: OperationKind::RemoveBackground,
                prompt_text: REMOVAL_PROMPT.to_string(),
                credits_used: credits,
                task_id: Some(task_id.clone()),
                metadata: Some(SourceImageMetadata {
                    file_size: Some(payload.bytes.len() as i64),
                    mime_type: Some(payload.mime_type.clone()),
                    width: None,
                    height: None,
                }),
            })
            .await?;

        if let Err(e) = self
            .tasks
            .insert_pending(&NewProviderTask {
                task_id: task_id.clone(),
                user_id,
                edit_id: edit.id,
            })
            .await
        {
            warn!(edit_id = %edit.id, error = %e, "任务登记失败，已扣款但任务未执行");
            return Err(AtelierError::persistence("任务登记失败"));
        }

        let started = Instant::now();
        let data_url = format!(
            "data:{};base64,{}",
            payload.mime_type,
            base64_of(&payload.bytes)
        );

        let output_url = match self.removal.remove_background(&data_url).await {
            Ok(url) => url,
            Err(e) => {
                self.settle_failure(&edit, &task_id, "背景移除服务调用失败").await;
                return Err(e);
            }
        };

        let bytes = match self.provider.fetch_asset(&output_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.settle_failure(&edit, &task_id, "无法下载生成结果").await;
                return Err(e);
            }
        };

        let path = format!("default/{}_{}.png", Utc::now().timestamp(), task_id);
        if let Err(e) = self.storage.upload(&path, &bytes, "image/png", true).await {
            self.settle_failure(&edit, &task_id, "保存图像失败").await;
            return Err(e);
        }

        let public_url = self.storage.public_url(&path);
        self.tasks.mark_ready(&task_id, &public_url).await?;

        let elapsed_ms = started.elapsed().as_millis() as i64;
        self.edits
            .mark_completed(edit.id, &public_url, elapsed_ms)
            .await?;
        info!(edit_id = %edit.id, task_id = %task_id, elapsed_ms, "背景移除完成");
        Ok(task_id)
    }

    /// 扣款之后的失败收束：退款、Edit 置 failed、Task 置 error
    async fn settle_failure(&self, edit: &Edit, task_id: &str, message: &str) {
        self.ledger
            .refund_and_fail(edit.user_id, edit.credits_used, edit.id)
            .await;
        if let Err(e) = self.tasks.mark_error(task_id, message).await {
            warn!(task_id = %task_id, error = %e, "标记任务失败状态时出错");
        }
    }
}

fn base64_of(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    STANDARD.encode(bytes)
}
