use std::sync::Arc;

use tracing::{error, info, instrument};

use atelier_domain::entities::{Edit, NewProviderTask};
use atelier_domain::ports::{ImageProviderPort, ProviderSubmission, SubmitOutcome};
use atelier_domain::repositories::{EditRepository, ProviderTaskRepository};
use atelier_errors::{AtelierError, AtelierResult};

/// 任务派发器：对异步生成服务的单次提交
///
/// 不做自动重试：提交失败由调用方退款并标记失败，由用户决定是否重试。
#[derive(Clone)]
pub struct JobDispatcher {
    provider: Arc<dyn ImageProviderPort>,
    edits: Arc<dyn EditRepository>,
    tasks: Arc<dyn ProviderTaskRepository>,
    webhook_url: String,
}

impl JobDispatcher {
    pub fn new(
        provider: Arc<dyn ImageProviderPort>,
        edits: Arc<dyn EditRepository>,
        tasks: Arc<dyn ProviderTaskRepository>,
        webhook_url: String,
    ) -> Self {
        Self {
            provider,
            edits,
            tasks,
            webhook_url,
        }
    }

    /// 提交一次生成任务，成功返回外部任务 id
    ///
    /// 受理后依次回写 `Edit.task_id` 并插入 pending 关联记录；
    /// 关联记录插入失败返回 `PersistenceError` —— 此时生成任务已在
    /// 服务方运行但回调将无从解析，属于已记录的对账缺口，不退款。
    #[instrument(skip(self, edit, prompt, images), fields(edit_id = %edit.id, images = images.len()))]
    pub async fn dispatch(
        &self,
        edit: &Edit,
        prompt: &str,
        images: Vec<String>,
        width: u32,
        height: u32,
    ) -> AtelierResult<String> {
        let submission = ProviderSubmission {
            prompt: prompt.to_string(),
            images,
            width,
            height,
            webhook_url: self.webhook_url.clone(),
        };

        match self.provider.submit(&submission).await? {
            SubmitOutcome::Accepted { task_id } => {
                self.edits.set_task_id(edit.id, &task_id).await?;
                if let Err(e) = self
                    .tasks
                    .insert_pending(&NewProviderTask {
                        task_id: task_id.clone(),
                        user_id: edit.user_id,
                        edit_id: edit.id,
                    })
                    .await
                {
                    error!(edit_id = %edit.id, task_id = %task_id, error = %e,
                        "关联记录插入失败，生成任务已受理但回调无法解析");
                    return Err(AtelierError::persistence("任务登记失败"));
                }
                info!(edit_id = %edit.id, task_id = %task_id, "生成任务已受理");
                Ok(task_id)
            }
            SubmitOutcome::MissingTaskId => Err(AtelierError::MalformedUpstreamResponse),
            SubmitOutcome::Rejected { status, body } => Err(AtelierError::ProviderRejected {
                status,
                message: rejection_message(status, &body),
            }),
        }
    }
}

/// 将生成服务的拒绝状态映射为面向用户的消息
fn rejection_message(status: u16, body: &str) -> String {
    match status {
        401 => "生成服务凭证无效".to_string(),
        402 => "生成服务账户额度不足".to_string(),
        422 => {
            if body.is_empty() {
                "请求数据无效：请检查提示词与图像".to_string()
            } else {
                format!("请求数据无效: {body}")
            }
        }
        429 => "请求过于频繁，请稍后再试".to_string(),
        _ => "生成服务暂时不可用".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_domain::entities::{EditStatus, TaskStatus};
    use atelier_testing_utils::{EditBuilder, FakeProvider, MemoryEditRepository, MemoryProviderTaskRepository};

    fn dispatcher(
        provider: &FakeProvider,
        edits: &MemoryEditRepository,
        tasks: &MemoryProviderTaskRepository,
    ) -> JobDispatcher {
        JobDispatcher::new(
            Arc::new(provider.clone()),
            Arc::new(edits.clone()),
            Arc::new(tasks.clone()),
            "https://example.test/webhooks/provider".to_string(),
        )
    }

    #[tokio::test]
    async fn test_accepted_submission_registers_task() {
        let provider = FakeProvider::accepting("task-123");
        let edits = MemoryEditRepository::with_edits(vec![EditBuilder::new().build()]);
        let edit = edits.all().pop().unwrap();
        let tasks = MemoryProviderTaskRepository::new();

        let task_id = dispatcher(&provider, &edits, &tasks)
            .dispatch(&edit, "prompt", vec!["img".to_string()], 1024, 768)
            .await
            .unwrap();

        assert_eq!(task_id, "task-123");
        let updated = edits.get(edit.id).unwrap();
        assert_eq!(updated.task_id.as_deref(), Some("task-123"));
        assert_eq!(updated.status, EditStatus::Pending);
        assert_eq!(tasks.get("task-123").unwrap().status, TaskStatus::Pending);

        let sent = provider.submissions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].width, 1024);
        assert_eq!(sent[0].webhook_url, "https://example.test/webhooks/provider");
    }

    #[tokio::test]
    async fn test_missing_task_id_is_malformed_response() {
        let provider = FakeProvider::new();
        provider.push_outcome(SubmitOutcome::MissingTaskId);
        let edits = MemoryEditRepository::with_edits(vec![EditBuilder::new().build()]);
        let edit = edits.all().pop().unwrap();
        let tasks = MemoryProviderTaskRepository::new();

        let err = dispatcher(&provider, &edits, &tasks)
            .dispatch(&edit, "prompt", vec![], 1024, 768)
            .await
            .unwrap_err();
        assert!(matches!(err, AtelierError::MalformedUpstreamResponse));
        assert_eq!(tasks.count(), 0);
    }

    #[tokio::test]
    async fn test_rejection_statuses_map_to_messages() {
        for (status, needle) in [
            (401u16, "凭证"),
            (402, "额度"),
            (422, "请求数据无效"),
            (429, "稍后再试"),
            (503, "暂时不可用"),
        ] {
            let provider = FakeProvider::new();
            provider.push_outcome(SubmitOutcome::Rejected {
                status,
                body: String::new(),
            });
            let edits = MemoryEditRepository::with_edits(vec![EditBuilder::new().build()]);
            let edit = edits.all().pop().unwrap();
            let tasks = MemoryProviderTaskRepository::new();

            let err = dispatcher(&provider, &edits, &tasks)
                .dispatch(&edit, "prompt", vec![], 1024, 768)
                .await
                .unwrap_err();
            match err {
                AtelierError::ProviderRejected {
                    status: got,
                    message,
                } => {
                    assert_eq!(got, status);
                    assert!(message.contains(needle), "{status}: {message}");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_task_insert_failure_is_persistence_error() {
        let provider = FakeProvider::accepting("task-9");
        let edits = MemoryEditRepository::with_edits(vec![EditBuilder::new().build()]);
        let edit = edits.all().pop().unwrap();
        let tasks = MemoryProviderTaskRepository::new();
        tasks.fail_next_insert();

        let err = dispatcher(&provider, &edits, &tasks)
            .dispatch(&edit, "prompt", vec![], 1024, 768)
            .await
            .unwrap_err();
        assert!(matches!(err, AtelierError::PersistenceError(_)));
    }
}
