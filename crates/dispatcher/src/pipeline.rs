use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use atelier_domain::entities::{Edit, NewEdit, OptimizationLog, SourceImageMetadata};
use atelier_domain::repositories::{OptimizationLogRepository, TemplateRepository};
use atelier_domain::value_objects::{OperationKind, OptimizedPrompt};
use atelier_errors::{AtelierError, AtelierResult};
use atelier_imaging::{
    decode_image_batch, decode_image_payload, normalize_to_budget, ImagePayload, NormalizedImage,
};
use atelier_optimizer::{PromptOptimizer, ReferenceContext};

use crate::dispatch::JobDispatcher;
use crate::ledger::CreditLedgerGateway;
use crate::profiles::{credit_cost, OperationProfile};

/// 文生图请求（无参考图，可携带外部提供的图像上下文）
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub user_prompt: String,
    pub image_context: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// 单图编辑请求
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub user_prompt: String,
    pub image_base64: String,
}

/// 模板编辑请求：提示词来自预置模板而非优化管道
#[derive(Debug, Clone)]
pub struct TemplateRequest {
    pub template_id: Uuid,
    pub image_base64: String,
}

/// 多参考图合成请求
#[derive(Debug, Clone)]
pub struct MultiRequest {
    pub user_prompt: String,
    pub images: Vec<String>,
    pub width: u32,
    pub height: u32,
}

/// 参数化提交管道
///
/// 各操作共享同一套编排：图像归一化 → 提示词确定 → 扣款建行 → 派发。
/// 差异全部收敛到 [`OperationProfile`] 与各方法的提示词来源上。
/// 扣款之前的一切失败不触碰账本；派发失败退款并标记 Edit 失败。
#[derive(Clone)]
pub struct SubmissionPipeline {
    optimizer: Arc<PromptOptimizer>,
    ledger: CreditLedgerGateway,
    dispatcher: JobDispatcher,
    logs: Arc<dyn OptimizationLogRepository>,
    templates: Arc<dyn TemplateRepository>,
}

impl SubmissionPipeline {
    pub fn new(
        optimizer: Arc<PromptOptimizer>,
        ledger: CreditLedgerGateway,
        dispatcher: JobDispatcher,
        logs: Arc<dyn OptimizationLogRepository>,
        templates: Arc<dyn TemplateRepository>,
    ) -> Self {
        Self {
            optimizer,
            ledger,
            dispatcher,
            logs,
            templates,
        }
    }

    /// 文生图：优化提示词后直接派发，无参考图
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn generate(&self, user_id: Uuid, request: GenerateRequest) -> AtelierResult<String> {
        let profile = OperationProfile::text_to_image();
        let optimized = self
            .optimizer
            .optimize(
                &request.user_prompt,
                &ReferenceContext::Single {
                    image_context: request.image_context.clone(),
                },
            )
            .await?;
        self.audit_log(
            user_id,
            &request.user_prompt,
            &optimized,
            profile.kind,
            request.image_context.is_some(),
        )
        .await;

        let edit = self
            .ledger
            .charge_and_create_edit(NewEdit {
                user_id,
                operation: profile.kind,
                prompt_text: optimized.improved_prompt.clone(),
                credits_used: credit_cost(profile.kind, 0),
                task_id: None,
                metadata: None,
            })
            .await?;

        self.dispatch_or_refund(
            &edit,
            &optimized.improved_prompt,
            Vec::new(),
            request.width,
            request.height,
        )
        .await
    }

    /// 单图编辑：归一化 → 看图描述 → 优化 → 扣款 → 派发
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn edit(&self, user_id: Uuid, request: EditRequest) -> AtelierResult<String> {
        let profile = OperationProfile::edit_image();
        let payload = decode_image_payload(&request.image_base64)?;
        let normalized = normalize_blocking(payload.bytes, profile.image_budget_mp).await?;

        let caption = self.optimizer.caption_image(&normalized.base64).await?;
        let optimized = self
            .optimizer
            .optimize(
                &request.user_prompt,
                &ReferenceContext::Single {
                    image_context: Some(caption),
                },
            )
            .await?;
        self.audit_log(user_id, &request.user_prompt, &optimized, profile.kind, true)
            .await;

        let edit = self
            .ledger
            .charge_and_create_edit(NewEdit {
                user_id,
                operation: profile.kind,
                prompt_text: optimized.improved_prompt.clone(),
                credits_used: credit_cost(profile.kind, 1),
                task_id: None,
                metadata: Some(metadata_for(&normalized)),
            })
            .await?;

        self.dispatch_or_refund(
            &edit,
            &optimized.improved_prompt,
            vec![normalized.base64.clone()],
            normalized.width,
            normalized.height,
        )
        .await
    }

    /// 模板编辑：提示词 = 模板默认提示词 + 看图描述，不经过优化管道
    #[instrument(skip(self, request), fields(user_id = %user_id, template_id = %request.template_id))]
    pub async fn edit_with_template(
        &self,
        user_id: Uuid,
        request: TemplateRequest,
    ) -> AtelierResult<String> {
        let profile = OperationProfile::edit_model();
        let template = self
            .templates
            .find_active(request.template_id)
            .await?
            .ok_or_else(|| AtelierError::not_found("模板不存在或未激活"))?;

        let payload = decode_image_payload(&request.image_base64)?;
        let normalized = normalize_blocking(payload.bytes, profile.image_budget_mp).await?;
        let caption = self.optimizer.caption_image(&normalized.base64).await?;
        let final_prompt = format!("{}\n\nImage context: {}", template.default_prompt, caption);

        let edit = self
            .ledger
            .charge_and_create_edit(NewEdit {
                user_id,
                operation: profile.kind,
                prompt_text: final_prompt.clone(),
                credits_used: credit_cost(profile.kind, 1),
                task_id: None,
                metadata: Some(metadata_for(&normalized)),
            })
            .await?;

        self.dispatch_or_refund(
            &edit,
            &final_prompt,
            vec![normalized.base64.clone()],
            normalized.width,
            normalized.height,
        )
        .await
    }

    /// 多参考图合成：逐图归一化（并行）→ 多图优化 → 累进扣款 → 派发
    #[instrument(skip(self, request), fields(user_id = %user_id, images = request.images.len()))]
    pub async fn multi(&self, user_id: Uuid, request: MultiRequest) -> AtelierResult<String> {
        let payloads = decode_image_batch(&request.images)?;
        let image_count = payloads.len();
        let profile = OperationProfile::multi_image(image_count);
        let normalized = normalize_batch_blocking(payloads, profile.image_budget_mp).await?;

        let optimized = self
            .optimizer
            .optimize(
                &request.user_prompt,
                &ReferenceContext::MultiReference { image_count },
            )
            .await?;
        self.audit_log(user_id, &request.user_prompt, &optimized, profile.kind, true)
            .await;

        let total_size: i64 = normalized.iter().map(|n| n.file_size).sum();
        let edit = self
            .ledger
            .charge_and_create_edit(NewEdit {
                user_id,
                operation: profile.kind,
                prompt_text: optimized.improved_prompt.clone(),
                credits_used: credit_cost(profile.kind, image_count),
                task_id: None,
                metadata: Some(SourceImageMetadata {
                    file_size: Some(total_size),
                    mime_type: Some("image/jpeg".to_string()),
                    width: Some(request.width as i32),
                    height: Some(request.height as i32),
                }),
            })
            .await?;

        self.dispatch_or_refund(
            &edit,
            &optimized.improved_prompt,
            normalized.into_iter().map(|n| n.base64).collect(),
            request.width,
            request.height,
        )
        .await
    }

    /// 派发并在失败时退款
    ///
    /// 仅对"任务未被服务方受理"的失败退款；受理之后的登记失败
    /// 不退款，按对账缺口记录。
    async fn dispatch_or_refund(
        &self,
        edit: &Edit,
        prompt: &str,
        images: Vec<String>,
        width: u32,
        height: u32,
    ) -> AtelierResult<String> {
        match self.dispatcher.dispatch(edit, prompt, images, width, height).await {
            Ok(task_id) => Ok(task_id),
            Err(
                err @ (AtelierError::ProviderRejected { .. }
                | AtelierError::MalformedUpstreamResponse
                | AtelierError::UpstreamUnavailable(_)),
            ) => {
                info!(edit_id = %edit.id, "派发失败，退款并标记失败");
                self.ledger
                    .refund_and_fail(edit.user_id, edit.credits_used, edit.id)
                    .await;
                Err(err)
            }
            Err(other) => Err(other),
        }
    }

    /// 写入优化审计日志，失败只告警不阻断
    async fn audit_log(
        &self,
        user_id: Uuid,
        original_prompt: &str,
        optimized: &OptimizedPrompt,
        kind: OperationKind,
        image_context_used: bool,
    ) {
        let entry = OptimizationLog {
            user_id,
            original_prompt: original_prompt.trim().to_string(),
            improved_prompt: optimized.improved_prompt.clone(),
            avg_similarity: optimized.avg_similarity,
            matched_chunk_ids: optimized.matched_ids.clone(),
            metadata: serde_json::json!({
                "source": kind.as_str(),
                "intent": optimized.intent,
                "rag_match_count": optimized.matched_ids.len(),
                "image_context_used": image_context_used,
            }),
        };
        if let Err(e) = self.logs.insert(&entry).await {
            warn!(user_id = %user_id, error = %e, "优化审计日志写入失败，继续主流程");
        }
    }
}

/// 在阻塞线程池上归一化单张图像
async fn normalize_blocking(bytes: Vec<u8>, budget_mp: f64) -> AtelierResult<NormalizedImage> {
    tokio::task::spawn_blocking(move || normalize_to_budget(&bytes, budget_mp))
        .await
        .map_err(|e| AtelierError::internal(format!("图像处理任务中断: {e}")))?
}

/// 逐图并行归一化，错误携带 1 起始的图像序号
async fn normalize_batch_blocking(
    payloads: Vec<ImagePayload>,
    budget_mp: f64,
) -> AtelierResult<Vec<NormalizedImage>> {
    let handles: Vec<_> = payloads
        .into_iter()
        .map(|p| tokio::task::spawn_blocking(move || normalize_to_budget(&p.bytes, budget_mp)))
        .collect();
    let joined = futures::future::try_join_all(handles)
        .await
        .map_err(|e| AtelierError::internal(format!("图像处理任务中断: {e}")))?;
    joined
        .into_iter()
        .enumerate()
        .map(|(index, result)| {
            result.map_err(|err| match err {
                AtelierError::InvalidImage(msg) => {
                    AtelierError::invalid_image(format!("图像 {}: {msg}", index + 1))
                }
                other => other,
            })
        })
        .collect()
}

fn metadata_for(normalized: &NormalizedImage) -> SourceImageMetadata {
    SourceImageMetadata {
        file_size: Some(normalized.file_size),
        mime_type: Some("image/jpeg".to_string()),
        width: Some(normalized.width as i32),
        height: Some(normalized.height as i32),
    }
}
