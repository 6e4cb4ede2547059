use std::sync::Arc;

use tracing::{debug, instrument, warn};

use atelier_domain::ports::{LanguageModelPort, RetrievalPort, RetrievedChunk};
use atelier_domain::value_objects::OptimizedPrompt;
use atelier_errors::{AtelierError, AtelierResult};

use crate::prompts;

/// 优化所处的参考图场景，决定意图类别集与上下文占位文本
#[derive(Debug, Clone)]
pub enum ReferenceContext {
    /// 单图编辑或纯文生图，`image_context` 为 vision 生成的描述
    Single { image_context: Option<String> },
    /// 多参考图合成
    MultiReference { image_count: usize },
}

/// 五阶段提示词优化管道
///
/// 各阶段严格顺序执行，任一阶段失败整体失败；
/// 检索结果为空是合法情形，改写阶段以空上下文继续。
pub struct PromptOptimizer {
    model: Arc<dyn LanguageModelPort>,
    retrieval: Arc<dyn RetrievalPort>,
}

impl PromptOptimizer {
    pub fn new(model: Arc<dyn LanguageModelPort>, retrieval: Arc<dyn RetrievalPort>) -> Self {
        Self { model, retrieval }
    }

    /// 为单张参考图生成描述，供 [`optimize`](Self::optimize) 的上下文使用
    ///
    /// 描述过短视为无效，回退到占位文本；调用失败向上传播，
    /// 由调用方决定如何向用户呈现。
    pub async fn caption_image(&self, image_base64: &str) -> AtelierResult<String> {
        let caption = self
            .model
            .describe_image(image_base64, prompts::CAPTION_PROMPT)
            .await?;
        if caption.trim().len() < 10 {
            warn!("图像描述过短，使用占位上下文");
            return Ok(prompts::UNKNOWN_IMAGE_CONTEXT.to_string());
        }
        Ok(caption)
    }

    /// 运行完整管道：翻译 → 意图分类 → 查询扩展 → 检索 → 改写
    #[instrument(skip(self, user_prompt), fields(prompt_len = user_prompt.len()))]
    pub async fn optimize(
        &self,
        user_prompt: &str,
        reference: &ReferenceContext,
    ) -> AtelierResult<OptimizedPrompt> {
        let translated = self
            .model
            .chat(prompts::TRANSLATE_SYSTEM, user_prompt)
            .await?;

        let (intent_system, multi_reference) = match reference {
            ReferenceContext::Single { .. } => (prompts::INTENT_SYSTEM_SINGLE, false),
            ReferenceContext::MultiReference { .. } => (prompts::INTENT_SYSTEM_MULTI, true),
        };
        let intent = self.model.chat(intent_system, &translated).await?;
        debug!(%intent, "意图分类完成");

        let expansion_context = match reference {
            ReferenceContext::Single { image_context } => image_context
                .clone()
                .unwrap_or_else(|| prompts::UNKNOWN_IMAGE_CONTEXT.to_string()),
            ReferenceContext::MultiReference { image_count } => {
                prompts::multi_reference_context(*image_count)
            }
        };
        let expanded_query =
            prompts::expansion_query(&translated, &expansion_context, &intent, multi_reference);

        let embedding = self.model.embed(&expanded_query).await?;
        if embedding.is_empty() {
            return Err(AtelierError::EmbeddingFailed);
        }

        let matched = self
            .retrieval
            .match_documents(&embedding, prompts::MATCH_THRESHOLD, prompts::MATCH_COUNT)
            .await?;
        debug!(matched = matched.len(), "文档检索完成");

        let context_string = join_context(&matched);
        let avg_similarity = average_similarity(&matched);
        let matched_ids: Vec<String> = matched.iter().map(|c| c.id.clone()).collect();

        let rewrite_context = match reference {
            ReferenceContext::Single { image_context } => image_context
                .clone()
                .unwrap_or_else(|| prompts::PRESERVE_SCENE_CONTEXT.to_string()),
            ReferenceContext::MultiReference { image_count } => {
                prompts::multi_reference_context(*image_count)
            }
        };
        let rewrite_system = if multi_reference {
            prompts::REWRITE_SYSTEM_MULTI
        } else {
            prompts::REWRITE_SYSTEM_SINGLE
        };
        let improved_prompt = self
            .model
            .chat(
                rewrite_system,
                &prompts::rewrite_user(&translated, &rewrite_context, &intent, &context_string),
            )
            .await?;

        Ok(OptimizedPrompt {
            improved_prompt,
            intent,
            avg_similarity,
            matched_ids,
        })
    }
}

/// 以分隔符拼接片段内容并截断到上限，按字符计数避免切在多字节边界
fn join_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return String::new();
    }
    let joined = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join(prompts::CONTEXT_SEPARATOR);
    match joined.char_indices().nth(prompts::CONTEXT_MAX_CHARS) {
        Some((byte_index, _)) => joined[..byte_index].to_string(),
        None => joined,
    }
}

fn average_similarity(chunks: &[RetrievedChunk]) -> f64 {
    if chunks.is_empty() {
        return 0.0;
    }
    chunks.iter().map(|c| c.similarity).sum::<f64>() / chunks.len() as f64
}
