use async_trait::async_trait;

use atelier_errors::AtelierResult;

/// 语言模型端口：翻译、意图分类、改写、看图描述与向量嵌入
#[async_trait]
pub trait LanguageModelPort: Send + Sync {
    async fn chat(&self, system: &str, user: &str) -> AtelierResult<String>;

    /// 基于图像内容生成描述（vision 调用），`image_base64` 为纯 base64
    async fn describe_image(&self, image_base64: &str, prompt: &str) -> AtelierResult<String>;

    /// 失败或空结果应映射为 `EmbeddingFailed`
    async fn embed(&self, input: &str) -> AtelierResult<Vec<f32>>;
}

/// 相似度检索返回的领域文档片段
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub id: String,
    pub content: String,
    pub similarity: f64,
}

/// 领域文档相似度检索端口
#[async_trait]
pub trait RetrievalPort: Send + Sync {
    /// 按相似度阈值与数量上限检索，结果按相似度降序；空结果合法
    async fn match_documents(
        &self,
        query_embedding: &[f32],
        match_threshold: f64,
        match_count: i64,
    ) -> AtelierResult<Vec<RetrievedChunk>>;
}
