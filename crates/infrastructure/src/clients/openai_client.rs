use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use atelier_domain::ports::LanguageModelPort;
use atelier_errors::{AtelierError, AtelierResult};

use crate::config::OpenAiConfig;

/// OpenAI 风格的语言模型客户端：对话、看图与向量嵌入
///
/// 所有调用固定 temperature 0，输出需可复现。
pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, config: OpenAiConfig) -> Self {
        Self { http, config }
    }

    async fn chat_completion(&self, body: serde_json::Value) -> AtelierResult<String> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AtelierError::upstream(format!("语言模型服务不可达: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AtelierError::upstream(format!(
                "语言模型调用失败: {status}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|_| AtelierError::MalformedUpstreamResponse)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        Ok(content)
    }
}

#[async_trait]
impl LanguageModelPort for OpenAiClient {
    #[instrument(skip(self, system, user), fields(user_len = user.len()))]
    async fn chat(&self, system: &str, user: &str) -> AtelierResult<String> {
        self.chat_completion(json!({
            "model": self.config.chat_model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        }))
        .await
    }

    #[instrument(skip(self, image_base64, prompt))]
    async fn describe_image(&self, image_base64: &str, prompt: &str) -> AtelierResult<String> {
        let data_url = if image_base64.starts_with("data:") {
            image_base64.to_string()
        } else {
            format!("data:image/jpeg;base64,{image_base64}")
        };
        self.chat_completion(json!({
            "model": self.config.chat_model,
            "temperature": 0,
            "max_tokens": 200,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ],
            }],
        }))
        .await
    }

    #[instrument(skip(self, input), fields(input_len = input.len()))]
    async fn embed(&self, input: &str) -> AtelierResult<Vec<f32>> {
        let response = self
            .http
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "input": input,
                "model": self.config.embedding_model,
            }))
            .send()
            .await
            .map_err(|_| AtelierError::EmbeddingFailed)?;

        if !response.status().is_success() {
            return Err(AtelierError::EmbeddingFailed);
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|_| AtelierError::EmbeddingFailed)?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .unwrap_or_default();
        if embedding.is_empty() {
            return Err(AtelierError::EmbeddingFailed);
        }
        Ok(embedding)
    }
}
