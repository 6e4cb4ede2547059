use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{instrument, warn};

use atelier_domain::ports::{ImageProviderPort, ProviderSubmission, SubmitOutcome};
use atelier_errors::{AtelierError, AtelierResult};

use crate::config::ProviderConfig;

/// 异步图像生成服务客户端（BFL/FLUX 风格接口）
///
/// 认证走 `x-key` 头；多张参考图按位置挂在 `input_image`、
/// `input_image_2`… 字段上；生成结果经 webhook 回调送达。
pub struct FluxClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: Option<String>,
}

impl FluxClient {
    pub fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    fn build_body(request: &ProviderSubmission) -> Value {
        let mut body = Map::new();
        body.insert("prompt".to_string(), json!(request.prompt));
        for (index, image) in request.images.iter().enumerate() {
            let field = if index == 0 {
                "input_image".to_string()
            } else {
                format!("input_image_{}", index + 1)
            };
            body.insert(field, json!(image));
        }
        body.insert("width".to_string(), json!(request.width));
        body.insert("height".to_string(), json!(request.height));
        body.insert("output_format".to_string(), json!("jpeg"));
        body.insert("webhook_url".to_string(), json!(request.webhook_url));
        Value::Object(body)
    }
}

#[async_trait]
impl ImageProviderPort for FluxClient {
    #[instrument(skip(self, request), fields(images = request.images.len()))]
    async fn submit(&self, request: &ProviderSubmission) -> AtelierResult<SubmitOutcome> {
        let response = self
            .http
            .post(&self.config.base_url)
            .header("x-key", &self.config.api_key)
            .header("Accept", "application/json")
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| AtelierError::upstream(format!("生成服务不可达: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "生成服务拒绝提交");
            return Ok(SubmitOutcome::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|_| AtelierError::MalformedUpstreamResponse)?;
        match parsed.id {
            Some(task_id) if !task_id.is_empty() => Ok(SubmitOutcome::Accepted { task_id }),
            _ => Ok(SubmitOutcome::MissingTaskId),
        }
    }

    #[instrument(skip(self, url))]
    async fn fetch_asset(&self, url: &str) -> AtelierResult<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AtelierError::upstream(format!("下载生成结果失败: {e}")))?;
        if !response.status().is_success() {
            return Err(AtelierError::upstream(format!(
                "下载生成结果失败: {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AtelierError::upstream(format!("下载生成结果失败: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_indexes_images_by_position() {
        let request = ProviderSubmission {
            prompt: "p".to_string(),
            images: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            width: 1024,
            height: 768,
            webhook_url: "https://x.test/webhooks/provider".to_string(),
        };
        let body = FluxClient::build_body(&request);
        assert_eq!(body["input_image"], "a");
        assert_eq!(body["input_image_2"], "b");
        assert_eq!(body["input_image_3"], "c");
        assert_eq!(body["output_format"], "jpeg");
        assert_eq!(body["width"], 1024);
    }

    #[test]
    fn test_body_without_images_has_no_input_fields() {
        let request = ProviderSubmission {
            prompt: "p".to_string(),
            images: vec![],
            width: 512,
            height: 512,
            webhook_url: "https://x.test/webhooks/provider".to_string(),
        };
        let body = FluxClient::build_body(&request);
        assert!(body.get("input_image").is_none());
    }
}
