use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

use atelier_domain::ports::BackgroundRemovalPort;
use atelier_errors::{AtelierError, AtelierResult};

use crate::config::RemovalConfig;

/// 同步背景移除客户端（fal.ai 风格接口）
///
/// 认证走 `Authorization: Key …` 头；调用同步返回结果图的下载地址。
pub struct FalClient {
    http: reqwest::Client,
    config: RemovalConfig,
}

#[derive(Debug, Deserialize)]
struct RemovalResponse {
    image: Option<RemovalImage>,
    detail: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RemovalImage {
    url: String,
}

impl FalClient {
    pub fn new(http: reqwest::Client, config: RemovalConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl BackgroundRemovalPort for FalClient {
    #[instrument(skip(self, image_data_url))]
    async fn remove_background(&self, image_data_url: &str) -> AtelierResult<String> {
        let response = self
            .http
            .post(&self.config.base_url)
            .header("Authorization", format!("Key {}", self.config.api_key))
            .json(&json!({
                "image_url": image_data_url,
                "output_format": "png",
            }))
            .send()
            .await
            .map_err(|e| AtelierError::upstream(format!("背景移除服务不可达: {e}")))?;

        let status = response.status();
        let parsed: RemovalResponse = response
            .json()
            .await
            .map_err(|_| AtelierError::MalformedUpstreamResponse)?;

        if !status.is_success() {
            let detail = parsed
                .detail
                .map(|d| match d {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| format!("背景移除服务错误: {status}"));
            warn!(status = status.as_u16(), detail = %detail, "背景移除服务拒绝请求");
            return Err(AtelierError::ProviderRejected {
                status: status.as_u16(),
                message: detail,
            });
        }

        match parsed.image {
            Some(image) if !image.url.is_empty() => Ok(image.url),
            _ => Err(AtelierError::MalformedUpstreamResponse),
        }
    }
}
