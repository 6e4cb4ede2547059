use async_trait::async_trait;
use tracing::instrument;

use atelier_domain::ports::ObjectStoragePort;
use atelier_errors::{AtelierError, AtelierResult};

use crate::config::StorageConfig;

/// 对象存储客户端（Supabase Storage 风格的 HTTP 接口）
pub struct BucketStorageClient {
    http: reqwest::Client,
    config: StorageConfig,
}

impl BucketStorageClient {
    pub fn new(http: reqwest::Client, config: StorageConfig) -> Self {
        Self { http, config }
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.bucket,
            path
        )
    }
}

#[async_trait]
impl ObjectStoragePort for BucketStorageClient {
    #[instrument(skip(self, bytes), fields(path, size = bytes.len()))]
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
        upsert: bool,
    ) -> AtelierResult<()> {
        let response = self
            .http
            .post(self.object_url(path))
            .bearer_auth(&self.config.api_key)
            .header("Content-Type", content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| AtelierError::persistence(format!("对象存储不可达: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AtelierError::persistence(format!(
                "对象上传失败: {status} {body}"
            )));
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.bucket,
            path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_shape() {
        let client = BucketStorageClient::new(
            reqwest::Client::new(),
            StorageConfig {
                base_url: "https://storage.test/".to_string(),
                api_key: "k".to_string(),
                bucket: "atelier-images".to_string(),
            },
        );
        assert_eq!(
            client.public_url("default/1_abc.jpeg"),
            "https://storage.test/storage/v1/object/public/atelier-images/default/1_abc.jpeg"
        );
    }
}
