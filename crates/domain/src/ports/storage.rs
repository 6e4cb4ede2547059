use async_trait::async_trait;

use atelier_errors::AtelierResult;

/// 对象存储端口
#[async_trait]
pub trait ObjectStoragePort: Send + Sync {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
        upsert: bool,
    ) -> AtelierResult<()>;

    /// 返回已上传对象的公开访问地址
    fn public_url(&self, path: &str) -> String;
}
