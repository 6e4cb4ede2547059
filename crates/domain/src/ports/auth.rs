use async_trait::async_trait;
use uuid::Uuid;

use atelier_errors::AtelierResult;

/// 认证端口：将 Bearer 令牌解析为用户身份
///
/// 令牌无效或已过期返回 `Ok(None)`；仅传输层故障返回错误。
#[async_trait]
pub trait AuthPort: Send + Sync {
    async fn resolve_user(&self, bearer_token: &str) -> AtelierResult<Option<Uuid>>;
}
