use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use atelier_domain::ports::AuthPort;
use atelier_errors::AtelierResult;

/// 会话表驱动的认证：令牌有效且未过期时解析出用户 id
pub struct PostgresAuth {
    pool: PgPool,
}

impl PostgresAuth {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthPort for PostgresAuth {
    #[instrument(skip(self, bearer_token))]
    async fn resolve_user(&self, bearer_token: &str) -> AtelierResult<Option<Uuid>> {
        let row = sqlx::query(
            "SELECT user_id FROM auth_sessions WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(bearer_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.try_get("user_id")).transpose()?)
    }
}
