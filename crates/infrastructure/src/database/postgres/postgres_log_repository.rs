use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use atelier_domain::entities::OptimizationLog;
use atelier_domain::repositories::OptimizationLogRepository;
use atelier_errors::AtelierResult;

/// 提示词优化审计日志，只追加
pub struct PostgresOptimizationLogRepository {
    pool: PgPool,
}

impl PostgresOptimizationLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OptimizationLogRepository for PostgresOptimizationLogRepository {
    #[instrument(skip(self, entry), fields(user_id = %entry.user_id))]
    async fn insert(&self, entry: &OptimizationLog) -> AtelierResult<()> {
        sqlx::query(
            r#"
            INSERT INTO prompt_optimization_logs
                (user_id, original_prompt, improved_prompt, avg_similarity, matched_chunk_ids, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.original_prompt)
        .bind(&entry.improved_prompt)
        .bind(entry.avg_similarity)
        .bind(&entry.matched_chunk_ids)
        .bind(&entry.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
