use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use atelier_domain::ports::{RetrievalPort, RetrievedChunk};
use atelier_errors::AtelierResult;

/// 领域文档相似度检索（pgvector 函数 `match_flux_docs`）
///
/// 查询向量以 real[] 绑定后在 SQL 侧转换为 vector，避免为驱动
/// 引入额外的向量类型映射。
pub struct PostgresRetrieval {
    pool: PgPool,
}

impl PostgresRetrieval {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RetrievalPort for PostgresRetrieval {
    #[instrument(skip(self, query_embedding), fields(dims = query_embedding.len(), match_threshold, match_count))]
    async fn match_documents(
        &self,
        query_embedding: &[f32],
        match_threshold: f64,
        match_count: i64,
    ) -> AtelierResult<Vec<RetrievedChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id::text AS id, content, similarity
            FROM match_flux_docs($1::real[]::vector, $2, $3)
            "#,
        )
        .bind(query_embedding)
        .bind(match_threshold)
        .bind(match_count)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RetrievedChunk {
                    id: row.try_get("id")?,
                    content: row.try_get("content")?,
                    similarity: row.try_get("similarity")?,
                })
            })
            .collect()
    }
}
