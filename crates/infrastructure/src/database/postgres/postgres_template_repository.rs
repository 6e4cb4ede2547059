use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use atelier_domain::entities::Template;
use atelier_domain::repositories::TemplateRepository;
use atelier_errors::AtelierResult;

pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    #[instrument(skip(self))]
    async fn find_active(&self, id: Uuid) -> AtelierResult<Option<Template>> {
        let row = sqlx::query(
            "SELECT id, default_prompt, active FROM templates WHERE id = $1 AND active = TRUE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| {
            Ok::<_, sqlx::Error>(Template {
                id: r.try_get("id")?,
                default_prompt: r.try_get("default_prompt")?,
                active: r.try_get("active")?,
            })
        })
        .transpose()?)
    }
}
