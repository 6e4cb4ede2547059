use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use atelier_domain::entities::{Edit, NewEdit};
use atelier_domain::repositories::EditRepository;
use atelier_errors::AtelierResult;

const EDIT_COLUMNS: &str = "id, user_id, operation_type, prompt_text, credits_used, task_id, \
     status, image_url, ai_processing_time_ms, file_size, mime_type, width, height, \
     created_at, updated_at";

pub struct PostgresEditRepository {
    pool: PgPool,
}

impl PostgresEditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_edit(row: &sqlx::postgres::PgRow) -> AtelierResult<Edit> {
        Ok(Edit {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            operation: row.try_get("operation_type")?,
            prompt_text: row.try_get("prompt_text")?,
            credits_used: row.try_get("credits_used")?,
            task_id: row.try_get("task_id")?,
            status: row.try_get("status")?,
            image_url: row.try_get("image_url")?,
            ai_processing_time_ms: row.try_get("ai_processing_time_ms")?,
            file_size: row.try_get("file_size")?,
            mime_type: row.try_get("mime_type")?,
            width: row.try_get("width")?,
            height: row.try_get("height")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl EditRepository for PostgresEditRepository {
    #[instrument(skip(self, edit), fields(user_id = %edit.user_id, operation = edit.operation.as_str()))]
    async fn create(&self, edit: &NewEdit) -> AtelierResult<Edit> {
        let metadata = edit.metadata.clone().unwrap_or_default();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO edits (user_id, operation_type, prompt_text, credits_used, task_id,
                               status, file_size, mime_type, width, height)
            VALUES ($1, $2, $3, $4, $5, 'queued', $6, $7, $8, $9)
            RETURNING {EDIT_COLUMNS}
            "#
        ))
        .bind(edit.user_id)
        .bind(edit.operation)
        .bind(&edit.prompt_text)
        .bind(edit.credits_used)
        .bind(&edit.task_id)
        .bind(metadata.file_size)
        .bind(&metadata.mime_type)
        .bind(metadata.width)
        .bind(metadata.height)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_edit(&row)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AtelierResult<Option<Edit>> {
        let row = sqlx::query(&format!("SELECT {EDIT_COLUMNS} FROM edits WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_edit).transpose()
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> AtelierResult<bool> {
        let result = sqlx::query("DELETE FROM edits WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn set_task_id(&self, id: Uuid, task_id: &str) -> AtelierResult<()> {
        sqlx::query(
            "UPDATE edits SET task_id = $2, status = 'pending', updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_failed(&self, id: Uuid) -> AtelierResult<()> {
        sqlx::query("UPDATE edits SET status = 'failed', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, image_url))]
    async fn mark_completed(
        &self,
        id: Uuid,
        image_url: &str,
        ai_processing_time_ms: i64,
    ) -> AtelierResult<()> {
        sqlx::query(
            r#"
            UPDATE edits
            SET status = 'completed', image_url = $2, ai_processing_time_ms = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(image_url)
        .bind(ai_processing_time_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
