use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use atelier_domain::entities::{NewProviderTask, ProviderTask};
use atelier_domain::repositories::ProviderTaskRepository;
use atelier_errors::AtelierResult;

const TASK_COLUMNS: &str =
    "task_id, user_id, edit_id, status, image_url, error_message, created_at, updated_at";

pub struct PostgresProviderTaskRepository {
    pool: PgPool,
}

impl PostgresProviderTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::postgres::PgRow) -> AtelierResult<ProviderTask> {
        Ok(ProviderTask {
            task_id: row.try_get("task_id")?,
            user_id: row.try_get("user_id")?,
            edit_id: row.try_get("edit_id")?,
            status: row.try_get("status")?,
            image_url: row.try_get("image_url")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ProviderTaskRepository for PostgresProviderTaskRepository {
    #[instrument(skip(self, task), fields(task_id = %task.task_id, edit_id = %task.edit_id))]
    async fn insert_pending(&self, task: &NewProviderTask) -> AtelierResult<ProviderTask> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO provider_tasks (task_id, user_id, edit_id, status)
            VALUES ($1, $2, $3, 'pending')
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(&task.task_id)
        .bind(task.user_id)
        .bind(task.edit_id)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_task(&row)
    }

    #[instrument(skip(self))]
    async fn find_by_task_id(&self, task_id: &str) -> AtelierResult<Option<ProviderTask>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM provider_tasks WHERE task_id = $1"
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_task).transpose()
    }

    #[instrument(skip(self, image_url))]
    async fn mark_ready(&self, task_id: &str, image_url: &str) -> AtelierResult<()> {
        sqlx::query(
            r#"
            UPDATE provider_tasks
            SET status = 'ready', image_url = $2, updated_at = NOW()
            WHERE task_id = $1
            "#,
        )
        .bind(task_id)
        .bind(image_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, error_message))]
    async fn mark_error(&self, task_id: &str, error_message: &str) -> AtelierResult<()> {
        sqlx::query(
            r#"
            UPDATE provider_tasks
            SET status = 'error', error_message = $2, updated_at = NOW()
            WHERE task_id = $1
            "#,
        )
        .bind(task_id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
