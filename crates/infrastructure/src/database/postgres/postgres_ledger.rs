use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use atelier_domain::ports::LedgerPort;
use atelier_errors::{AtelierError, AtelierResult};

/// 积分账本网关的 Postgres 实现
///
/// 余额与流水由账本侧存储过程持有：`deduct_credits_for_operation`
/// 在余额不足时抛出带 `insufficient_credits` 标记的异常且不改余额；
/// `refund_credits_for_edit` 对同一 edit id 的重复退款幂等。
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerPort for PostgresLedger {
    #[instrument(skip(self, description), fields(user_id = %user_id, credits, reference_id = %reference_id))]
    async fn debit(
        &self,
        user_id: Uuid,
        credits: i32,
        description: &str,
        reference_id: Uuid,
    ) -> AtelierResult<()> {
        sqlx::query("SELECT deduct_credits_for_operation($1, $2, $3, $4)")
            .bind(user_id)
            .bind(credits)
            .bind(description)
            .bind(reference_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                let message = e.to_string();
                if message.contains("insufficient_credits") {
                    AtelierError::InsufficientCredits
                } else {
                    AtelierError::ledger(message)
                }
            })?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, credits, reference_id = %reference_id))]
    async fn refund(&self, user_id: Uuid, credits: i32, reference_id: Uuid) -> AtelierResult<()> {
        sqlx::query("SELECT refund_credits_for_edit($1, $2, $3)")
            .bind(user_id)
            .bind(credits)
            .bind(reference_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AtelierError::ledger(e.to_string()))?;
        Ok(())
    }
}
