use async_trait::async_trait;
use uuid::Uuid;

use atelier_errors::AtelierResult;

/// 积分账本端口
///
/// 余额状态完全由外部账本持有，核心只提交以 Edit id 为引用的增减量。
/// 协作方承诺：余额不足的扣款不改变余额；对同一引用的重复退款不重复入账。
#[async_trait]
pub trait LedgerPort: Send + Sync {
    /// 扣款。余额不足返回 `InsufficientCredits`，其余失败返回 `LedgerError`。
    async fn debit(
        &self,
        user_id: Uuid,
        credits: i32,
        description: &str,
        reference_id: Uuid,
    ) -> AtelierResult<()>;

    /// 退款，尽力而为；幂等性由账本协作方保证。
    async fn refund(&self, user_id: Uuid, credits: i32, reference_id: Uuid) -> AtelierResult<()>;
}
