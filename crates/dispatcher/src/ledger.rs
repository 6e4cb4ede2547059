use std::sync::Arc;

use tracing::{error, instrument, warn};
use uuid::Uuid;

use atelier_domain::entities::{Edit, NewEdit};
use atelier_domain::ports::LedgerPort;
use atelier_domain::repositories::EditRepository;
use atelier_errors::{AtelierError, AtelierResult};

/// 账本扣款在每次扣收时携带的固定描述
const DEBIT_DESCRIPTION: &str = "usage";

/// 积分账本网关：创建 Edit 行与扣款组成的补偿事务
///
/// 顺序固定：先建行、再以行 id 为引用扣款；扣款失败执行补偿删除，
/// 保证任何失败路径都不会留下已入账却无记录的扣费。
#[derive(Clone)]
pub struct CreditLedgerGateway {
    edits: Arc<dyn EditRepository>,
    ledger: Arc<dyn LedgerPort>,
}

impl CreditLedgerGateway {
    pub fn new(edits: Arc<dyn EditRepository>, ledger: Arc<dyn LedgerPort>) -> Self {
        Self { edits, ledger }
    }

    /// 创建 Edit 行并扣款，返回已入账的 Edit
    ///
    /// 余额不足返回 `InsufficientCredits`，其余账本失败返回 `LedgerError`，
    /// 两者都会先补偿删除刚创建的行。结果不明的扣款同样走补偿删除，
    /// 并以 error 级别记录 edit id 供账本方对账。
    #[instrument(skip(self, new_edit), fields(user_id = %new_edit.user_id, credits = new_edit.credits_used))]
    pub async fn charge_and_create_edit(&self, new_edit: NewEdit) -> AtelierResult<Edit> {
        let edit = self.edits.create(&new_edit).await?;

        match self
            .ledger
            .debit(edit.user_id, edit.credits_used, DEBIT_DESCRIPTION, edit.id)
            .await
        {
            Ok(()) => Ok(edit),
            Err(debit_err) => {
                if let Err(delete_err) = self.edits.delete(edit.id).await {
                    error!(edit_id = %edit.id, error = %delete_err, "补偿删除失败，行与扣款状态需人工核对");
                }
                match debit_err {
                    AtelierError::InsufficientCredits => Err(AtelierError::InsufficientCredits),
                    AtelierError::LedgerError(msg) => {
                        error!(edit_id = %edit.id, error = %msg, "扣款结果不明，已执行补偿删除");
                        Err(AtelierError::LedgerError(msg))
                    }
                    other => {
                        error!(edit_id = %edit.id, error = %other, "扣款失败，已执行补偿删除");
                        Err(AtelierError::ledger(format!("{other}")))
                    }
                }
            }
        }
    }

    /// 退款并将 Edit 标记为失败，用于扣款之后的任何失败路径
    ///
    /// 退款尽力而为：失败只记录告警，不改变调用方要返回的错误；
    /// 重复退款的幂等性由账本协作方保证。
    pub async fn refund_and_fail(&self, user_id: Uuid, credits: i32, edit_id: Uuid) {
        if credits > 0 {
            if let Err(e) = self.ledger.refund(user_id, credits, edit_id).await {
                warn!(edit_id = %edit_id, credits, error = %e, "退款失败，需人工核对");
            }
        }
        if let Err(e) = self.edits.mark_failed(edit_id).await {
            warn!(edit_id = %edit_id, error = %e, "标记 Edit 失败状态时出错");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_domain::value_objects::OperationKind;
    use atelier_testing_utils::{FakeLedger, MemoryEditRepository};

    fn new_edit(user_id: Uuid, credits: i32) -> NewEdit {
        NewEdit {
            user_id,
            operation: OperationKind::EditImage,
            prompt_text: "test".to_string(),
            credits_used: credits,
            task_id: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_charge_creates_row_and_debits() {
        let user = Uuid::new_v4();
        let edits = MemoryEditRepository::new();
        let ledger = FakeLedger::with_balance(user, 10);
        let gateway = CreditLedgerGateway::new(Arc::new(edits.clone()), Arc::new(ledger.clone()));

        let edit = gateway.charge_and_create_edit(new_edit(user, 7)).await.unwrap();

        assert_eq!(ledger.balance(user), 3);
        assert_eq!(ledger.debits(), vec![(user, 7, edit.id)]);
        assert!(edits.get(edit.id).is_some());
    }

    #[tokio::test]
    async fn test_insufficient_credits_compensates_row() {
        let user = Uuid::new_v4();
        let edits = MemoryEditRepository::new();
        let ledger = FakeLedger::with_balance(user, 3);
        let gateway = CreditLedgerGateway::new(Arc::new(edits.clone()), Arc::new(ledger.clone()));

        let err = gateway.charge_and_create_edit(new_edit(user, 7)).await.unwrap_err();

        assert!(matches!(err, AtelierError::InsufficientCredits));
        // 余额未变，行已补偿删除
        assert_eq!(ledger.balance(user), 3);
        assert_eq!(edits.count(), 0);
    }

    #[tokio::test]
    async fn test_ledger_outage_compensates_row() {
        let user = Uuid::new_v4();
        let edits = MemoryEditRepository::new();
        let ledger = FakeLedger::with_balance(user, 100);
        ledger.fail_debits();
        let gateway = CreditLedgerGateway::new(Arc::new(edits.clone()), Arc::new(ledger.clone()));

        let err = gateway.charge_and_create_edit(new_edit(user, 7)).await.unwrap_err();

        assert!(matches!(err, AtelierError::LedgerError(_)));
        assert_eq!(edits.count(), 0);
        assert_eq!(ledger.balance(user), 100);
    }

    #[tokio::test]
    async fn test_refund_and_fail_restores_balance() {
        let user = Uuid::new_v4();
        let edits = MemoryEditRepository::new();
        let ledger = FakeLedger::with_balance(user, 10);
        let gateway = CreditLedgerGateway::new(Arc::new(edits.clone()), Arc::new(ledger.clone()));

        let edit = gateway.charge_and_create_edit(new_edit(user, 7)).await.unwrap();
        gateway.refund_and_fail(user, edit.credits_used, edit.id).await;

        assert_eq!(ledger.balance(user), 10);
        assert_eq!(ledger.refunds(), vec![(user, 7, edit.id)]);
        assert_eq!(
            edits.get(edit.id).unwrap().status,
            atelier_domain::entities::EditStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_refund_skipped_for_zero_credits() {
        let user = Uuid::new_v4();
        let edits = MemoryEditRepository::new();
        let ledger = FakeLedger::with_balance(user, 10);
        let gateway = CreditLedgerGateway::new(Arc::new(edits.clone()), Arc::new(ledger.clone()));

        gateway.refund_and_fail(user, 0, Uuid::new_v4()).await;
        assert!(ledger.refunds().is_empty());
    }
}
