//! 派发域：积分扣收、任务提交与回调完成
//!
//! 职责划分：
//! - [`ledger`]：创建 Edit 行并扣款的补偿事务网关
//! - [`profiles`]：各操作类型的积分成本与管道参数
//! - [`pipeline`]：参数化的提交管道（归一化 → 提示词 → 扣款 → 派发）
//! - [`dispatch`]：与异步生成服务的单次提交交互
//! - [`completion`]：回调驱动的完成状态机
//! - [`removal`]：同步背景移除流程

pub mod completion;
pub mod dispatch;
pub mod ledger;
pub mod pipeline;
pub mod profiles;
pub mod removal;

pub use completion::CompletionHandler;
pub use dispatch::JobDispatcher;
pub use ledger::CreditLedgerGateway;
pub use pipeline::SubmissionPipeline;
pub use removal::BackgroundRemovalFlow;
