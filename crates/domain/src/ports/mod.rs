//! 出站端口
//!
//! 核心只通过这些窄接口访问外部协作方（积分账本、检索、AI 服务、
//! 生成服务、对象存储、认证），便于用内存假实现进行测试。

pub mod ai;
pub mod auth;
pub mod ledger;
pub mod provider;
pub mod storage;

pub use ai::*;
pub use auth::*;
pub use ledger::*;
pub use provider::*;
pub use storage::*;
