//! HTTP 接入层
//!
//! 路由、Bearer 认证、请求校验、领域错误到状态码的映射。
//! 业务编排全部在 dispatcher 层，此处只做传输语义：
//! - `POST /api/edits/*` 五类提交操作
//! - `POST /webhooks/provider` 生成服务回调
//! - `GET /health` 健康检查

pub mod auth;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::{create_routes, AppState};
