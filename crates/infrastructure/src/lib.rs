//! 基础设施层
//!
//! 领域端口与仓储抽象的具体实现：
//! - [`database`]：sqlx Postgres 仓储、账本存储过程网关、相似度检索与会话认证
//! - [`clients`]：reqwest 出站客户端（语言模型、图像生成、背景移除、对象存储）
//! - [`config`]：环境变量驱动的应用配置

pub mod clients;
pub mod config;
pub mod database;

pub use config::AppConfig;
