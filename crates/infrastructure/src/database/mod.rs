//! 数据访问实现

pub mod postgres;

pub use postgres::*;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use atelier_errors::AtelierResult;

use crate::config::DatabaseConfig;

/// 按配置构建 Postgres 连接池
pub async fn create_pool(config: &DatabaseConfig) -> AtelierResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}
