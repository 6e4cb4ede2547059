use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use atelier_errors::AtelierError;

use crate::{error::ApiError, routes::AppState};

pub const BEARER_PREFIX: &str = "Bearer ";

/// 已认证用户，由 `Authorization: Bearer <token>` 经 AuthPort 解析
///
/// 头缺失、格式不对或令牌无法解析一律 401，不区分原因。
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AtelierError::AuthRequired)?;
        let token = header
            .strip_prefix(BEARER_PREFIX)
            .filter(|token| !token.is_empty())
            .ok_or(AtelierError::AuthRequired)?;

        let user_id = state
            .auth
            .resolve_user(token)
            .await?
            .ok_or(AtelierError::AuthRequired)?;
        Ok(CurrentUser(user_id))
    }
}
