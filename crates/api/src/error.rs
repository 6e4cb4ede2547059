use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use atelier_errors::AtelierError;

/// API层错误，负责把领域错误映射为HTTP状态码
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] AtelierError),

    #[error("请求格式错误: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// 领域错误的状态码映射
///
/// 生成服务的拒绝原样透传其状态码，5xx 一律折算为 502：
/// 对调用方而言那是上游故障，不是本服务的内部错误。
fn domain_status(err: &AtelierError) -> StatusCode {
    match err {
        AtelierError::Validation(_) | AtelierError::InvalidImage(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AtelierError::AuthRequired => StatusCode::UNAUTHORIZED,
        AtelierError::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
        AtelierError::NotFound(_) => StatusCode::NOT_FOUND,
        AtelierError::ProviderRejected { status, .. } => {
            if *status >= 500 {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
        AtelierError::UpstreamUnavailable(_)
        | AtelierError::EmbeddingFailed
        | AtelierError::MalformedUpstreamResponse => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Domain(err) => {
                let status = domain_status(err);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %err, "请求处理失败");
                }
                (status, err.user_message())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_422() {
        assert_eq!(
            domain_status(&AtelierError::validation("bad input")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            domain_status(&AtelierError::invalid_image("corrupt")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_billing_and_auth_codes() {
        assert_eq!(
            domain_status(&AtelierError::AuthRequired),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            domain_status(&AtelierError::InsufficientCredits),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[test]
    fn test_provider_rejection_passes_status_through_below_500() {
        let err = AtelierError::ProviderRejected {
            status: 429,
            message: "请求过于频繁，请稍后再试".to_string(),
        };
        assert_eq!(domain_status(&err), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_provider_5xx_collapses_to_502() {
        let err = AtelierError::ProviderRejected {
            status: 503,
            message: "生成服务暂时不可用".to_string(),
        };
        assert_eq!(domain_status(&err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_upstream_failures_are_502() {
        assert_eq!(
            domain_status(&AtelierError::upstream("connect timeout")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            domain_status(&AtelierError::EmbeddingFailed),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            domain_status(&AtelierError::MalformedUpstreamResponse),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_internal_failures_are_500() {
        assert_eq!(
            domain_status(&AtelierError::persistence("任务登记失败")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            domain_status(&AtelierError::ledger("rpc failed")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
