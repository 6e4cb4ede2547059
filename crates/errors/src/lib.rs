use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtelierError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("输入验证失败: {0}")]
    Validation(String),
    #[error("需要身份认证")]
    AuthRequired,
    #[error("积分不足")]
    InsufficientCredits,
    #[error("上游服务不可用: {0}")]
    UpstreamUnavailable(String),
    #[error("向量嵌入生成失败")]
    EmbeddingFailed,
    #[error("上游响应格式无效")]
    MalformedUpstreamResponse,
    #[error("生成服务拒绝请求: {message}")]
    ProviderRejected { status: u16, message: String },
    #[error("无效的图像: {0}")]
    InvalidImage(String),
    #[error("图像处理失败: {0}")]
    ProcessingFailed(String),
    #[error("资源未找到: {0}")]
    NotFound(String),
    #[error("积分账本操作失败: {0}")]
    LedgerError(String),
    #[error("任务记录持久化失败: {0}")]
    PersistenceError(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type AtelierResult<T> = Result<T, AtelierError>;

impl AtelierError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }
    pub fn invalid_image<S: Into<String>>(msg: S) -> Self {
        Self::InvalidImage(msg.into())
    }
    pub fn processing_failed<S: Into<String>>(msg: S) -> Self {
        Self::ProcessingFailed(msg.into())
    }
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn ledger<S: Into<String>>(msg: S) -> Self {
        Self::LedgerError(msg.into())
    }
    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::PersistenceError(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// 判断该错误是否发生在积分扣除之前（无需退款即可直接返回）
    pub fn is_pre_charge(&self) -> bool {
        matches!(
            self,
            AtelierError::Validation(_)
                | AtelierError::AuthRequired
                | AtelierError::InvalidImage(_)
                | AtelierError::ProcessingFailed(_)
                | AtelierError::NotFound(_)
        )
    }

    /// 面向最终用户的稳定错误文案
    pub fn user_message(&self) -> String {
        match self {
            AtelierError::Validation(msg) => msg.clone(),
            AtelierError::AuthRequired => "认证是必需的".to_string(),
            AtelierError::InsufficientCredits => "积分不足".to_string(),
            AtelierError::UpstreamUnavailable(_) => "上游服务暂时不可用，请稍后重试".to_string(),
            AtelierError::EmbeddingFailed => "提示词优化失败，请稍后重试".to_string(),
            AtelierError::MalformedUpstreamResponse => "生成服务返回了无效响应".to_string(),
            AtelierError::ProviderRejected { message, .. } => message.clone(),
            AtelierError::InvalidImage(msg) => msg.clone(),
            AtelierError::ProcessingFailed(_) => {
                "图像处理失败，请确认格式有效 (JPEG/PNG)".to_string()
            }
            AtelierError::NotFound(msg) => msg.clone(),
            AtelierError::Configuration(_) => "服务配置不可用".to_string(),
            AtelierError::PersistenceError(_) => "任务注册失败".to_string(),
            _ => "系统繁忙，请稍后重试".to_string(),
        }
    }
}

impl From<serde_json::Error> for AtelierError {
    fn from(err: serde_json::Error) -> Self {
        AtelierError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for AtelierError {
    fn from(err: anyhow::Error) -> Self {
        AtelierError::Internal(err.to_string())
    }
}
