use serde::{Deserialize, Serialize};

/// 操作类型，决定积分成本、输入形态与提示词来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OperationKind {
    #[serde(rename = "text_to_image")]
    TextToImage,
    #[serde(rename = "edit_image")]
    EditImage,
    #[serde(rename = "edit_model")]
    EditModel,
    #[serde(rename = "multi_image")]
    MultiImage,
    #[serde(rename = "remove_background")]
    RemoveBackground,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::TextToImage => "text_to_image",
            OperationKind::EditImage => "edit_image",
            OperationKind::EditModel => "edit_model",
            OperationKind::MultiImage => "multi_image",
            OperationKind::RemoveBackground => "remove_background",
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for OperationKind {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OperationKind {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "text_to_image" => Ok(OperationKind::TextToImage),
            "edit_image" => Ok(OperationKind::EditImage),
            "edit_model" => Ok(OperationKind::EditModel),
            "multi_image" => Ok(OperationKind::MultiImage),
            "remove_background" => Ok(OperationKind::RemoveBackground),
            _ => Err(format!("Invalid operation kind: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for OperationKind {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// 生成服务回调携带的状态，在边界处解码为封闭枚举
///
/// 未识别的取值归入 `Other`，按中间态忽略并直接确认回调，保证前向兼容。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Ready,
    Error,
    ContentModerated,
    RequestModerated,
    Other(String),
}

impl ProviderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Ready" => ProviderStatus::Ready,
            "Error" => ProviderStatus::Error,
            "Content Moderated" => ProviderStatus::ContentModerated,
            "Request Moderated" => ProviderStatus::RequestModerated,
            other => ProviderStatus::Other(other.to_string()),
        }
    }

    pub fn is_moderated(&self) -> bool {
        matches!(
            self,
            ProviderStatus::ContentModerated | ProviderStatus::RequestModerated
        )
    }
}

/// 提示词优化管道的输出，四项全部写入审计日志，final prompt 进入派发
#[derive(Debug, Clone)]
pub struct OptimizedPrompt {
    pub improved_prompt: String,
    pub intent: String,
    pub avg_similarity: f64,
    pub matched_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_status_parse_closed_set() {
        assert_eq!(ProviderStatus::parse("Ready"), ProviderStatus::Ready);
        assert_eq!(ProviderStatus::parse("Error"), ProviderStatus::Error);
        assert_eq!(
            ProviderStatus::parse("Content Moderated"),
            ProviderStatus::ContentModerated
        );
        assert_eq!(
            ProviderStatus::parse("Request Moderated"),
            ProviderStatus::RequestModerated
        );
    }

    #[test]
    fn test_provider_status_unknown_is_other() {
        let status = ProviderStatus::parse("Task not found");
        assert_eq!(status, ProviderStatus::Other("Task not found".to_string()));
        assert!(!status.is_moderated());
    }

    #[test]
    fn test_operation_kind_codes() {
        assert_eq!(OperationKind::MultiImage.as_str(), "multi_image");
        assert_eq!(
            serde_json::from_str::<OperationKind>("\"remove_background\"").unwrap(),
            OperationKind::RemoveBackground
        );
    }
}
