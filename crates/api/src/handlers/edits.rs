use axum::extract::{Json, State};
use serde::Deserialize;
use uuid::Uuid;

use atelier_dispatcher::pipeline::{EditRequest, GenerateRequest, MultiRequest, TemplateRequest};
use atelier_errors::AtelierError;

use crate::{auth::CurrentUser, error::ApiResult, response::SubmissionResponse, routes::AppState};

/// 多图请求允许的参考图数量上限
const MAX_REFERENCE_IMAGES: usize = 8;

/// 文生图请求
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub user_prompt: String,
    pub image_context: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// 单图编辑请求
#[derive(Debug, Deserialize)]
pub struct EditBody {
    pub user_prompt: String,
    pub image_base64: String,
}

/// 模板编辑请求
#[derive(Debug, Deserialize)]
pub struct TemplateBody {
    pub template_id: Uuid,
    pub image_base64: String,
}

/// 多参考图合成请求
#[derive(Debug, Deserialize)]
pub struct MultiBody {
    pub user_prompt: String,
    pub images: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// 背景移除请求
#[derive(Debug, Deserialize)]
pub struct RemoveBackgroundBody {
    pub image_base64: String,
}

fn require_prompt(raw: &str) -> Result<String, AtelierError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AtelierError::validation("提示词不能为空"));
    }
    Ok(trimmed.to_string())
}

fn require_image(raw: &str) -> Result<(), AtelierError> {
    if raw.trim().is_empty() {
        return Err(AtelierError::validation("缺少图像数据"));
    }
    Ok(())
}

/// 输出尺寸校验：必填、向下对齐到 16 的倍数、对齐后仍不小于 64
fn require_dimensions(
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(u32, u32), AtelierError> {
    let (Some(width), Some(height)) = (width, height) else {
        return Err(AtelierError::validation("必须指定输出宽度与高度"));
    };
    Ok((aligned_dimension(width, "宽度")?, aligned_dimension(height, "高度")?))
}

fn aligned_dimension(value: u32, name: &str) -> Result<u32, AtelierError> {
    let aligned = value & !15;
    if aligned < 64 {
        return Err(AtelierError::validation(format!(
            "{name}无效：按 16 的倍数向下对齐后必须不小于 64"
        )));
    }
    Ok(aligned)
}

/// 文生图
pub async fn generate(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<GenerateBody>,
) -> ApiResult<SubmissionResponse> {
    let user_prompt = require_prompt(&body.user_prompt)?;
    let (width, height) = require_dimensions(body.width, body.height)?;
    let task_id = state
        .pipeline
        .generate(
            user.0,
            GenerateRequest {
                user_prompt,
                image_context: body.image_context,
                width,
                height,
            },
        )
        .await?;
    Ok(SubmissionResponse::new(task_id))
}

/// 单图编辑
pub async fn edit(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<EditBody>,
) -> ApiResult<SubmissionResponse> {
    let user_prompt = require_prompt(&body.user_prompt)?;
    require_image(&body.image_base64)?;
    let task_id = state
        .pipeline
        .edit(
            user.0,
            EditRequest {
                user_prompt,
                image_base64: body.image_base64,
            },
        )
        .await?;
    Ok(SubmissionResponse::new(task_id))
}

/// 模板编辑：提示词来自预置模板，不走用户提示词校验
pub async fn edit_with_template(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<TemplateBody>,
) -> ApiResult<SubmissionResponse> {
    require_image(&body.image_base64)?;
    let task_id = state
        .pipeline
        .edit_with_template(
            user.0,
            TemplateRequest {
                template_id: body.template_id,
                image_base64: body.image_base64,
            },
        )
        .await?;
    Ok(SubmissionResponse::new(task_id))
}

/// 多参考图合成
pub async fn multi(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<MultiBody>,
) -> ApiResult<SubmissionResponse> {
    let user_prompt = require_prompt(&body.user_prompt)?;
    if body.images.is_empty() || body.images.len() > MAX_REFERENCE_IMAGES {
        return Err(AtelierError::validation(format!(
            "参考图数量必须在 1 到 {MAX_REFERENCE_IMAGES} 之间"
        ))
        .into());
    }
    let (width, height) = require_dimensions(body.width, body.height)?;
    let task_id = state
        .pipeline
        .multi(
            user.0,
            MultiRequest {
                user_prompt,
                images: body.images,
                width,
                height,
            },
        )
        .await?;
    Ok(SubmissionResponse::new(task_id))
}

/// 背景移除（同步完成，响应时结果已落库）
pub async fn remove_background(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<RemoveBackgroundBody>,
) -> ApiResult<SubmissionResponse> {
    require_image(&body.image_base64)?;
    let task_id = state.removal.remove_background(user.0, &body.image_base64).await?;
    Ok(SubmissionResponse::new(task_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_alignment_floors_to_16() {
        assert_eq!(aligned_dimension(1000, "宽度").unwrap(), 992);
        assert_eq!(aligned_dimension(1024, "宽度").unwrap(), 1024);
        assert_eq!(aligned_dimension(79, "高度").unwrap(), 64);
    }

    #[test]
    fn test_dimension_below_floor_rejected() {
        assert!(aligned_dimension(63, "宽度").is_err());
        // 70 对齐后为 64，刚好合法；69 以下对齐到 64 仍合法，16~63 不合法
        assert!(aligned_dimension(16, "高度").is_err());
    }

    #[test]
    fn test_missing_dimensions_rejected() {
        assert!(require_dimensions(Some(512), None).is_err());
        assert!(require_dimensions(None, Some(512)).is_err());
        assert!(require_dimensions(Some(512), Some(768)).is_ok());
    }

    #[test]
    fn test_blank_prompt_rejected() {
        assert!(require_prompt("   ").is_err());
        assert_eq!(require_prompt(" céu azul ").unwrap(), "céu azul");
    }
}
