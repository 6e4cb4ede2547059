use atelier_domain::value_objects::OperationKind;
use atelier_imaging::{MAX_MEGAPIXELS_MULTI, MAX_MEGAPIXELS_SINGLE};

/// 操作的积分成本
///
/// 多图操作按参考图数量累进：首张 7 分，之后每张 3 分。
pub fn credit_cost(kind: OperationKind, image_count: usize) -> i32 {
    match kind {
        OperationKind::TextToImage => 5,
        OperationKind::EditImage => 7,
        OperationKind::EditModel => 7,
        OperationKind::RemoveBackground => 7,
        OperationKind::MultiImage => 7 + (image_count.saturating_sub(1) as i32) * 3,
    }
}

/// 提交管道的逐操作参数，消除各操作间重复的编排代码
#[derive(Debug, Clone, Copy)]
pub struct OperationProfile {
    pub kind: OperationKind,
    /// 参考图归一化的百万像素预算
    pub image_budget_mp: f64,
}

impl OperationProfile {
    pub fn text_to_image() -> Self {
        Self {
            kind: OperationKind::TextToImage,
            image_budget_mp: MAX_MEGAPIXELS_SINGLE,
        }
    }

    pub fn edit_image() -> Self {
        Self {
            kind: OperationKind::EditImage,
            image_budget_mp: MAX_MEGAPIXELS_SINGLE,
        }
    }

    pub fn edit_model() -> Self {
        Self {
            kind: OperationKind::EditModel,
            image_budget_mp: MAX_MEGAPIXELS_SINGLE,
        }
    }

    /// 多图操作的预算取决于实际张数：仅一张参考图时仍享完整预算
    pub fn multi_image(image_count: usize) -> Self {
        Self {
            kind: OperationKind::MultiImage,
            image_budget_mp: if image_count > 1 {
                MAX_MEGAPIXELS_MULTI
            } else {
                MAX_MEGAPIXELS_SINGLE
            },
        }
    }
}
