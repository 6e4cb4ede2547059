//! 图像归一化
//!
//! 将入站图像压到生成服务的像素预算之内，并满足其对齐规则：
//! 宽高各自为 16 的倍数、硬下限 64px。纯函数实现，无共享状态，
//! 多图请求中逐图归一化可安全并行。

pub mod normalizer;
pub mod payload;

pub use normalizer::*;
pub use payload::*;

/// 单图请求的像素预算（百万像素）
pub const MAX_MEGAPIXELS_SINGLE: f64 = 1.5;
/// 多图请求中每张参考图的像素预算，比单图更紧
pub const MAX_MEGAPIXELS_MULTI: f64 = 1.0;
/// 输出统一重编码为 JPEG 的质量
pub const JPEG_QUALITY: u8 = 90;
/// 生成服务的对齐规则：尺寸必须是 16 的倍数
pub const ALIGNMENT: u32 = 16;
/// 尺寸硬下限
pub const MIN_DIMENSION: u32 = 64;
/// 解码后单张图像的字节上限（约 10 MB）
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
