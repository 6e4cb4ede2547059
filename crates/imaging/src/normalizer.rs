use std::io::Cursor;
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Limits};

use atelier_errors::{AtelierError, AtelierResult};

use crate::{ALIGNMENT, JPEG_QUALITY, MIN_DIMENSION};

/// 归一化结果：重编码后的 JPEG 与最终尺寸
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub base64: String,
    pub width: u32,
    pub height: u32,
    pub file_size: i64,
}

/// 解码器的进程级资源限制，首个调用方触发构建，之后复用同一份。
/// 一次性门闩代替可变布尔标志，冷启动并发下不会重复初始化。
fn decoder_limits() -> &'static Limits {
    static LIMITS: OnceLock<Limits> = OnceLock::new();
    LIMITS.get_or_init(|| {
        let mut limits = Limits::default();
        limits.max_image_width = Some(16_384);
        limits.max_image_height = Some(16_384);
        // 解码缓冲上限，防御构造出的超大画布
        limits.max_alloc = Some(512 * 1024 * 1024);
        limits
    })
}

fn floor_align(value: u32) -> u32 {
    value & !(ALIGNMENT - 1)
}

/// 像素预算约束求解：返回满足预算、对齐与下限的目标尺寸
///
/// 超出预算时按 `sqrt(budget/total)` 缩小并向下对齐到 16 的倍数；
/// 任一边低于 64 时按 `max(64/w, 64/h)` 放大后再对齐，64 为硬下限。
pub fn solve_dimensions(width: u32, height: u32, max_megapixels: f64) -> (u32, u32) {
    let total = width as f64 * height as f64;
    let max_pixels = max_megapixels * 1_000_000.0;

    let mut new_w = width;
    let mut new_h = height;

    if total > max_pixels {
        let scale = (max_pixels / total).sqrt();
        new_w = floor_align((width as f64 * scale).floor() as u32).max(MIN_DIMENSION);
        new_h = floor_align((height as f64 * scale).floor() as u32).max(MIN_DIMENSION);
    }

    if new_w < MIN_DIMENSION || new_h < MIN_DIMENSION {
        let scale_up = (MIN_DIMENSION as f64 / new_w as f64)
            .max(MIN_DIMENSION as f64 / new_h as f64);
        new_w = floor_align((new_w as f64 * scale_up).floor() as u32).max(MIN_DIMENSION);
        new_h = floor_align((new_h as f64 * scale_up).floor() as u32).max(MIN_DIMENSION);
    }

    (new_w, new_h)
}

fn decode(bytes: &[u8]) -> AtelierResult<DynamicImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AtelierError::invalid_image(format!("无法识别图像格式: {e}")))?;
    reader.limits(decoder_limits().clone());
    reader
        .decode()
        .map_err(|e| AtelierError::invalid_image(format!("图像解码失败: {e}")))
}

/// 归一化一张图像：解码、按预算缩放、对齐、重编码为 JPEG
///
/// 纯函数，调用方可对一批图像并行调用。
pub fn normalize_to_budget(bytes: &[u8], max_megapixels: f64) -> AtelierResult<NormalizedImage> {
    let img = decode(bytes)?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(AtelierError::invalid_image("图像尺寸无效"));
    }

    let (new_w, new_h) = solve_dimensions(width, height, max_megapixels);
    let resized = if (new_w, new_h) == (width, height) {
        img
    } else {
        img.resize_exact(new_w, new_h, FilterType::Lanczos3)
    };

    let rgb = resized.to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .map_err(|e| AtelierError::processing_failed(format!("JPEG 编码失败: {e}")))?;

    if new_w < MIN_DIMENSION || new_h < MIN_DIMENSION || out.is_empty() {
        return Err(AtelierError::processing_failed(
            "输出图像不满足最小尺寸要求",
        ));
    }

    let file_size = out.len() as i64;
    Ok(NormalizedImage {
        base64: BASE64.encode(&out),
        width: new_w,
        height: new_h,
        file_size,
    })
}
