use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use atelier_errors::{AtelierError, AtelierResult};

use crate::MAX_IMAGE_BYTES;

/// 入站图像载荷：已剥离 data-URL 前缀的原始字节与推断出的 MIME
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// 剥离 `data:image/...;base64,` 前缀，返回纯 base64 与 MIME
pub fn strip_data_url(input: &str) -> (String, String) {
    let trimmed = input.trim();
    if let Some(rest) = trimmed.strip_prefix("data:image/") {
        if let Some((subtype, payload)) = rest.split_once(";base64,") {
            if !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphanumeric()) {
                return (
                    payload.to_string(),
                    format!("image/{}", subtype.to_ascii_lowercase()),
                );
            }
        }
    }
    (trimmed.to_string(), "image/jpeg".to_string())
}

/// 解码单张图像载荷并执行大小上限校验
///
/// 过短的 base64 视为损坏；解码后超过约 10 MB 直接拒绝，
/// 两类失败都发生在任何外部调用之前。
pub fn decode_image_payload(input: &str) -> AtelierResult<ImagePayload> {
    let (base64_str, mime_type) = strip_data_url(input);
    if base64_str.len() < 100 {
        return Err(AtelierError::invalid_image("图像无效或 base64 已损坏"));
    }

    let estimated = base64_str.len() * 3 / 4;
    if estimated > MAX_IMAGE_BYTES {
        return Err(AtelierError::invalid_image("图像过大，上限约为 10 MB"));
    }

    let bytes = BASE64
        .decode(base64_str.as_bytes())
        .map_err(|_| AtelierError::invalid_image("图像无效或 base64 已损坏"))?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AtelierError::invalid_image("图像过大，上限约为 10 MB"));
    }

    Ok(ImagePayload { bytes, mime_type })
}

/// 批量解码，失败信息携带 1 起始的图像序号
pub fn decode_image_batch(inputs: &[String]) -> AtelierResult<Vec<ImagePayload>> {
    let mut payloads = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let payload = decode_image_payload(input).map_err(|err| match err {
            AtelierError::InvalidImage(msg) => {
                AtelierError::invalid_image(format!("图像 {}: {msg}", index + 1))
            }
            other => other,
        })?;
        payloads.push(payload);
    }
    Ok(payloads)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_base64(len: usize) -> String {
        BASE64.encode(vec![0u8; len])
    }

    #[test]
    fn test_strip_data_url_prefix() {
        let (b64, mime) = strip_data_url("data:image/png;base64,AAAA");
        assert_eq!(b64, "AAAA");
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn test_strip_plain_base64_defaults_to_jpeg() {
        let (b64, mime) = strip_data_url("  QUJD  ");
        assert_eq!(b64, "QUJD");
        assert_eq!(mime, "image/jpeg");
    }

    #[test]
    fn test_short_payload_rejected() {
        let err = decode_image_payload("QUJD").unwrap_err();
        assert!(matches!(err, AtelierError::InvalidImage(_)));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let input = valid_base64(MAX_IMAGE_BYTES + 1024);
        let err = decode_image_payload(&input).unwrap_err();
        assert!(format!("{err}").contains("10 MB"));
    }

    #[test]
    fn test_batch_error_names_one_based_index() {
        let inputs = vec![
            valid_base64(4096),
            valid_base64(MAX_IMAGE_BYTES + 1024),
            valid_base64(4096),
        ];
        let err = decode_image_batch(&inputs).unwrap_err();
        assert!(format!("{err}").contains("图像 2"));
    }

    #[test]
    fn test_batch_decodes_all() {
        let inputs = vec![valid_base64(4096), valid_base64(8192)];
        let payloads = decode_image_batch(&inputs).unwrap();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].bytes.len(), 4096);
    }
}
