use async_trait::async_trait;

use atelier_errors::AtelierResult;

/// 一次异步生成任务的提交请求
///
/// 多图请求按位置挂到 `input_image`、`input_image_2`…字段上。
#[derive(Debug, Clone)]
pub struct ProviderSubmission {
    pub prompt: String,
    /// 已归一化的图像（base64），可为空（纯文生图）
    pub images: Vec<String>,
    pub width: u32,
    pub height: u32,
    /// 生成服务完成后回调的地址
    pub webhook_url: String,
}

/// 提交调用的结果映射，HTTP 层语义在端口实现中消化
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// 2xx 且带有任务 id
    Accepted { task_id: String },
    /// 2xx 但缺少任务 id，按 `MalformedUpstreamResponse` 处理
    MissingTaskId,
    /// 非 2xx，携带原始状态码与响应体
    Rejected { status: u16, body: String },
}

/// 异步图像生成服务端口
#[async_trait]
pub trait ImageProviderPort: Send + Sync {
    /// 单次同步提交，仅返回受理确认；实际生成经由回调完成。
    /// 传输层失败（连接不可达等）返回 `UpstreamUnavailable`。
    async fn submit(&self, request: &ProviderSubmission) -> AtelierResult<SubmitOutcome>;

    /// 下载回调中引用的生成结果
    async fn fetch_asset(&self, url: &str) -> AtelierResult<Vec<u8>>;
}

/// 同步背景移除服务端口
#[async_trait]
pub trait BackgroundRemovalPort: Send + Sync {
    /// 输入 data-URL 形式的图像，返回结果资源的下载地址。
    /// 服务侧拒绝映射为 `ProviderRejected`。
    async fn remove_background(&self, image_data_url: &str) -> AtelierResult<String>;
}
