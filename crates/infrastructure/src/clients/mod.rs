//! 出站 HTTP 客户端

pub mod fal_client;
pub mod flux_client;
pub mod openai_client;
pub mod storage_client;

pub use fal_client::FalClient;
pub use flux_client::FluxClient;
pub use openai_client::OpenAiClient;
pub use storage_client::BucketStorageClient;
