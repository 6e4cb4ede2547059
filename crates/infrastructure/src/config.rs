use serde::Deserialize;

use atelier_errors::{AtelierError, AtelierResult};

/// 应用配置，全部来自环境变量（前缀 `ATELIER`，层级分隔符 `__`）
///
/// 例：`ATELIER__DATABASE__URL`、`ATELIER__PROVIDER__API_KEY`。
/// 必填项缺失在启动时失败；可选项取默认值。
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub openai: OpenAiConfig,
    pub provider: ProviderConfig,
    pub removal: RemovalConfig,
    pub storage: StorageConfig,
    /// 对外可达的回调基地址，拼接 `/webhooks/provider` 后下发给生成服务
    pub webhook_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemovalConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl AppConfig {
    pub fn from_env() -> AtelierResult<Self> {
        let raw = config::Config::builder()
            .add_source(config::Environment::with_prefix("ATELIER").separator("__"))
            .build()
            .map_err(|e| AtelierError::config_error(format!("配置加载失败: {e}")))?;
        raw.try_deserialize()
            .map_err(|e| AtelierError::config_error(format!("配置解析失败: {e}")))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn webhook_url(&self) -> String {
        format!(
            "{}/webhooks/provider",
            self.webhook_base_url.trim_end_matches('/')
        )
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    10
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_bucket() -> String {
    "atelier-images".to_string()
}
