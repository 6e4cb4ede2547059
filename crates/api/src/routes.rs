use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use atelier_dispatcher::{BackgroundRemovalFlow, CompletionHandler, SubmissionPipeline};
use atelier_domain::ports::AuthPort;

use crate::handlers::{
    edits::{edit, edit_with_template, generate, multi, remove_background},
    health::health_check,
    webhooks::provider_callback,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub pipeline: SubmissionPipeline,
    pub removal: BackgroundRemovalFlow,
    pub completion: CompletionHandler,
    pub auth: Arc<dyn AuthPort>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 提交操作
        .route("/api/edits/generate", post(generate))
        .route("/api/edits/edit", post(edit))
        .route("/api/edits/edit-with-template", post(edit_with_template))
        .route("/api/edits/multi", post(multi))
        .route("/api/edits/remove-background", post(remove_background))
        // 生成服务回调
        .route("/webhooks/provider", post(provider_callback))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
