use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use atelier_api::{create_routes, AppState};
use atelier_dispatcher::{
    BackgroundRemovalFlow, CompletionHandler, CreditLedgerGateway, JobDispatcher,
    SubmissionPipeline,
};
use atelier_infrastructure::clients::{BucketStorageClient, FalClient, FluxClient, OpenAiClient};
use atelier_infrastructure::database::{
    create_pool, PostgresAuth, PostgresEditRepository, PostgresLedger,
    PostgresOptimizationLogRepository, PostgresProviderTaskRepository, PostgresRetrieval,
    PostgresTemplateRepository,
};
use atelier_infrastructure::AppConfig;
use atelier_optimizer::PromptOptimizer;

/// 主应用程序：装配所有组件并承载 HTTP 服务
pub struct Application {
    config: AppConfig,
    router: axum::Router,
}

impl Application {
    /// 创建应用实例：连接池、迁移、外部客户端与业务装配
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let pool = create_pool(&config.database)
            .await
            .context("创建数据库连接池失败")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("执行数据库迁移失败")?;

        let http = reqwest::Client::new();

        // 数据访问
        let edits = Arc::new(PostgresEditRepository::new(pool.clone()));
        let tasks = Arc::new(PostgresProviderTaskRepository::new(pool.clone()));
        let logs = Arc::new(PostgresOptimizationLogRepository::new(pool.clone()));
        let templates = Arc::new(PostgresTemplateRepository::new(pool.clone()));
        let ledger = Arc::new(PostgresLedger::new(pool.clone()));
        let retrieval = Arc::new(PostgresRetrieval::new(pool.clone()));
        let auth = Arc::new(PostgresAuth::new(pool));

        // 外部服务客户端
        let language_model = Arc::new(OpenAiClient::new(http.clone(), config.openai.clone()));
        let provider = Arc::new(FluxClient::new(http.clone(), config.provider.clone()));
        let removal = Arc::new(FalClient::new(http.clone(), config.removal.clone()));
        let storage = Arc::new(BucketStorageClient::new(http, config.storage.clone()));

        // 业务装配
        let optimizer = Arc::new(PromptOptimizer::new(language_model, retrieval));
        let gateway = CreditLedgerGateway::new(edits.clone(), ledger.clone());
        let dispatcher = JobDispatcher::new(
            provider.clone(),
            edits.clone(),
            tasks.clone(),
            config.webhook_url(),
        );
        let pipeline =
            SubmissionPipeline::new(optimizer, gateway.clone(), dispatcher, logs, templates);
        let removal_flow = BackgroundRemovalFlow::new(
            removal,
            provider.clone(),
            storage.clone(),
            tasks.clone(),
            edits.clone(),
            gateway,
        );
        let completion = CompletionHandler::new(tasks, edits, ledger, provider, storage);

        let router = create_routes(AppState {
            pipeline,
            removal: removal_flow,
            completion,
            auth,
        });

        Ok(Self { config, router })
    }

    /// 启动 HTTP 服务，直至收到关闭信号
    pub async fn run(self) -> Result<()> {
        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("监听地址失败: {addr}"))?;
        info!("HTTP 服务已启动: {addr}");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务运行失败")?;

        info!("HTTP 服务已优雅关闭");
        Ok(())
    }
}

/// 等待关闭信号
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("安装Ctrl+C信号处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("安装SIGTERM信号处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("收到关闭信号，开始优雅关闭...");
}
