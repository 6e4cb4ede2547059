//! HTTP 层端到端行为：认证、校验、状态码映射与回调确认

use std::io::Cursor;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use atelier_api::{create_routes, AppState};
use atelier_dispatcher::{
    BackgroundRemovalFlow, CompletionHandler, CreditLedgerGateway, JobDispatcher,
    SubmissionPipeline,
};
use atelier_domain::entities::EditStatus;
use atelier_domain::ports::SubmitOutcome;
use atelier_optimizer::PromptOptimizer;
use atelier_testing_utils::{
    EditBuilder, FakeAuth, FakeLanguageModel, FakeLedger, FakeProvider, FakeRemoval, FakeRetrieval,
    FakeStorage, MemoryEditRepository, MemoryOptimizationLogRepository,
    MemoryProviderTaskRepository, MemoryTemplateRepository, TaskBuilder,
};

const TOKEN: &str = "session-token-1";

struct World {
    edits: MemoryEditRepository,
    tasks: MemoryProviderTaskRepository,
    ledger: FakeLedger,
    provider: FakeProvider,
    removal: FakeRemoval,
    storage: FakeStorage,
    user_id: Uuid,
}

impl World {
    fn new() -> Self {
        let user_id = Uuid::new_v4();
        let provider = FakeProvider::accepting("task-1");
        let removal = FakeRemoval::returning("https://removal.test/out.png");
        provider.put_asset("https://removal.test/out.png", vec![0x89, 0x50, 0x4e, 0x47]);
        Self {
            edits: MemoryEditRepository::new(),
            tasks: MemoryProviderTaskRepository::new(),
            ledger: FakeLedger::with_balance(user_id, 100),
            provider,
            removal,
            storage: FakeStorage::new(),
            user_id,
        }
    }

    fn router(&self) -> Router {
        let edits: Arc<MemoryEditRepository> = Arc::new(self.edits.clone());
        let tasks: Arc<MemoryProviderTaskRepository> = Arc::new(self.tasks.clone());
        let provider: Arc<FakeProvider> = Arc::new(self.provider.clone());
        let storage: Arc<FakeStorage> = Arc::new(self.storage.clone());
        let ledger_port: Arc<FakeLedger> = Arc::new(self.ledger.clone());

        let optimizer = Arc::new(PromptOptimizer::new(
            Arc::new(FakeLanguageModel::scripted(
                "translated",
                "general_edit",
                "improved prompt",
            )),
            Arc::new(FakeRetrieval::new()),
        ));
        let gateway = CreditLedgerGateway::new(edits.clone(), ledger_port.clone());
        let dispatcher = JobDispatcher::new(
            provider.clone(),
            edits.clone(),
            tasks.clone(),
            "https://api.test/webhooks/provider".to_string(),
        );
        let pipeline = SubmissionPipeline::new(
            optimizer,
            gateway.clone(),
            dispatcher,
            Arc::new(MemoryOptimizationLogRepository::new()),
            Arc::new(MemoryTemplateRepository::default()),
        );
        let removal_flow = BackgroundRemovalFlow::new(
            Arc::new(self.removal.clone()),
            provider.clone(),
            storage.clone(),
            tasks.clone(),
            edits.clone(),
            gateway,
        );
        let completion = CompletionHandler::new(
            tasks.clone(),
            edits.clone(),
            ledger_port,
            provider,
            storage,
        );

        create_routes(AppState {
            pipeline,
            removal: removal_flow,
            completion,
            auth: Arc::new(FakeAuth::with_token(TOKEN, self.user_id)),
        })
    }
}

fn png_base64(width: u32, height: u32) -> String {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 255) as u8, (y % 255) as u8, 64])
    });
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    BASE64.encode(&out)
}

fn authed_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn anonymous_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let world = World::new();
    let response = world
        .router()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_bearer_is_401() {
    let world = World::new();
    let response = world
        .router()
        .oneshot(anonymous_post(
            "/api/edits/generate",
            json!({"user_prompt": "um gato", "width": 1024, "height": 768}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(world.ledger.debits().len(), 0);
}

#[tokio::test]
async fn test_unknown_token_is_401() {
    let world = World::new();
    let request = Request::builder()
        .method("POST")
        .uri("/api/edits/generate")
        .header("authorization", "Bearer wrong-token")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"user_prompt": "um gato", "width": 1024, "height": 768}).to_string(),
        ))
        .unwrap();

    let response = world.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_generate_returns_task_id_and_floors_dimensions() {
    let world = World::new();
    let response = world
        .router()
        .oneshot(authed_post(
            "/api/edits/generate",
            json!({"user_prompt": "um gato laranja", "width": 1000, "height": 760}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["task_id"], "task-1");

    let submissions = world.provider.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].width, 992);
    assert_eq!(submissions[0].height, 752);
    assert_eq!(world.ledger.balance(world.user_id), 95);
}

#[tokio::test]
async fn test_generate_blank_prompt_is_422() {
    let world = World::new();
    let response = world
        .router()
        .oneshot(authed_post(
            "/api/edits/generate",
            json!({"user_prompt": "   ", "width": 1024, "height": 768}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(world.ledger.debits().len(), 0);
}

#[tokio::test]
async fn test_generate_missing_dimensions_is_422() {
    let world = World::new();
    let response = world
        .router()
        .oneshot(authed_post(
            "/api/edits/generate",
            json!({"user_prompt": "um gato"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(world.provider.submissions().len(), 0);
}

#[tokio::test]
async fn test_multi_image_count_bounds() {
    let world = World::new();
    let router = world.router();

    let response = router
        .clone()
        .oneshot(authed_post(
            "/api/edits/multi",
            json!({"user_prompt": "combine", "images": [], "width": 512, "height": 512}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let too_many: Vec<String> = (0..9).map(|_| png_base64(32, 32)).collect();
    let response = router
        .oneshot(authed_post(
            "/api/edits/multi",
            json!({"user_prompt": "combine", "images": too_many, "width": 512, "height": 512}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(world.ledger.debits().len(), 0);
}

#[tokio::test]
async fn test_insufficient_credits_is_402() {
    let world = World::new();
    world.ledger.set_balance(world.user_id, 3);

    let response = world
        .router()
        .oneshot(authed_post(
            "/api/edits/generate",
            json!({"user_prompt": "um gato", "width": 1024, "height": 768}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(world.ledger.balance(world.user_id), 3);
}

#[tokio::test]
async fn test_template_not_found_is_404() {
    let world = World::new();
    let response = world
        .router()
        .oneshot(authed_post(
            "/api/edits/edit-with-template",
            json!({"template_id": Uuid::new_v4(), "image_base64": png_base64(64, 64)}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(world.ledger.debits().len(), 0);
}

#[tokio::test]
async fn test_provider_rejection_status_passes_through() {
    let mut world = World::new();
    world.provider = FakeProvider::new();
    world.provider.push_outcome(SubmitOutcome::Rejected {
        status: 429,
        body: "rate limited".to_string(),
    });

    let response = world
        .router()
        .oneshot(authed_post(
            "/api/edits/edit",
            json!({"user_prompt": "troque o céu", "image_base64": png_base64(64, 64)}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await;
    assert_eq!(body["error"], "请求过于频繁，请稍后再试");
    // 派发失败已退款
    assert_eq!(world.ledger.balance(world.user_id), 100);
}

#[tokio::test]
async fn test_remove_background_completes_synchronously() {
    let world = World::new();
    let response = world
        .router()
        .oneshot(authed_post(
            "/api/edits/remove-background",
            json!({"image_base64": png_base64(64, 64)}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let task_id = body["task_id"].as_str().unwrap();
    assert!(Uuid::parse_str(task_id).is_ok());

    let edit = world.edits.all().into_iter().next().unwrap();
    assert_eq!(edit.status, EditStatus::Completed);
    assert_eq!(world.ledger.balance(world.user_id), 93);
}

#[tokio::test]
async fn test_webhook_without_id_is_400() {
    let world = World::new();
    let response = world
        .router()
        .oneshot(anonymous_post(
            "/webhooks/provider",
            json!({"status": "Ready"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_unknown_task_acknowledged() {
    let world = World::new();
    let response = world
        .router()
        .oneshot(anonymous_post(
            "/webhooks/provider",
            json!({"id": "no-such-task", "status": "Ready", "result": {"sample": "https://x/y.jpg"}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_error_refunds_and_acks() {
    let world = World::new();
    let edit = EditBuilder::new()
        .with_user(world.user_id)
        .with_credits(7)
        .with_task_id("task-9")
        .with_status(EditStatus::Pending)
        .build();
    let task = TaskBuilder::new("task-9")
        .with_user(world.user_id)
        .with_edit(edit.id)
        .build();
    let world = World {
        edits: MemoryEditRepository::with_edits(vec![edit.clone()]),
        tasks: MemoryProviderTaskRepository::with_tasks(vec![task]),
        ..world
    };

    let response = world
        .router()
        .oneshot(anonymous_post(
            "/webhooks/provider",
            json!({"id": "task-9", "status": "Error"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(world.ledger.refunds_for(edit.id).len(), 1);
    assert_eq!(
        world.edits.get(edit.id).unwrap().status,
        EditStatus::Failed
    );
}
