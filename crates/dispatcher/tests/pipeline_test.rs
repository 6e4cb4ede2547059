//! 提交管道端到端行为（内存假实现）

use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbImage};
use uuid::Uuid;

use atelier_dispatcher::pipeline::{EditRequest, GenerateRequest, MultiRequest, TemplateRequest};
use atelier_dispatcher::{CreditLedgerGateway, JobDispatcher, SubmissionPipeline};
use atelier_domain::entities::EditStatus;
use atelier_domain::ports::SubmitOutcome;
use atelier_errors::AtelierError;
use atelier_optimizer::PromptOptimizer;
use atelier_testing_utils::{
    FakeLanguageModel, FakeLedger, FakeProvider, FakeRetrieval, MemoryEditRepository,
    MemoryOptimizationLogRepository, MemoryProviderTaskRepository, MemoryTemplateRepository,
    TemplateBuilder,
};

struct World {
    edits: MemoryEditRepository,
    tasks: MemoryProviderTaskRepository,
    logs: MemoryOptimizationLogRepository,
    templates: MemoryTemplateRepository,
    ledger: FakeLedger,
    model: FakeLanguageModel,
    retrieval: FakeRetrieval,
    provider: FakeProvider,
    user_id: Uuid,
}

impl World {
    fn new() -> Self {
        let user_id = Uuid::new_v4();
        Self {
            edits: MemoryEditRepository::new(),
            tasks: MemoryProviderTaskRepository::new(),
            logs: MemoryOptimizationLogRepository::new(),
            templates: MemoryTemplateRepository::default(),
            ledger: FakeLedger::with_balance(user_id, 100),
            model: FakeLanguageModel::scripted("translated", "general_edit", "improved prompt"),
            retrieval: FakeRetrieval::new(),
            provider: FakeProvider::accepting("task-1"),
            user_id,
        }
    }

    fn with_templates(templates: Vec<atelier_domain::entities::Template>) -> Self {
        let mut world = Self::new();
        world.templates = MemoryTemplateRepository::with_templates(templates);
        world
    }

    fn pipeline(&self) -> SubmissionPipeline {
        let optimizer = Arc::new(PromptOptimizer::new(
            Arc::new(self.model.clone()),
            Arc::new(self.retrieval.clone()),
        ));
        let ledger = CreditLedgerGateway::new(
            Arc::new(self.edits.clone()),
            Arc::new(self.ledger.clone()),
        );
        let dispatcher = JobDispatcher::new(
            Arc::new(self.provider.clone()),
            Arc::new(self.edits.clone()),
            Arc::new(self.tasks.clone()),
            "https://example.test/webhooks/provider".to_string(),
        );
        SubmissionPipeline::new(
            optimizer,
            ledger,
            dispatcher,
            Arc::new(self.logs.clone()),
            Arc::new(self.templates.clone()),
        )
    }
}

fn png_base64(width: u32, height: u32) -> String {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 255) as u8, (y % 255) as u8, 128])
    });
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    BASE64.encode(&out)
}

fn oversized_base64() -> String {
    BASE64.encode(vec![0u8; 11 * 1024 * 1024])
}

#[tokio::test]
async fn test_edit_happy_path_charges_and_dispatches() {
    let world = World::new();
    let task_id = world
        .pipeline()
        .edit(
            world.user_id,
            EditRequest {
                user_prompt: "troque o céu".to_string(),
                image_base64: png_base64(640, 480),
            },
        )
        .await
        .unwrap();

    assert_eq!(task_id, "task-1");
    assert_eq!(world.ledger.balance(world.user_id), 93);

    let edit = world.edits.all().pop().unwrap();
    assert_eq!(edit.status, EditStatus::Pending);
    assert_eq!(edit.task_id.as_deref(), Some("task-1"));
    assert_eq!(edit.prompt_text, "improved prompt");
    assert_eq!(edit.credits_used, 7);
    assert_eq!(edit.mime_type.as_deref(), Some("image/jpeg"));

    let submissions = world.provider.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].images.len(), 1);
    assert_eq!(submissions[0].width % 16, 0);
    assert_eq!(submissions[0].prompt, "improved prompt");

    // 审计日志已写入
    let entries = world.logs.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].original_prompt, "troque o céu");
    assert_eq!(entries[0].metadata["source"], "edit_image");
}

#[tokio::test]
async fn test_insufficient_credits_leaves_no_row_and_no_submission() {
    let world = World::new();
    world.ledger.set_balance(world.user_id, 3);

    let err = world
        .pipeline()
        .edit(
            world.user_id,
            EditRequest {
                user_prompt: "edit".to_string(),
                image_base64: png_base64(320, 240),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AtelierError::InsufficientCredits));
    assert_eq!(world.edits.count(), 0);
    assert!(world.provider.submissions().is_empty());
    assert_eq!(world.ledger.balance(world.user_id), 3);
}

#[tokio::test]
async fn test_rejected_dispatch_refunds_exactly_once() {
    let world = World::new();
    world.ledger.set_balance(world.user_id, 10);
    let provider = FakeProvider::new();
    provider.push_outcome(SubmitOutcome::Rejected {
        status: 429,
        body: String::new(),
    });
    let world = World {
        provider,
        ..world
    };

    let err = world
        .pipeline()
        .edit(
            world.user_id,
            EditRequest {
                user_prompt: "edit".to_string(),
                image_base64: png_base64(320, 240),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AtelierError::ProviderRejected { status: 429, .. }));
    // 恰好一次退款，金额等于扣款额，余额复原
    let edit = world.edits.all().pop().unwrap();
    assert_eq!(edit.status, EditStatus::Failed);
    assert_eq!(world.ledger.refunds_for(edit.id).len(), 1);
    assert_eq!(world.ledger.refunds_for(edit.id)[0].1, 7);
    assert_eq!(world.ledger.balance(world.user_id), 10);
}

#[tokio::test]
async fn test_missing_task_id_refunds_and_fails() {
    let mut world = World::new();
    world.provider = FakeProvider::new();
    world.provider.push_outcome(SubmitOutcome::MissingTaskId);

    let err = world
        .pipeline()
        .edit(
            world.user_id,
            EditRequest {
                user_prompt: "edit".to_string(),
                image_base64: png_base64(320, 240),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AtelierError::MalformedUpstreamResponse));
    let edit = world.edits.all().pop().unwrap();
    assert_eq!(edit.status, EditStatus::Failed);
    assert_eq!(world.ledger.balance(world.user_id), 100);
}

#[tokio::test]
async fn test_multi_oversized_image_rejected_before_external_calls() {
    let world = World::new();
    let err = world
        .pipeline()
        .multi(
            world.user_id,
            MultiRequest {
                user_prompt: "combine".to_string(),
                images: vec![png_base64(320, 240), oversized_base64(), png_base64(320, 240)],
                width: 1024,
                height: 768,
            },
        )
        .await
        .unwrap_err();

    // 错误点名 1 起始的序号，且尚未发生任何外部调用或扣款
    assert!(format!("{err}").contains("图像 2"));
    assert!(world.model.chat_calls().is_empty());
    assert!(world.ledger.debits().is_empty());
    assert!(world.provider.submissions().is_empty());
}

#[tokio::test]
async fn test_multi_cost_scales_with_image_count() {
    let world = World::new();
    world
        .pipeline()
        .multi(
            world.user_id,
            MultiRequest {
                user_prompt: "combine".to_string(),
                images: vec![png_base64(320, 240), png_base64(300, 200), png_base64(256, 256)],
                width: 1024,
                height: 768,
            },
        )
        .await
        .unwrap();

    // 7 + 2*3 = 13
    assert_eq!(world.ledger.balance(world.user_id), 87);
    let submissions = world.provider.submissions();
    assert_eq!(submissions[0].images.len(), 3);
    assert_eq!(submissions[0].width, 1024);
    assert_eq!(submissions[0].height, 768);
}

#[tokio::test]
async fn test_generate_submits_without_images() {
    let world = World::new();
    world
        .pipeline()
        .generate(
            world.user_id,
            GenerateRequest {
                user_prompt: "um castelo".to_string(),
                image_context: None,
                width: 1024,
                height: 768,
            },
        )
        .await
        .unwrap();

    assert_eq!(world.ledger.balance(world.user_id), 95);
    let submissions = world.provider.submissions();
    assert!(submissions[0].images.is_empty());
    let edit = world.edits.all().pop().unwrap();
    assert_eq!(edit.credits_used, 5);
}

#[tokio::test]
async fn test_template_not_found_charges_nothing() {
    let world = World::new();
    let err = world
        .pipeline()
        .edit_with_template(
            world.user_id,
            TemplateRequest {
                template_id: Uuid::new_v4(),
                image_base64: png_base64(320, 240),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AtelierError::NotFound(_)));
    assert!(world.ledger.debits().is_empty());
    assert_eq!(world.edits.count(), 0);
}

#[tokio::test]
async fn test_template_prompt_combines_default_and_caption() {
    let template = TemplateBuilder::new()
        .with_prompt("Studio portrait, soft lighting")
        .build();
    let template_id = template.id;
    let world = World::with_templates(vec![template]);
    world
        .model
        .set_vision(Ok("A person standing in a park.".to_string()));

    world
        .pipeline()
        .edit_with_template(
            world.user_id,
            TemplateRequest {
                template_id,
                image_base64: png_base64(320, 240),
            },
        )
        .await
        .unwrap();

    let edit = world.edits.all().pop().unwrap();
    assert_eq!(
        edit.prompt_text,
        "Studio portrait, soft lighting\n\nImage context: A person standing in a park."
    );
    assert_eq!(edit.credits_used, 7);
    // 模板流程不经过优化管道
    assert!(world.model.chat_calls().is_empty());
}

#[tokio::test]
async fn test_inactive_template_is_not_found() {
    let template = TemplateBuilder::new().inactive().build();
    let template_id = template.id;
    let world = World::with_templates(vec![template]);

    let err = world
        .pipeline()
        .edit_with_template(
            world.user_id,
            TemplateRequest {
                template_id,
                image_base64: png_base64(320, 240),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AtelierError::NotFound(_)));
}

#[tokio::test]
async fn test_caption_failure_aborts_before_any_charge() {
    let world = World::new();
    world
        .model
        .set_vision(Err(AtelierError::upstream("vision 服务不可用")));

    let err = world
        .pipeline()
        .edit(
            world.user_id,
            EditRequest {
                user_prompt: "edit".to_string(),
                image_base64: png_base64(320, 240),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AtelierError::UpstreamUnavailable(_)));
    assert!(world.ledger.debits().is_empty());
    assert_eq!(world.edits.count(), 0);
}

#[tokio::test]
async fn test_audit_log_failure_does_not_block_submission() {
    let world = World::new();
    world.logs.fail_inserts();

    let task_id = world
        .pipeline()
        .edit(
            world.user_id,
            EditRequest {
                user_prompt: "edit".to_string(),
                image_base64: png_base64(320, 240),
            },
        )
        .await
        .unwrap();

    assert_eq!(task_id, "task-1");
    assert!(world.logs.entries().is_empty());
    assert_eq!(world.ledger.balance(world.user_id), 93);
}

#[tokio::test]
async fn test_multi_single_image_keeps_full_budget() {
    let world = World::new();
    world
        .pipeline()
        .multi(
            world.user_id,
            MultiRequest {
                user_prompt: "combine".to_string(),
                images: vec![png_base64(1920, 1080)],
                width: 1024,
                height: 768,
            },
        )
        .await
        .unwrap();

    // 单张参考图仍按 1.5MP 预算归一化
    let submissions = world.provider.submissions();
    let bytes = BASE64.decode(&submissions[0].images[0]).unwrap();
    let normalized = image::load_from_memory(&bytes).unwrap();
    assert_eq!((normalized.width(), normalized.height()), (1632, 912));
}

#[tokio::test]
async fn test_multi_several_images_use_reduced_budget() {
    let world = World::new();
    world
        .pipeline()
        .multi(
            world.user_id,
            MultiRequest {
                user_prompt: "combine".to_string(),
                images: vec![png_base64(1920, 1080), png_base64(1920, 1080)],
                width: 1024,
                height: 768,
            },
        )
        .await
        .unwrap();

    // 两张及以上按 1.0MP 预算归一化
    let submissions = world.provider.submissions();
    for encoded in &submissions[0].images {
        let bytes = BASE64.decode(encoded).unwrap();
        let normalized = image::load_from_memory(&bytes).unwrap();
        assert_eq!((normalized.width(), normalized.height()), (1328, 736));
    }
}
