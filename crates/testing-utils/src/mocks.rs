//! In-memory fake implementations for repository traits and outbound ports.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use atelier_domain::entities::{
    Edit, EditStatus, NewEdit, NewProviderTask, OptimizationLog, ProviderTask, Template,
    TaskStatus,
};
use atelier_domain::ports::{
    AuthPort, BackgroundRemovalPort, ImageProviderPort, LanguageModelPort, LedgerPort,
    ObjectStoragePort, ProviderSubmission, RetrievalPort, RetrievedChunk, SubmitOutcome,
};
use atelier_domain::repositories::{
    EditRepository, OptimizationLogRepository, ProviderTaskRepository, TemplateRepository,
};
use atelier_errors::{AtelierError, AtelierResult};

/// In-memory EditRepository
#[derive(Debug, Clone, Default)]
pub struct MemoryEditRepository {
    edits: Arc<Mutex<HashMap<Uuid, Edit>>>,
}

impl MemoryEditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edits(edits: Vec<Edit>) -> Self {
        let map = edits.into_iter().map(|e| (e.id, e)).collect();
        Self {
            edits: Arc::new(Mutex::new(map)),
        }
    }

    pub fn count(&self) -> usize {
        self.edits.lock().unwrap().len()
    }

    pub fn get(&self, id: Uuid) -> Option<Edit> {
        self.edits.lock().unwrap().get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Edit> {
        self.edits.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl EditRepository for MemoryEditRepository {
    async fn create(&self, edit: &NewEdit) -> AtelierResult<Edit> {
        let now = Utc::now();
        let metadata = edit.metadata.clone().unwrap_or_default();
        let created = Edit {
            id: Uuid::new_v4(),
            user_id: edit.user_id,
            operation: edit.operation,
            prompt_text: edit.prompt_text.clone(),
            credits_used: edit.credits_used,
            task_id: edit.task_id.clone(),
            status: EditStatus::Queued,
            image_url: None,
            ai_processing_time_ms: None,
            file_size: metadata.file_size,
            mime_type: metadata.mime_type,
            width: metadata.width,
            height: metadata.height,
            created_at: now,
            updated_at: now,
        };
        self.edits.lock().unwrap().insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> AtelierResult<Option<Edit>> {
        Ok(self.edits.lock().unwrap().get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> AtelierResult<bool> {
        Ok(self.edits.lock().unwrap().remove(&id).is_some())
    }

    async fn set_task_id(&self, id: Uuid, task_id: &str) -> AtelierResult<()> {
        let mut edits = self.edits.lock().unwrap();
        if let Some(edit) = edits.get_mut(&id) {
            edit.task_id = Some(task_id.to_string());
            edit.status = EditStatus::Pending;
            edit.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid) -> AtelierResult<()> {
        let mut edits = self.edits.lock().unwrap();
        if let Some(edit) = edits.get_mut(&id) {
            edit.status = EditStatus::Failed;
            edit.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        image_url: &str,
        ai_processing_time_ms: i64,
    ) -> AtelierResult<()> {
        let mut edits = self.edits.lock().unwrap();
        if let Some(edit) = edits.get_mut(&id) {
            edit.status = EditStatus::Completed;
            edit.image_url = Some(image_url.to_string());
            edit.ai_processing_time_ms = Some(ai_processing_time_ms);
            edit.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// In-memory ProviderTaskRepository keyed by external task id
#[derive(Debug, Clone, Default)]
pub struct MemoryProviderTaskRepository {
    tasks: Arc<Mutex<HashMap<String, ProviderTask>>>,
    fail_insert: Arc<Mutex<bool>>,
    fail_mark_ready: Arc<Mutex<bool>>,
}

impl MemoryProviderTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<ProviderTask>) -> Self {
        let map = tasks.into_iter().map(|t| (t.task_id.clone(), t)).collect();
        Self {
            tasks: Arc::new(Mutex::new(map)),
            fail_insert: Arc::new(Mutex::new(false)),
            fail_mark_ready: Arc::new(Mutex::new(false)),
        }
    }

    pub fn fail_next_insert(&self) {
        *self.fail_insert.lock().unwrap() = true;
    }

    pub fn fail_next_mark_ready(&self) {
        *self.fail_mark_ready.lock().unwrap() = true;
    }

    pub fn get(&self, task_id: &str) -> Option<ProviderTask> {
        self.tasks.lock().unwrap().get(task_id).cloned()
    }

    pub fn count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

#[async_trait]
impl ProviderTaskRepository for MemoryProviderTaskRepository {
    async fn insert_pending(&self, task: &NewProviderTask) -> AtelierResult<ProviderTask> {
        if std::mem::take(&mut *self.fail_insert.lock().unwrap()) {
            return Err(AtelierError::persistence("simulated insert failure"));
        }
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.contains_key(&task.task_id) {
            return Err(AtelierError::persistence("duplicate task id"));
        }
        let now = Utc::now();
        let created = ProviderTask {
            task_id: task.task_id.clone(),
            user_id: task.user_id,
            edit_id: task.edit_id,
            status: TaskStatus::Pending,
            image_url: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        tasks.insert(created.task_id.clone(), created.clone());
        Ok(created)
    }

    async fn find_by_task_id(&self, task_id: &str) -> AtelierResult<Option<ProviderTask>> {
        Ok(self.tasks.lock().unwrap().get(task_id).cloned())
    }

    async fn mark_ready(&self, task_id: &str, image_url: &str) -> AtelierResult<()> {
        if std::mem::take(&mut *self.fail_mark_ready.lock().unwrap()) {
            return Err(AtelierError::persistence("simulated mark_ready failure"));
        }
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.get_mut(task_id) {
            task.status = TaskStatus::Ready;
            task.image_url = Some(image_url.to_string());
            task.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_error(&self, task_id: &str, error_message: &str) -> AtelierResult<()> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.get_mut(task_id) {
            task.status = TaskStatus::Error;
            task.error_message = Some(error_message.to_string());
            task.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// In-memory append-only optimization log; can be told to fail
#[derive(Debug, Clone, Default)]
pub struct MemoryOptimizationLogRepository {
    entries: Arc<Mutex<Vec<OptimizationLog>>>,
    fail: Arc<Mutex<bool>>,
}

impl MemoryOptimizationLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn entries(&self) -> Vec<OptimizationLog> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl OptimizationLogRepository for MemoryOptimizationLogRepository {
    async fn insert(&self, entry: &OptimizationLog) -> AtelierResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(AtelierError::persistence("simulated log failure"));
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// In-memory TemplateRepository
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateRepository {
    templates: Arc<Mutex<HashMap<Uuid, Template>>>,
}

impl MemoryTemplateRepository {
    pub fn with_templates(templates: Vec<Template>) -> Self {
        let map = templates.into_iter().map(|t| (t.id, t)).collect();
        Self {
            templates: Arc::new(Mutex::new(map)),
        }
    }
}

#[async_trait]
impl TemplateRepository for MemoryTemplateRepository {
    async fn find_active(&self, id: Uuid) -> AtelierResult<Option<Template>> {
        Ok(self
            .templates
            .lock()
            .unwrap()
            .get(&id)
            .filter(|t| t.active)
            .cloned())
    }
}

/// Fake credit ledger with real balance arithmetic and call recording.
///
/// Debits that would overdraw leave the balance untouched, mirroring the
/// external ledger's contract. Every call is recorded so tests can assert
/// "exactly one refund of exactly the charged amount".
#[derive(Debug, Clone, Default)]
pub struct FakeLedger {
    balances: Arc<Mutex<HashMap<Uuid, i32>>>,
    debits: Arc<Mutex<Vec<(Uuid, i32, Uuid)>>>,
    refunds: Arc<Mutex<Vec<(Uuid, i32, Uuid)>>>,
    fail_debits: Arc<Mutex<bool>>,
    fail_refunds: Arc<Mutex<bool>>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(user_id: Uuid, credits: i32) -> Self {
        let ledger = Self::default();
        ledger.set_balance(user_id, credits);
        ledger
    }

    pub fn set_balance(&self, user_id: Uuid, credits: i32) {
        self.balances.lock().unwrap().insert(user_id, credits);
    }

    pub fn balance(&self, user_id: Uuid) -> i32 {
        *self.balances.lock().unwrap().get(&user_id).unwrap_or(&0)
    }

    pub fn fail_debits(&self) {
        *self.fail_debits.lock().unwrap() = true;
    }

    pub fn fail_refunds(&self) {
        *self.fail_refunds.lock().unwrap() = true;
    }

    pub fn debits(&self) -> Vec<(Uuid, i32, Uuid)> {
        self.debits.lock().unwrap().clone()
    }

    pub fn refunds(&self) -> Vec<(Uuid, i32, Uuid)> {
        self.refunds.lock().unwrap().clone()
    }

    pub fn refunds_for(&self, reference_id: Uuid) -> Vec<(Uuid, i32, Uuid)> {
        self.refunds
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, r)| *r == reference_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LedgerPort for FakeLedger {
    async fn debit(
        &self,
        user_id: Uuid,
        credits: i32,
        _description: &str,
        reference_id: Uuid,
    ) -> AtelierResult<()> {
        if *self.fail_debits.lock().unwrap() {
            return Err(AtelierError::ledger("simulated ledger outage"));
        }
        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(user_id).or_insert(0);
        if *balance < credits {
            return Err(AtelierError::InsufficientCredits);
        }
        *balance -= credits;
        self.debits
            .lock()
            .unwrap()
            .push((user_id, credits, reference_id));
        Ok(())
    }

    async fn refund(
        &self,
        user_id: Uuid,
        credits: i32,
        reference_id: Uuid,
    ) -> AtelierResult<()> {
        if *self.fail_refunds.lock().unwrap() {
            return Err(AtelierError::ledger("simulated refund failure"));
        }
        *self.balances.lock().unwrap().entry(user_id).or_insert(0) += credits;
        self.refunds
            .lock()
            .unwrap()
            .push((user_id, credits, reference_id));
        Ok(())
    }
}

/// Scripted language model: queued chat replies, fixed vision/embedding output
#[derive(Debug, Clone)]
pub struct FakeLanguageModel {
    chat_replies: Arc<Mutex<VecDeque<AtelierResult<String>>>>,
    chat_calls: Arc<Mutex<Vec<(String, String)>>>,
    vision_reply: Arc<Mutex<Option<AtelierResult<String>>>>,
    embedding: Arc<Mutex<AtelierResult<Vec<f32>>>>,
    embed_calls: Arc<Mutex<Vec<String>>>,
}

impl FakeLanguageModel {
    pub fn new() -> Self {
        Self {
            chat_replies: Arc::new(Mutex::new(VecDeque::new())),
            chat_calls: Arc::new(Mutex::new(Vec::new())),
            vision_reply: Arc::new(Mutex::new(None)),
            embedding: Arc::new(Mutex::new(Ok(vec![0.1; 8]))),
            embed_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue the three pipeline replies: translation, intent, rewrite.
    pub fn scripted(translation: &str, intent: &str, rewrite: &str) -> Self {
        let model = Self::new();
        model.push_chat(Ok(translation.to_string()));
        model.push_chat(Ok(intent.to_string()));
        model.push_chat(Ok(rewrite.to_string()));
        model
    }

    pub fn push_chat(&self, reply: AtelierResult<String>) {
        self.chat_replies.lock().unwrap().push_back(reply);
    }

    pub fn set_vision(&self, reply: AtelierResult<String>) {
        *self.vision_reply.lock().unwrap() = Some(reply);
    }

    pub fn set_embedding(&self, reply: AtelierResult<Vec<f32>>) {
        *self.embedding.lock().unwrap() = reply;
    }

    pub fn chat_calls(&self) -> Vec<(String, String)> {
        self.chat_calls.lock().unwrap().clone()
    }

    pub fn embed_calls(&self) -> Vec<String> {
        self.embed_calls.lock().unwrap().clone()
    }
}

impl Default for FakeLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

fn clone_result<T: Clone>(result: &AtelierResult<T>) -> AtelierResult<T> {
    match result {
        Ok(v) => Ok(v.clone()),
        Err(AtelierError::EmbeddingFailed) => Err(AtelierError::EmbeddingFailed),
        Err(AtelierError::UpstreamUnavailable(m)) => Err(AtelierError::upstream(m.clone())),
        Err(e) => Err(AtelierError::internal(format!("{e}"))),
    }
}

#[async_trait]
impl LanguageModelPort for FakeLanguageModel {
    async fn chat(&self, system: &str, user: &str) -> AtelierResult<String> {
        self.chat_calls
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        match self.chat_replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => Err(AtelierError::upstream("unscripted chat call")),
        }
    }

    async fn describe_image(&self, _image_base64: &str, _prompt: &str) -> AtelierResult<String> {
        match self.vision_reply.lock().unwrap().as_ref() {
            Some(reply) => clone_result(reply),
            None => Ok("A test image showing a plain scene.".to_string()),
        }
    }

    async fn embed(&self, input: &str) -> AtelierResult<Vec<f32>> {
        self.embed_calls.lock().unwrap().push(input.to_string());
        clone_result(&self.embedding.lock().unwrap())
    }
}

/// Fake retrieval port returning a fixed chunk list
#[derive(Debug, Clone, Default)]
pub struct FakeRetrieval {
    chunks: Arc<Mutex<Vec<RetrievedChunk>>>,
    calls: Arc<Mutex<Vec<(f64, i64)>>>,
    fail: Arc<Mutex<bool>>,
}

impl FakeRetrieval {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunks(chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            chunks: Arc::new(Mutex::new(chunks)),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn fail_calls(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<(f64, i64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetrievalPort for FakeRetrieval {
    async fn match_documents(
        &self,
        _query_embedding: &[f32],
        match_threshold: f64,
        match_count: i64,
    ) -> AtelierResult<Vec<RetrievedChunk>> {
        if *self.fail.lock().unwrap() {
            return Err(AtelierError::upstream("simulated retrieval failure"));
        }
        self.calls
            .lock()
            .unwrap()
            .push((match_threshold, match_count));
        Ok(self.chunks.lock().unwrap().clone())
    }
}

/// Programmable image provider: scripted submit outcomes, in-memory assets
#[derive(Debug, Clone, Default)]
pub struct FakeProvider {
    outcomes: Arc<Mutex<VecDeque<SubmitOutcome>>>,
    submissions: Arc<Mutex<Vec<ProviderSubmission>>>,
    assets: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_fetch: Arc<Mutex<bool>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepting(task_id: &str) -> Self {
        let provider = Self::default();
        provider.push_outcome(SubmitOutcome::Accepted {
            task_id: task_id.to_string(),
        });
        provider
    }

    pub fn push_outcome(&self, outcome: SubmitOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn put_asset(&self, url: &str, bytes: Vec<u8>) {
        self.assets.lock().unwrap().insert(url.to_string(), bytes);
    }

    pub fn fail_fetches(&self) {
        *self.fail_fetch.lock().unwrap() = true;
    }

    pub fn submissions(&self) -> Vec<ProviderSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProviderPort for FakeProvider {
    async fn submit(&self, request: &ProviderSubmission) -> AtelierResult<SubmitOutcome> {
        self.submissions.lock().unwrap().push(request.clone());
        match self.outcomes.lock().unwrap().pop_front() {
            Some(outcome) => Ok(outcome),
            None => Err(AtelierError::upstream("unscripted submit call")),
        }
    }

    async fn fetch_asset(&self, url: &str) -> AtelierResult<Vec<u8>> {
        if *self.fail_fetch.lock().unwrap() {
            return Err(AtelierError::upstream("simulated download failure"));
        }
        self.assets
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AtelierError::upstream("asset not found"))
    }
}

/// Fake object storage recording uploads
#[derive(Debug, Clone)]
pub struct FakeStorage {
    uploads: Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>,
    fail: Arc<Mutex<bool>>,
    base_url: String,
}

impl Default for FakeStorage {
    fn default() -> Self {
        Self {
            uploads: Arc::new(Mutex::new(HashMap::new())),
            fail: Arc::new(Mutex::new(false)),
            base_url: "https://cdn.test/assets".to_string(),
        }
    }
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_uploads(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn stored(&self, path: &str) -> Option<(Vec<u8>, String)> {
        self.uploads.lock().unwrap().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.uploads.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStoragePort for FakeStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
        _upsert: bool,
    ) -> AtelierResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(AtelierError::persistence("simulated upload failure"));
        }
        self.uploads
            .lock()
            .unwrap()
            .insert(path.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Fake background removal service
#[derive(Debug, Clone, Default)]
pub struct FakeRemoval {
    result: Arc<Mutex<Option<AtelierResult<String>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeRemoval {
    pub fn returning(url: &str) -> Self {
        let removal = Self::default();
        removal.set_result(Ok(url.to_string()));
        removal
    }

    pub fn set_result(&self, result: AtelierResult<String>) {
        *self.result.lock().unwrap() = Some(result);
    }

    pub fn rejecting(status: u16, message: &str) -> Self {
        let removal = Self::default();
        removal.set_result(Err(AtelierError::ProviderRejected {
            status,
            message: message.to_string(),
        }));
        removal
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BackgroundRemovalPort for FakeRemoval {
    async fn remove_background(&self, image_data_url: &str) -> AtelierResult<String> {
        self.calls.lock().unwrap().push(image_data_url.to_string());
        match self.result.lock().unwrap().as_ref() {
            Some(Ok(url)) => Ok(url.clone()),
            Some(Err(AtelierError::ProviderRejected { status, message })) => {
                Err(AtelierError::ProviderRejected {
                    status: *status,
                    message: message.clone(),
                })
            }
            Some(Err(e)) => Err(AtelierError::internal(format!("{e}"))),
            None => Err(AtelierError::upstream("unscripted removal call")),
        }
    }
}

/// Fake auth port mapping tokens to user ids
#[derive(Debug, Clone, Default)]
pub struct FakeAuth {
    tokens: Arc<Mutex<HashMap<String, Uuid>>>,
}

impl FakeAuth {
    pub fn with_token(token: &str, user_id: Uuid) -> Self {
        let auth = Self::default();
        auth.add_token(token, user_id);
        auth
    }

    pub fn add_token(&self, token: &str, user_id: Uuid) {
        self.tokens.lock().unwrap().insert(token.to_string(), user_id);
    }
}

#[async_trait]
impl AuthPort for FakeAuth {
    async fn resolve_user(&self, bearer_token: &str) -> AtelierResult<Option<Uuid>> {
        Ok(self.tokens.lock().unwrap().get(bearer_token).copied())
    }
}
