//! Builders for test entities.

use chrono::Utc;
use uuid::Uuid;

use atelier_domain::entities::{Edit, EditStatus, ProviderTask, TaskStatus, Template};
use atelier_domain::value_objects::OperationKind;

/// Builder for Edit test entities
pub struct EditBuilder {
    edit: Edit,
}

impl EditBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            edit: Edit {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                operation: OperationKind::EditImage,
                prompt_text: "turn the sky purple".to_string(),
                credits_used: 7,
                task_id: None,
                status: EditStatus::Queued,
                image_url: None,
                ai_processing_time_ms: None,
                file_size: None,
                mime_type: None,
                width: None,
                height: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.edit.id = id;
        self
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.edit.user_id = user_id;
        self
    }

    pub fn with_operation(mut self, operation: OperationKind) -> Self {
        self.edit.operation = operation;
        self
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.edit.prompt_text = prompt.to_string();
        self
    }

    pub fn with_credits(mut self, credits: i32) -> Self {
        self.edit.credits_used = credits;
        self
    }

    pub fn with_task_id(mut self, task_id: &str) -> Self {
        self.edit.task_id = Some(task_id.to_string());
        self
    }

    pub fn with_status(mut self, status: EditStatus) -> Self {
        self.edit.status = status;
        self
    }

    pub fn build(self) -> Edit {
        self.edit
    }
}

impl Default for EditBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for ProviderTask test entities
pub struct TaskBuilder {
    task: ProviderTask,
}

impl TaskBuilder {
    pub fn new(task_id: &str) -> Self {
        let now = Utc::now();
        Self {
            task: ProviderTask {
                task_id: task_id.to_string(),
                user_id: Uuid::new_v4(),
                edit_id: Uuid::new_v4(),
                status: TaskStatus::Pending,
                image_url: None,
                error_message: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.task.user_id = user_id;
        self
    }

    pub fn with_edit(mut self, edit_id: Uuid) -> Self {
        self.task.edit_id = edit_id;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn build(self) -> ProviderTask {
        self.task
    }
}

/// Builder for Template test entities
pub struct TemplateBuilder {
    template: Template,
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self {
            template: Template {
                id: Uuid::new_v4(),
                default_prompt: "apply the studio portrait style".to_string(),
                active: true,
            },
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.template.id = id;
        self
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.template.default_prompt = prompt.to_string();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.template.active = false;
        self
    }

    pub fn build(self) -> Template {
        self.template
    }
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
