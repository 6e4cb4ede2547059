pub mod postgres_auth;
pub mod postgres_edit_repository;
pub mod postgres_ledger;
pub mod postgres_log_repository;
pub mod postgres_retrieval;
pub mod postgres_task_repository;
pub mod postgres_template_repository;

pub use postgres_auth::PostgresAuth;
pub use postgres_edit_repository::PostgresEditRepository;
pub use postgres_ledger::PostgresLedger;
pub use postgres_log_repository::PostgresOptimizationLogRepository;
pub use postgres_retrieval::PostgresRetrieval;
pub use postgres_task_repository::PostgresProviderTaskRepository;
pub use postgres_template_repository::PostgresTemplateRepository;
