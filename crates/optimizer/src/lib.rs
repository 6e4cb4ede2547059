//! 提示词优化管道
//!
//! 五阶段顺序流水线：翻译 → 意图分类 → 查询扩展 → 向量检索 → 严格改写。
//! 各阶段的系统提示词与检索参数集中在 [`prompts`]，
//! 管道本身只依赖 LanguageModelPort 与 RetrievalPort 两个端口。

pub mod pipeline;
pub mod prompts;

pub use pipeline::{PromptOptimizer, ReferenceContext};
