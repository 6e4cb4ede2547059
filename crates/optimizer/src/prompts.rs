//! 管道各阶段的系统提示词与检索参数
//!
//! 提示词文本是对外 AI 调用契约的一部分，改动会直接影响生成质量，
//! 调整时需同步评估线上效果。

/// 相似度检索阈值
pub const MATCH_THRESHOLD: f64 = 0.35;
/// 检索条数上限
pub const MATCH_COUNT: i64 = 8;
/// 拼接后文档上下文的最大字符数
pub const CONTEXT_MAX_CHARS: usize = 4000;
/// 文档片段之间的分隔符
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// 无可用图像描述时的占位上下文（查询扩展阶段）
pub const UNKNOWN_IMAGE_CONTEXT: &str = "Unknown image context.";
/// 无可用图像描述时的占位上下文（改写阶段）
pub const PRESERVE_SCENE_CONTEXT: &str = "Preserve the existing scene.";

pub const TRANSLATE_SYSTEM: &str =
    "Translate the user request to English. Output only the translated text.";

pub const INTENT_SYSTEM_SINGLE: &str = "\
Classify the editing intent into ONE of the following categories:
- subject_removal
- lighting_adjustment
- color_grading
- typography
- composition
- general_edit

Output only the category name.";

pub const INTENT_SYSTEM_MULTI: &str = "\
Classify the editing intent into ONE of the following categories:
- multi_reference_composite
- subject_removal
- lighting_adjustment
- color_grading
- typography
- composition
- general_edit

Output only the category name.";

pub const REWRITE_SYSTEM_SINGLE: &str = "\
You are a professional FLUX image editing prompt optimizer.

STRICT RULES:
- OUTPUT ONLY the final improved English prompt.
- This is IMAGE EDITING, not image generation.
- PRESERVE the original scene and environment.
- DO NOT invent new locations.
- ONLY modify what the user requested.
- NEVER use negative prompts.
- Use positive visual replacement strategy.
- Follow: Subject + Action + Style + Context.";

pub const REWRITE_SYSTEM_MULTI: &str = "\
You are a professional FLUX multi-reference image editing prompt optimizer.

STRICT RULES:
- OUTPUT ONLY the final improved English prompt.
- This is MULTI-REFERENCE editing: combine reference images (clothing, accessories, objects) into a cohesive scene.
- Describe how each input should be used in the final composition.
- NEVER use negative prompts.
- Use positive visual replacement strategy.
- Follow: Subject + Action + Style + Context.
- Reference the FLUX Fashion Editorial Example: model wearing outfit, positioned in scene, combining items from references.";

/// 看图描述的指令（vision 调用）
pub const CAPTION_PROMPT: &str = "Describe this image in 1-2 sentences in English. \
Focus on: subject, setting, colors, objects, people if any. \
Output only the description, no preamble. \
Example: \"A green bicycle wheel on a street with buildings in the background.\"";

/// 多图场景的合成描述
pub fn multi_reference_context(image_count: usize) -> String {
    format!("Multi-reference: combining {image_count} reference images into one cohesive scene.")
}

/// 构造用于嵌入的扩展查询
pub fn expansion_query(
    translated: &str,
    image_context: &str,
    intent: &str,
    multi_reference: bool,
) -> String {
    let focus_hints = if multi_reference {
        "- multi-reference image editing\n\
         - replacement strategy for negative prompts\n\
         - structured prompting\n\
         - subject + action + style + context"
    } else {
        "- replacement strategy for negative prompts\n\
         - structured prompting\n\
         - subject + action + style + context"
    };
    format!(
        "\nUser editing request:\n{translated}\n\n\
         Image context:\n{image_context}\n\n\
         Intent category: {intent}\n\n\
         Focus on relevant FLUX official documentation, especially:\n{focus_hints}\n"
    )
}

/// 构造改写阶段的用户消息
pub fn rewrite_user(
    translated: &str,
    image_context: &str,
    intent: &str,
    context_string: &str,
) -> String {
    format!(
        "\nOriginal editing request:\n{translated}\n\n\
         Image context:\n{image_context}\n\n\
         Detected intent:\n{intent}\n\n\
         Relevant FLUX documentation:\n{context_string}\n"
    )
}
