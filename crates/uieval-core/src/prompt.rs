//! Prompt templates for the generation and judgment calls.
//!
//! Neither builder escapes its inputs. An instruction document or generated
//! artifact that contains a code fence will break the judgment template's
//! fenced block; the judge usually copes, the verdict parser fails closed
//! when it does not.

use std::path::Path;

/// Component library the generated code must use.
pub const UI_LIBRARY: &str = "shadcn ui";

pub fn build_generation_prompt(
    instructions: &str,
    technologies: &[String],
    component_kind: &str,
    user_query: &str,
) -> String {
    let technologies = technologies
        .iter()
        .map(|tech| format!("- {tech}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\nYou are given component instructions:\n{instructions}\n\n\
         Ensure to use the following technologies:\n{technologies}\n\n\
         Ensure to use the {component_kind} component from {UI_LIBRARY}.\n\n\
         Return only the {component_kind} component code. Nothing else.\n\n\
         User query:\n{user_query}\n"
    )
}

pub fn build_judgment_prompt(generated_artifact: &str, evaluation_question: &str) -> String {
    format!(
        "\nYou are an expert code reviewer. Analyze the following React component code and answer the specific question below.\n\n\
         Generated Component Code:\n```\n{generated_artifact}\n```\n\n\
         Question: {evaluation_question}\n\n\
         Please respond with:\n\
         1. A clear YES or NO answer\n\
         2. Your reasoning explaining why\n\n\
         Format your response as:\n\
         ANSWER: [YES/NO]\n\
         REASONING: [Your detailed explanation]\n"
    )
}

/// Component label taken from the instruction document's file name: `instructions/select.md` → `select`.
pub fn component_kind_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "component".to_string())
}
