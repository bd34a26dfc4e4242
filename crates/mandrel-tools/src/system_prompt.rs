//! System prompt assembly (C10 §4.10).

use std::path::{Path, PathBuf};

use crate::ToolRegistry;

/// Byte budget for the concatenated project-docs section.
const PROJECT_DOCS_BUDGET: usize = 32_768;

/// Which provider-specific project doc, if any, is additionally honored
/// beyond the universal set (`AGENTS.md`, `README.md`, `.cursorrules`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderDocFilter {
    /// No provider-specific addition.
    Universal,
    /// Adds `CLAUDE.md`.
    Anthropic,
    /// Adds `.codex/instructions.md`.
    OpenAi,
    /// Adds `GEMINI.md`.
    Gemini,
}

const UNIVERSAL_DOC_NAMES: &[&str] = &["AGENTS.md", "README.md", ".cursorrules"];

fn provider_doc_name(filter: ProviderDocFilter) -> Option<&'static str> {
    match filter {
        ProviderDocFilter::Universal => None,
        ProviderDocFilter::Anthropic => Some("CLAUDE.md"),
        ProviderDocFilter::OpenAi => Some(".codex/instructions.md"),
        ProviderDocFilter::Gemini => Some("GEMINI.md"),
    }
}

/// Build the full system prompt for a conversation loop iteration.
///
/// `base_prompt` is the provider-specific opening text; `model` and
/// `knowledge_cutoff` are optional annotations appended to the environment
/// block; `user_override` is appended verbatim under a `## User
/// Instructions` header when present.
#[must_use = "build_system_prompt returns the assembled prompt; discarding it is almost always a bug"]
pub async fn build_system_prompt(
    base_prompt: &str,
    working_dir: &Path,
    registry: &ToolRegistry,
    doc_filter: ProviderDocFilter,
    model: Option<&str>,
    knowledge_cutoff: Option<&str>,
    user_override: Option<&str>,
) -> String {
    let mut prompt = String::from(base_prompt);
    prompt.push_str("\n\n");
    prompt.push_str(&environment_block(working_dir, model, knowledge_cutoff).await);
    prompt.push_str("\n\n");
    prompt.push_str(&tool_block(registry));

    let docs = project_docs_block(working_dir, doc_filter).await;
    if !docs.is_empty() {
        prompt.push_str("\n\n# Project Instructions\n\n");
        prompt.push_str(&docs);
    }

    if let Some(user_override) = user_override.filter(|s| !s.trim().is_empty()) {
        prompt.push_str("\n\n## User Instructions\n\n");
        prompt.push_str(user_override);
    }

    prompt
}

async fn environment_block(
    working_dir: &Path,
    model: Option<&str>,
    knowledge_cutoff: Option<&str>,
) -> String {
    let mut block = format!(
        "<environment>\nWorking directory: {}\nPlatform: {}\nOS version: {}\nDate: {}",
        working_dir.display(),
        std::env::consts::OS,
        std::env::consts::OS,
        chrono::Utc::now().to_rfc3339(),
    );

    if let Some(model) = model {
        block.push_str(&format!("\nModel: {model}"));
    }
    if let Some(cutoff) = knowledge_cutoff {
        block.push_str(&format!("\nKnowledge cutoff: {cutoff}"));
    }

    if let Some(git_block) = git_block(working_dir).await {
        block.push('\n');
        block.push_str(&git_block);
    }

    block.push_str("\n</environment>");
    block
}

async fn git_block(working_dir: &Path) -> Option<String> {
    let inside = run_git(working_dir, &["rev-parse", "--is-inside-work-tree"]).await?;
    if inside.trim() != "true" {
        return None;
    }

    let branch = run_git(working_dir, &["branch", "--show-current"])
        .await
        .unwrap_or_default();
    let status = run_git(working_dir, &["status", "--short"])
        .await
        .unwrap_or_default();
    let log = run_git(working_dir, &["log", "--oneline", "-5"])
        .await
        .unwrap_or_default();

    Some(format!(
        "Git branch: {}\nGit status:\n{}\nRecent commits:\n{}",
        branch.trim(),
        status.trim(),
        log.trim(),
    ))
}

async fn run_git(working_dir: &Path, args: &[&str]) -> Option<String> {
    let output = tokio::process::Command::new("git")
        .args(args)
        .current_dir(working_dir)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

fn tool_block(registry: &ToolRegistry) -> String {
    let mut block = String::from("# Available Tools\n\n");
    for def in registry.all_definitions() {
        block.push_str(&format!(
            "- `{}`: {}\n",
            def.name,
            def.description.as_deref().unwrap_or("")
        ));
    }
    block
}

async fn project_docs_block(working_dir: &Path, doc_filter: ProviderDocFilter) -> String {
    let toplevel = run_git(working_dir, &["rev-parse", "--show-toplevel"])
        .await
        .map(|s| PathBuf::from(s.trim()))
        .unwrap_or_else(|| working_dir.to_path_buf());

    let mut names: Vec<&str> = UNIVERSAL_DOC_NAMES.to_vec();
    if let Some(extra) = provider_doc_name(doc_filter) {
        names.push(extra);
    }

    // Walk from toplevel down to working_dir; a deeper directory's doc of
    // the same name overrides a shallower one.
    let mut dirs = Vec::new();
    let mut cur = Some(working_dir.to_path_buf());
    while let Some(dir) = cur {
        dirs.push(dir.clone());
        if dir == toplevel || dir.parent().is_none() {
            break;
        }
        cur = dir.parent().map(Path::to_path_buf);
    }
    dirs.reverse(); // shallow first

    let mut by_name: std::collections::HashMap<&str, String> = std::collections::HashMap::new();
    for dir in &dirs {
        for &name in &names {
            let path = dir.join(name);
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                if !content.trim().is_empty() {
                    by_name.insert(name, content);
                }
            }
        }
    }

    let mut sections = Vec::new();
    for &name in &names {
        if let Some(content) = by_name.get(name) {
            sections.push(format!("## {name}\n\n{content}"));
        }
    }

    let mut budget_remaining = PROJECT_DOCS_BUDGET;
    let mut result = String::new();
    for section in sections {
        if section.len() <= budget_remaining {
            if !result.is_empty() {
                result.push_str("\n\n");
            }
            result.push_str(&section);
            budget_remaining -= section.len();
        } else if budget_remaining > 0 {
            if !result.is_empty() {
                result.push_str("\n\n");
            }
            let cut = char_boundary_at_most(&section, budget_remaining);
            result.push_str(&section[..cut]);
            result.push_str("\n[TRUNCATED: Content exceeded 32KB budget]");
            budget_remaining = 0;
        } else {
            break;
        }
    }

    result
}

fn char_boundary_at_most(s: &str, at: usize) -> usize {
    let mut end = at.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn includes_base_prompt_and_tool_block() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::with_defaults();
        let prompt = build_system_prompt(
            "You are a coding assistant.",
            dir.path(),
            &registry,
            ProviderDocFilter::Universal,
            None,
            None,
            None,
        )
        .await;

        assert!(prompt.contains("You are a coding assistant."));
        assert!(prompt.contains("# Available Tools"));
        assert!(prompt.contains("`bash`"));
        assert!(prompt.contains("<environment>"));
    }

    #[tokio::test]
    async fn universal_doc_is_included_and_provider_specific_is_filtered_out() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "Follow the style guide.").unwrap();
        std::fs::write(dir.path().join("CLAUDE.md"), "Anthropic-only notes.").unwrap();
        let registry = ToolRegistry::new();

        let prompt = build_system_prompt(
            "base",
            dir.path(),
            &registry,
            ProviderDocFilter::Universal,
            None,
            None,
            None,
        )
        .await;

        assert!(prompt.contains("Follow the style guide."));
        assert!(!prompt.contains("Anthropic-only notes."));
    }

    #[tokio::test]
    async fn anthropic_filter_includes_claude_md() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("CLAUDE.md"), "Anthropic-only notes.").unwrap();
        let registry = ToolRegistry::new();

        let prompt = build_system_prompt(
            "base",
            dir.path(),
            &registry,
            ProviderDocFilter::Anthropic,
            None,
            None,
            None,
        )
        .await;

        assert!(prompt.contains("Anthropic-only notes."));
    }

    #[tokio::test]
    async fn user_override_appended_under_header() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::new();

        let prompt = build_system_prompt(
            "base",
            dir.path(),
            &registry,
            ProviderDocFilter::Universal,
            None,
            None,
            Some("Always use tabs."),
        )
        .await;

        assert!(prompt.contains("## User Instructions"));
        assert!(prompt.contains("Always use tabs."));
    }

    #[tokio::test]
    async fn model_and_cutoff_appear_in_environment_block() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::new();

        let prompt = build_system_prompt(
            "base",
            dir.path(),
            &registry,
            ProviderDocFilter::Universal,
            Some("model-x"),
            Some("2025-01"),
            None,
        )
        .await;

        assert!(prompt.contains("Model: model-x"));
        assert!(prompt.contains("Knowledge cutoff: 2025-01"));
    }
}
