//! v4a patch applier (§4.4).

use mandrel_tools::ExecutionEnvironment;
use tracing::{debug, warn};

use crate::error::{PatchError, PatchResult};
use crate::types::{ApplyResult, Hunk, Operation, OperationResult, Patch};

/// Strips the `<line>\t` prefix [`ExecutionEnvironment::read_file`] adds, or
/// the Mammoth `^\s*\d+ \| ` alternative, but only when a majority of the
/// non-blank lines carry one of those prefixes — otherwise file content that
/// merely starts with digits would be corrupted. Content that doesn't meet
/// the majority threshold is returned unchanged.
fn strip_line_number_prefixes(content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let nonblank: Vec<&&str> = lines.iter().filter(|l| !l.trim().is_empty()).collect();
    let matching = nonblank.iter().filter(|l| line_prefix_end(l).is_some()).count();
    let is_majority = !nonblank.is_empty() && matching * 2 >= nonblank.len();

    if !is_majority {
        return content.to_string();
    }

    lines
        .iter()
        .map(|line| match line_prefix_end(line) {
            Some(end) => &line[end..],
            None => *line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Byte offset of the end of a `^\s*\d+\t` or `^\s*\d+ \| ` prefix, if `line`
/// has one.
fn line_prefix_end(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let ws_len = line.len() - trimmed.len();
    let digits_len = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    if digits_len == 0 {
        return None;
    }
    let rest = &trimmed[digits_len..];
    if rest.starts_with('\t') {
        Some(ws_len + digits_len + 1)
    } else if rest.starts_with(" | ") {
        Some(ws_len + digits_len + 3)
    } else {
        None
    }
}

/// Apply every operation in `patch` against `env`, in document order.
pub async fn apply_patch(
    patch: &Patch,
    env: &dyn ExecutionEnvironment,
) -> PatchResult<ApplyResult> {
    let mut result = ApplyResult::default();
    debug!(operations = patch.operations.len(), "applying patch");

    for operation in &patch.operations {
        match operation {
            Operation::Add { path, content_lines } => {
                let content = content_lines.join("\n");
                env.write_file(path, &content)
                    .await
                    .map_err(|e| PatchError::ApplyError(e.to_string()))?;
                result.created += 1;
                result
                    .details
                    .push(OperationResult { detail: format!("A {path}") });
            }
            Operation::Delete { path } => {
                env.write_file(path, "")
                    .await
                    .map_err(|e| PatchError::ApplyError(e.to_string()))?;
                result.deleted += 1;
                result
                    .details
                    .push(OperationResult { detail: format!("D {path}") });
            }
            Operation::Update { path, hunks } => {
                let detail = apply_update(path, hunks, env).await?;
                result.modified += 1;
                result.details.push(OperationResult { detail });
            }
            Operation::Move { path, new_path } => {
                let raw = env
                    .read_file(path, 0, 0)
                    .await
                    .map_err(|e| PatchError::ApplyError(e.to_string()))?;
                let content = strip_line_number_prefixes(&raw);
                env.write_file(new_path, &content)
                    .await
                    .map_err(|e| PatchError::ApplyError(e.to_string()))?;
                env.write_file(path, "")
                    .await
                    .map_err(|e| PatchError::ApplyError(e.to_string()))?;
                result.moved += 1;
                result.details.push(OperationResult {
                    detail: format!("M {path} -> {new_path}"),
                });
            }
        }
    }

    Ok(result)
}

async fn apply_update(
    path: &str,
    hunks: &[Hunk],
    env: &dyn ExecutionEnvironment,
) -> PatchResult<String> {
    let raw = env
        .read_file(path, 0, 0)
        .await
        .map_err(|e| PatchError::ApplyError(e.to_string()))?;
    let stripped = strip_line_number_prefixes(&raw);
    let mut lines: Vec<String> = stripped.lines().map(str::to_string).collect();

    let mut any_fallback = false;
    for hunk in hunks {
        if hunk.match_lines.is_empty() {
            continue;
        }
        if let Some(at) = find_exact(&lines, &hunk.match_lines) {
            splice(&mut lines, at, hunk.match_lines.len(), &hunk.replace_lines);
        } else if let Some(at) = find_trimmed(&lines, &hunk.match_lines) {
            splice(&mut lines, at, hunk.match_lines.len(), &hunk.replace_lines);
        } else {
            // Fallback: append the hunk's replacement content at end of file
            // rather than fail the whole patch over one unmatched hunk.
            warn!(path, hint = ?hunk.context_hint, "hunk did not match, falling back to append");
            lines.extend(hunk.replace_lines.iter().cloned());
            any_fallback = true;
        }
    }

    let new_content = lines.join("\n");
    env.write_file(path, &new_content)
        .await
        .map_err(|e| PatchError::ApplyError(e.to_string()))?;

    Ok(if any_fallback {
        format!("M {path} (updated with fallback)")
    } else {
        format!("M {path}")
    })
}

fn find_exact(haystack: &[String], needle: &[String]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|w| w.iter().eq(needle.iter()))
}

fn find_trimmed(haystack: &[String], needle: &[String]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    let needle_trimmed: Vec<&str> = needle.iter().map(|s| s.trim()).collect();
    haystack.windows(needle.len()).position(|w| {
        w.iter()
            .map(|s| s.trim())
            .eq(needle_trimmed.iter().copied())
    })
}

fn splice(lines: &mut Vec<String>, at: usize, old_len: usize, replacement: &[String]) {
    lines.splice(at..at + old_len, replacement.iter().cloned());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_patch;
    use mandrel_tools::{EnvInheritPolicy, LocalExecutionEnvironment};
    use tempfile::TempDir;

    fn env(dir: &std::path::Path) -> LocalExecutionEnvironment {
        LocalExecutionEnvironment::new(dir.to_path_buf(), EnvInheritPolicy::Core)
    }

    #[tokio::test]
    async fn add_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new.txt");
        let patch = parse_patch(&format!(
            "*** Begin Patch\n*** Add File: {}\n+hello\n+world\n*** End Patch\n",
            path.display()
        ))
        .unwrap();

        let result = apply_patch(&patch, &env(dir.path())).await.unwrap();
        assert_eq!(result.created, 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\nworld");
    }

    #[tokio::test]
    async fn delete_empties_file_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, "still here").unwrap();
        let patch = parse_patch(&format!(
            "*** Begin Patch\n*** Delete File: {}\n*** End Patch\n",
            path.display()
        ))
        .unwrap();

        let result = apply_patch(&patch, &env(dir.path())).await.unwrap();
        assert_eq!(result.deleted, 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn update_applies_exact_match_hunk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.rs");
        std::fs::write(&path, "fn main() {\n    old();\n}\n").unwrap();
        let patch = parse_patch(&format!(
            "*** Begin Patch\n*** Update File: {}\n fn main() {{\n-    old();\n+    new();\n }}\n*** End Patch\n",
            path.display()
        ))
        .unwrap();

        let result = apply_patch(&patch, &env(dir.path())).await.unwrap();
        assert_eq!(result.modified, 1);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("new();"));
        assert!(!content.contains("old();"));
    }

    #[tokio::test]
    async fn update_falls_back_to_append_when_hunk_does_not_match() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.rs");
        std::fs::write(&path, "fn main() {}\n").unwrap();
        let patch = parse_patch(&format!(
            "*** Begin Patch\n*** Update File: {}\n-this does not exist\n+replacement\n*** End Patch\n",
            path.display()
        ))
        .unwrap();

        let result = apply_patch(&patch, &env(dir.path())).await.unwrap();
        assert_eq!(result.modified, 1);
        assert!(result.details[0].detail.contains("fallback"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("replacement"));
        assert!(content.contains("fn main() {}"));
    }

    #[tokio::test]
    async fn move_writes_destination_and_empties_source() {
        let dir = TempDir::new().unwrap();
        let old_path = dir.path().join("old.txt");
        let new_path = dir.path().join("new.txt");
        std::fs::write(&old_path, "payload").unwrap();
        let patch = parse_patch(&format!(
            "*** Begin Patch\n*** Move File: {} -> {}\n*** End Patch\n",
            old_path.display(),
            new_path.display()
        ))
        .unwrap();

        let result = apply_patch(&patch, &env(dir.path())).await.unwrap();
        assert_eq!(result.moved, 1);
        assert_eq!(std::fs::read_to_string(&new_path).unwrap(), "payload");
        assert_eq!(std::fs::read_to_string(&old_path).unwrap(), "");
    }

    #[test]
    fn summary_describes_no_changes() {
        assert_eq!(ApplyResult::default().summary(), "no changes");
    }

    #[test]
    fn strip_line_number_prefixes_strips_tab_form_on_majority() {
        let content = "     1\tfn main() {\n     2\t    old();\n     3\t}";
        assert_eq!(
            strip_line_number_prefixes(content),
            "fn main() {\n    old();\n}"
        );
    }

    #[test]
    fn strip_line_number_prefixes_strips_mammoth_form_on_majority() {
        let content = "1 | fn main() {\n2 |     old();\n3 | }";
        assert_eq!(
            strip_line_number_prefixes(content),
            "fn main() {\n    old();\n}"
        );
    }

    #[test]
    fn strip_line_number_prefixes_leaves_content_verbatim_below_majority() {
        let content = "1 reasons to love rust\nrust is fast\nrust is safe\nrust is fun";
        assert_eq!(strip_line_number_prefixes(content), content);
    }
}
