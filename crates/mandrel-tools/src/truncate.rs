//! Tool output truncation (C3 §4.3).
//!
//! Truncation runs in two passes: a character-count pass (head-tail or
//! tail-only, per tool), then — if the tool also has a line-count limit and
//! the output still exceeds it after the char pass — a line-count pass.
//! The full untruncated output is never lost; callers are expected to also
//! deliver it via the event bus (`tool_call_end`), which is why the banners
//! here just point the model at the event stream rather than trying to
//! reproduce the missing content.

use std::collections::HashMap;
use std::fmt::Write as _;

/// How the character-count pass trims output that exceeds its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateMode {
    /// Keep the first and last halves, with a banner in between.
    HeadTail,
    /// Keep only the trailing `limit` characters, with a leading banner.
    Tail,
}

const FALLBACK_CHAR_LIMIT: usize = 30_000;

fn default_char_limit(tool_name: &str) -> usize {
    match tool_name {
        "read_file" => 50_000,
        "bash" => 30_000,
        "grep" => 20_000,
        "glob" => 20_000,
        "edit_file" => 10_000,
        "write_file" => 1_000,
        _ => FALLBACK_CHAR_LIMIT,
    }
}

fn default_mode(tool_name: &str) -> TruncateMode {
    match tool_name {
        "read_file" | "bash" => TruncateMode::HeadTail,
        _ => TruncateMode::Tail,
    }
}

/// Per-tool line-count limit applied after the char-count pass, if the
/// tool has one at all.
fn line_limit(tool_name: &str) -> Option<usize> {
    match tool_name {
        "bash" => Some(256),
        "grep" => Some(200),
        "glob" => Some(500),
        _ => None,
    }
}

/// Per-tool override for the char-count limit, taking priority over the
/// built-in defaults above.
#[derive(Debug, Clone, Default)]
pub struct TruncationOverrides(HashMap<String, usize>);

impl TruncationOverrides {
    /// Create an empty override set (falls back entirely to built-in defaults).
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Override the char limit for a specific tool.
    #[must_use]
    pub fn with_limit(mut self, tool_name: impl Into<String>, limit: usize) -> Self {
        self.0.insert(tool_name.into(), limit);
        self
    }
}

/// Truncate `output` for `tool_name` per the char-limit/mode/line-limit
/// algorithm above.
#[must_use]
pub fn truncate_output(tool_name: &str, output: &str, overrides: &TruncationOverrides) -> String {
    let char_limit = overrides
        .0
        .get(tool_name)
        .copied()
        .unwrap_or_else(|| default_char_limit(tool_name));

    let mode = default_mode(tool_name);
    let after_chars = truncate_chars(output, char_limit, mode);

    match line_limit(tool_name) {
        Some(max_lines) => truncate_lines(&after_chars, max_lines),
        None => after_chars,
    }
}

fn truncate_chars(output: &str, limit: usize, mode: TruncateMode) -> String {
    if output.len() <= limit {
        return output.to_string();
    }

    let removed = output.len().saturating_sub(limit);
    match mode {
        TruncateMode::Tail => {
            let start = char_boundary_from_end(output, limit);
            let mut result = format!(
                "[WARNING: {removed} characters omitted; see the event stream for the full output]\n"
            );
            result.push_str(&output[start..]);
            result
        }
        TruncateMode::HeadTail => {
            let half = limit / 2;
            let head_end = char_boundary_from_start(output, half);
            let tail_start = char_boundary_from_end(output, limit.saturating_sub(half));
            let mut result = output[..head_end].to_string();
            let _ = write!(
                result,
                "\n\n[WARNING: {removed} characters omitted; see the event stream for the full output]\n\n"
            );
            result.push_str(&output[tail_start..]);
            result
        }
    }
}

fn truncate_lines(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= max_lines {
        return output.to_string();
    }

    let head_n = max_lines / 2;
    let tail_n = max_lines.saturating_sub(head_n);
    let omitted = lines.len().saturating_sub(head_n).saturating_sub(tail_n);

    let mut result = lines[..head_n].join("\n");
    let _ = write!(result, "\n[... {omitted} lines omitted ...]\n");
    result.push_str(&lines[lines.len().saturating_sub(tail_n)..].join("\n"));
    result
}

fn char_boundary_from_start(s: &str, at: usize) -> usize {
    let mut end = at.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

fn char_boundary_from_end(s: &str, keep: usize) -> usize {
    let mut start = s.len().saturating_sub(keep);
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    start
}
