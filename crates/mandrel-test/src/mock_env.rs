//! An in-memory [`ExecutionEnvironment`] for exercising tools and the patch
//! engine without touching the real filesystem or spawning processes.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use globset::GlobBuilder;
use mandrel_tools::{ExecOutcome, ExecutionEnvironment, GrepMatch, GrepOptions, ToolError, ToolResult};

const DEFAULT_READ_LINE_LIMIT: usize = 2000;

/// A `HashMap`-backed filesystem plus a table of canned command outputs.
///
/// Paths are plain keys — no normalization, no parent-directory creation
/// bookkeeping. `read_file` reproduces [`ExecutionEnvironment::read_file`]'s
/// `<line>\t<text>` prefixing so callers that depend on that shape (the v4a
/// patch applier's line-number stripper, in particular) see realistic input.
pub struct InMemoryExecutionEnvironment {
    files: Mutex<HashMap<String, String>>,
    commands: Mutex<HashMap<String, ExecOutcome>>,
    working_dir: String,
}

impl InMemoryExecutionEnvironment {
    /// An empty environment rooted at `working_dir`.
    #[must_use]
    pub fn new(working_dir: impl Into<String>) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            commands: Mutex::new(HashMap::new()),
            working_dir: working_dir.into(),
        }
    }

    /// Seed a file before the environment is handed to the code under test.
    #[must_use]
    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files
            .lock()
            .expect("mutex poisoned")
            .insert(path.into(), content.into());
        self
    }

    /// Register a canned [`ExecOutcome`] for an exact command string.
    #[must_use]
    pub fn with_command(self, command: impl Into<String>, outcome: ExecOutcome) -> Self {
        self.commands
            .lock()
            .expect("mutex poisoned")
            .insert(command.into(), outcome);
        self
    }

    /// Snapshot the current file table, for post-call assertions.
    #[must_use]
    pub fn files(&self) -> HashMap<String, String> {
        self.files.lock().expect("mutex poisoned").clone()
    }
}

#[async_trait]
impl ExecutionEnvironment for InMemoryExecutionEnvironment {
    async fn read_file(&self, path: &str, offset: usize, limit: usize) -> ToolResult {
        let files = self.files.lock().expect("mutex poisoned");
        let content = files
            .get(path)
            .ok_or_else(|| ToolError::PathNotFound(path.to_string()))?;

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();
        let effective_limit = if limit == 0 {
            DEFAULT_READ_LINE_LIMIT
        } else {
            limit
        };
        let start = offset.saturating_sub(1);
        let end = start.saturating_add(effective_limit).min(total_lines);

        if start >= total_lines && total_lines > 0 {
            return Ok(format!(
                "(file has {total_lines} lines, offset {start} is past end)"
            ));
        }

        let mut output = String::new();
        for (idx, line) in lines[start..end].iter().enumerate() {
            let line_num = start.saturating_add(idx).saturating_add(1);
            output.push_str(&format!("{line_num:>6}\t{line}\n"));
        }
        Ok(output)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), ToolError> {
        self.files
            .lock()
            .expect("mutex poisoned")
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> bool {
        self.files.lock().expect("mutex poisoned").contains_key(path)
    }

    async fn list_directory(&self, path: &str, depth: i64) -> ToolResult {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let files = self.files.lock().expect("mutex poisoned");
        let mut entries: Vec<String> = files
            .keys()
            .filter_map(|key| {
                let rel = key.strip_prefix(&prefix)?;
                if depth == 0 && rel.contains('/') {
                    None
                } else {
                    Some(rel.to_string())
                }
            })
            .collect();
        entries.sort();
        entries.dedup();
        Ok(entries.join("\n"))
    }

    async fn exec_command(
        &self,
        command: &str,
        _timeout_ms: u64,
        _working_dir: Option<&str>,
        _env_vars: Option<&HashMap<String, String>>,
    ) -> Result<ExecOutcome, ToolError> {
        Ok(self
            .commands
            .lock()
            .expect("mutex poisoned")
            .get(command)
            .cloned()
            .unwrap_or_else(|| ExecOutcome {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
                timed_out: false,
                duration_ms: 0,
            }))
    }

    async fn grep(
        &self,
        pattern: &str,
        path: &str,
        opts: &GrepOptions,
    ) -> Result<Vec<GrepMatch>, ToolError> {
        let re = if opts.case_insensitive {
            regex::RegexBuilder::new(pattern).case_insensitive(true).build()
        } else {
            regex::RegexBuilder::new(pattern).build()
        }
        .map_err(|e| ToolError::InvalidArguments(format!("invalid pattern: {e}")))?;

        let prefix = format!("{}/", path.trim_end_matches('/'));
        let files = self.files.lock().expect("mutex poisoned");
        let mut matches = Vec::new();
        let mut keys: Vec<&String> = files.keys().filter(|k| k.starts_with(&prefix) || *k == path).collect();
        keys.sort();
        for key in keys {
            for (idx, line) in files[key].lines().enumerate() {
                if re.is_match(line) {
                    matches.push(GrepMatch {
                        path: key.clone(),
                        line: idx.saturating_add(1),
                        content: line.to_string(),
                    });
                    if opts.max_results > 0 && matches.len() >= opts.max_results {
                        return Ok(matches);
                    }
                }
            }
        }
        Ok(matches)
    }

    async fn glob(&self, pattern: &str, path: &str) -> Result<Vec<String>, ToolError> {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|e| ToolError::InvalidArguments(format!("invalid glob pattern: {e}")))?
            .compile_matcher();

        let prefix = format!("{}/", path.trim_end_matches('/'));
        let files = self.files.lock().expect("mutex poisoned");
        let mut matches: Vec<String> = files
            .keys()
            .filter_map(|key| {
                let rel = key.strip_prefix(&prefix)?;
                if glob.is_match(rel) {
                    Some(key.clone())
                } else {
                    None
                }
            })
            .collect();
        matches.sort();
        Ok(matches)
    }

    fn working_directory(&self) -> String {
        self.working_dir.clone()
    }

    fn platform(&self) -> &str {
        "mock"
    }

    fn os_version(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips_with_line_prefixes() {
        let env = InMemoryExecutionEnvironment::new("/work");
        env.write_file("a.txt", "one\ntwo").await.unwrap();
        let out = env.read_file("a.txt", 0, 0).await.unwrap();
        assert!(out.contains("     1\tone"));
        assert!(out.contains("     2\ttwo"));
    }

    #[tokio::test]
    async fn read_missing_file_is_path_not_found() {
        let env = InMemoryExecutionEnvironment::new("/work");
        let err = env.read_file("missing.txt", 0, 0).await.unwrap_err();
        assert!(matches!(err, ToolError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn exec_command_serves_registered_canned_outcome() {
        let env = InMemoryExecutionEnvironment::new("/work").with_command(
            "echo hi",
            ExecOutcome {
                stdout: "hi\n".to_string(),
                stderr: String::new(),
                exit_code: 0,
                timed_out: false,
                duration_ms: 1,
            },
        );
        let outcome = env.exec_command("echo hi", 1000, None, None).await.unwrap();
        assert_eq!(outcome.stdout, "hi\n");
    }

    #[tokio::test]
    async fn list_directory_depth_zero_hides_nested_entries() {
        let env = InMemoryExecutionEnvironment::new("/work")
            .with_file("/work/top.txt", "")
            .with_file("/work/sub/nested.txt", "");
        let out = env.list_directory("/work", 0).await.unwrap();
        assert!(out.contains("top.txt"));
        assert!(!out.contains("nested.txt"));
    }

    #[tokio::test]
    async fn grep_finds_matches_under_path() {
        let env = InMemoryExecutionEnvironment::new("/work")
            .with_file("/work/a.txt", "hello\nworld");
        let matches = env
            .grep("hello", "/work", &GrepOptions::default())
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].line, 1);
    }

    #[tokio::test]
    async fn glob_matches_seeded_files() {
        let env = InMemoryExecutionEnvironment::new("/work")
            .with_file("/work/src/lib.rs", "")
            .with_file("/work/README.md", "");
        let matches = env.glob("**/*.rs", "/work").await.unwrap();
        assert_eq!(matches, vec!["/work/src/lib.rs".to_string()]);
    }
}
