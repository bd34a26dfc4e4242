//! Execution environment abstraction (C1).
//!
//! Everything the conversation loop's tools touch outside the process —
//! files, directories, subprocesses — goes through this trait rather than
//! calling `std::fs`/`tokio::process` directly. Tests run against
//! [`mandrel_test`]'s in-memory mock; production code runs against
//! [`LocalExecutionEnvironment`].

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use globset::GlobBuilder;
use walkdir::WalkDir;

use crate::env_policy::{build_child_env, to_os_env, EnvInheritPolicy};
use crate::{ToolError, ToolResult};

const DEFAULT_READ_LINE_LIMIT: usize = 2000;
const MAX_LINE_LENGTH: usize = 2000;

/// Outcome of [`ExecutionEnvironment::exec_command`].
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Process exit code, or `-1` if the process was killed before exiting.
    pub exit_code: i32,
    /// Whether the command was killed for exceeding its timeout.
    pub timed_out: bool,
    /// Wall-clock duration of the call.
    pub duration_ms: u64,
}

/// Options for [`ExecutionEnvironment::grep`].
#[derive(Debug, Clone, Default)]
pub struct GrepOptions {
    /// Only search files matching this glob (e.g. `"*.rs"`).
    pub glob_filter: Option<String>,
    /// Case-insensitive matching.
    pub case_insensitive: bool,
    /// Stop after this many matches (0 = unlimited).
    pub max_results: usize,
}

/// A single grep match.
#[derive(Debug, Clone)]
pub struct GrepMatch {
    /// File the match was found in.
    pub path: String,
    /// 1-based line number.
    pub line: usize,
    /// The matching line's content.
    pub content: String,
}

/// Everything the runtime needs from its host to run tools (C1).
///
/// Paths are plain strings everywhere: the core never assumes the
/// environment is POSIX, local, or even backed by a real filesystem.
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    /// Read a file, returning its content with right-aligned
    /// `<line>\t<text>` prefixes (`offset` 1-based, 0 = start; `limit` 0 =
    /// [`DEFAULT_READ_LINE_LIMIT`]).
    async fn read_file(&self, path: &str, offset: usize, limit: usize) -> ToolResult;

    /// Create parent directories as needed, then write (overwriting) `content`.
    async fn write_file(&self, path: &str, content: &str) -> Result<(), ToolError>;

    /// Whether `path` exists.
    async fn file_exists(&self, path: &str) -> bool;

    /// List a directory. `depth` 0 = immediate children only, -1 = unlimited.
    async fn list_directory(&self, path: &str, depth: i64) -> ToolResult;

    /// Execute a command as a new process group, with the configured env
    /// inheritance policy applied. On timeout the whole process group is
    /// signalled to terminate, given a grace period, then force-killed.
    async fn exec_command(
        &self,
        command: &str,
        timeout_ms: u64,
        working_dir: Option<&str>,
        env_vars: Option<&HashMap<String, String>>,
    ) -> Result<ExecOutcome, ToolError>;

    /// Search file contents under `path` for `pattern`.
    async fn grep(
        &self,
        pattern: &str,
        path: &str,
        opts: &GrepOptions,
    ) -> Result<Vec<GrepMatch>, ToolError>;

    /// Find files under `path` matching `pattern` (supports `**`).
    async fn glob(&self, pattern: &str, path: &str) -> Result<Vec<String>, ToolError>;

    /// Prepare the environment for use (no-op for most backends).
    async fn initialize(&self) -> Result<(), ToolError> {
        Ok(())
    }

    /// Release any resources held by the environment.
    async fn cleanup(&self) -> Result<(), ToolError> {
        Ok(())
    }

    /// The environment's current working directory.
    fn working_directory(&self) -> String;

    /// Host platform identifier (e.g. `"linux"`, `"macos"`, `"windows"`).
    fn platform(&self) -> &str;

    /// Host OS version string.
    fn os_version(&self) -> String;
}

/// Real filesystem- and process-backed [`ExecutionEnvironment`].
pub struct LocalExecutionEnvironment {
    working_dir: PathBuf,
    env_policy: EnvInheritPolicy,
}

impl LocalExecutionEnvironment {
    /// Create an environment rooted at `working_dir` using `env_policy` for
    /// spawned-process environment inheritance.
    #[must_use]
    pub fn new(working_dir: PathBuf, env_policy: EnvInheritPolicy) -> Self {
        Self {
            working_dir,
            env_policy,
        }
    }
}

#[async_trait]
impl ExecutionEnvironment for LocalExecutionEnvironment {
    async fn read_file(&self, path: &str, offset: usize, limit: usize) -> ToolResult {
        let path = Path::new(path);
        if !path.exists() {
            return Err(ToolError::PathNotFound(path.display().to_string()));
        }

        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| ToolError::Io(e))?;
        let check_len = raw.len().min(8192);
        if raw[..check_len].contains(&0) {
            return Err(ToolError::ExecutionFailed(format!(
                "{} appears to be a binary file",
                path.display()
            )));
        }
        let content = String::from_utf8(raw).map_err(|_| {
            ToolError::ExecutionFailed(format!("{} is not valid UTF-8", path.display()))
        })?;

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
        for (idx, &line) in lines[start..end].iter().enumerate() {
            let line_num = start.saturating_add(idx).saturating_add(1);
            let display_line = if line.len() > MAX_LINE_LENGTH {
                &line[..MAX_LINE_LENGTH]
            } else {
                line
            };
            let _ = writeln!(output, "{line_num:>6}\t{display_line}");
        }

        if end < total_lines {
            let _ = write!(
                output,
                "\n(showing lines {}-{} of {total_lines}; use offset/limit for more)",
                start.saturating_add(1),
                end
            );
        }

        Ok(output)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), ToolError> {
        let path = Path::new(path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn list_directory(&self, path: &str, depth: i64) -> ToolResult {
        let root = Path::new(path);
        if !root.exists() {
            return Err(ToolError::PathNotFound(path.to_string()));
        }

        let walker = if depth < 0 {
            WalkDir::new(root)
        } else {
            // depth=0 means immediate children, i.e. WalkDir min_depth=1 max_depth=1
            WalkDir::new(root).max_depth(usize::try_from(depth).unwrap_or(usize::MAX).saturating_add(1))
        };

        let mut entries = Vec::new();
        for entry in walker.min_depth(1).into_iter().filter_map(Result::ok) {
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let marker = if entry.file_type().is_dir() { "/" } else { "" };
            entries.push(format!("{}{marker}", rel.display()));
        }
        entries.sort();
        Ok(entries.join("\n"))
    }

    async fn exec_command(
        &self,
        command: &str,
        timeout_ms: u64,
        working_dir: Option<&str>,
        env_vars: Option<&HashMap<String, String>>,
    ) -> Result<ExecOutcome, ToolError> {
        let cwd = working_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| self.working_dir.clone());
        let explicit = env_vars.cloned().unwrap_or_default();
        let env = build_child_env(self.env_policy, std::env::vars(), &explicit);

        crate::bash::run_in_process_group(command, &cwd, &to_os_env(&env), timeout_ms).await
    }

    async fn grep(
        &self,
        pattern: &str,
        path: &str,
        opts: &GrepOptions,
    ) -> Result<Vec<GrepMatch>, ToolError> {
        let re = if opts.case_insensitive {
            regex::RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
        } else {
            regex::RegexBuilder::new(pattern).build()
        }
        .map_err(|e| ToolError::InvalidArguments(format!("invalid pattern: {e}")))?;

        let glob_filter = opts
            .glob_filter
            .as_ref()
            .map(|g| {
                GlobBuilder::new(g)
                    .literal_separator(false)
                    .build()
                    .map(|g| g.compile_matcher())
            })
            .transpose()
            .map_err(|e| ToolError::InvalidArguments(format!("invalid glob filter: {e}")))?;

        let root = Path::new(path);
        let mut matches = Vec::new();
        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(filter) = &glob_filter {
                let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
                if !filter.is_match(rel) {
                    continue;
                }
            }
            let Ok(content) = tokio::fs::read_to_string(entry.path()).await else {
                continue;
            };
            for (idx, line) in content.lines().enumerate() {
                if re.is_match(line) {
                    matches.push(GrepMatch {
                        path: entry.path().display().to_string(),
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
        let root = Path::new(path);
        if !root.exists() {
            return Err(ToolError::PathNotFound(path.to_string()));
        }
        let root = root
            .canonicalize()
            .map_err(|e| ToolError::Io(e))?;

        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|e| ToolError::InvalidArguments(format!("invalid glob pattern: {e}")))?
            .compile_matcher();

        let mut matches: Vec<(PathBuf, SystemTime)> = Vec::new();
        for entry in WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(Result::ok)
        {
            if entry.file_type().is_dir() {
                continue;
            }
            let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            if glob.is_match(rel) {
                let mtime = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                matches.push((entry.path().to_path_buf(), mtime));
            }
        }
        matches.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(matches
            .into_iter()
            .map(|(p, _)| p.display().to_string())
            .collect())
    }

    fn working_directory(&self) -> String {
        self.working_dir.display().to_string()
    }

    fn platform(&self) -> &str {
        std::env::consts::OS
    }

    fn os_version(&self) -> String {
        // std has no portable OS-version query; callers on a real host can
        // override via `uname -r`/`sw_vers` if this level of detail matters.
        std::env::consts::OS.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(dir: &Path) -> LocalExecutionEnvironment {
        LocalExecutionEnvironment::new(dir.to_path_buf(), EnvInheritPolicy::Core)
    }

    #[tokio::test]
    async fn read_file_prefixes_line_numbers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "a\nb\nc\n").unwrap();

        let out = env(dir.path())
            .read_file(path.to_str().unwrap(), 0, 0)
            .await
            .unwrap();
        assert!(out.contains("     1\ta"));
        assert!(out.contains("     2\tb"));
        assert!(out.contains("     3\tc"));
    }

    #[tokio::test]
    async fn write_file_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.txt");
        env(dir.path())
            .write_file(path.to_str().unwrap(), "hi")
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hi");
    }

    #[tokio::test]
    async fn list_directory_depth_zero_is_immediate_children() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/nested.txt"), "").unwrap();
        std::fs::write(dir.path().join("top.txt"), "").unwrap();

        let out = env(dir.path())
            .list_directory(dir.path().to_str().unwrap(), 0)
            .await
            .unwrap();
        assert!(out.contains("top.txt"));
        assert!(out.contains("sub/"));
        assert!(!out.contains("nested.txt"));
    }

    #[tokio::test]
    async fn exec_command_runs_and_captures_output() {
        let dir = TempDir::new().unwrap();
        let outcome = env(dir.path())
            .exec_command("echo hello", 5000, None, None)
            .await
            .unwrap();
        assert!(outcome.stdout.contains("hello"));
        assert_eq!(outcome.exit_code, 0);
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn exec_command_times_out() {
        let dir = TempDir::new().unwrap();
        let outcome = env(dir.path())
            .exec_command("sleep 10", 100, None, None)
            .await
            .unwrap();
        assert!(outcome.timed_out);
    }

    #[tokio::test]
    async fn grep_finds_matching_lines() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello\nworld\nhello again\n").unwrap();

        let matches = env(dir.path())
            .grep("hello", dir.path().to_str().unwrap(), &GrepOptions::default())
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].line, 1);
    }

    #[tokio::test]
    async fn glob_matches_recursive_pattern() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();

        let matches = env(dir.path())
            .glob("**/*.rs", dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
    }
}
