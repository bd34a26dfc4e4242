//! v4a patch data model (§3, §4.4).

/// One region of changes inside an `Update File` operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hunk {
    /// Optional `@@@ <hint> @@@` / `@@ <hint>` context hint.
    pub context_hint: Option<String>,
    /// Space-prefixed lines, context only.
    pub context_lines: Vec<String>,
    /// Minus-prefixed lines.
    pub delete_lines: Vec<String>,
    /// Plus-prefixed lines.
    pub add_lines: Vec<String>,
    /// Context + delete lines, in document order — what must be matched in
    /// the target file.
    pub match_lines: Vec<String>,
    /// Context + add lines, in document order — what replaces the match.
    pub replace_lines: Vec<String>,
}

/// One operation inside a patch document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create a new file with the given content.
    Add {
        /// File path.
        path: String,
        /// Lines to write (joined with `\n`).
        content_lines: Vec<String>,
    },
    /// Delete a file (writes empty content; no remove primitive by
    /// contract — see §4.4).
    Delete {
        /// File path.
        path: String,
    },
    /// Apply a sequence of hunks to an existing file.
    Update {
        /// File path.
        path: String,
        /// Hunks to apply in order.
        hunks: Vec<Hunk>,
    },
    /// Rename/move a file.
    Move {
        /// Source path.
        path: String,
        /// Destination path.
        new_path: String,
    },
}

/// A parsed v4a patch document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    /// Operations in document order.
    pub operations: Vec<Operation>,
}

/// Per-operation detail produced by [`crate::applier::apply_patch`].
#[derive(Debug, Clone)]
pub struct OperationResult {
    /// One-line human-readable description (e.g. `"M src/lib.rs"`,
    /// `"M src/lib.rs (updated with fallback)"`).
    pub detail: String,
}

/// Result of applying a [`Patch`].
#[derive(Debug, Clone, Default)]
pub struct ApplyResult {
    /// Number of files created.
    pub created: usize,
    /// Number of files deleted.
    pub deleted: usize,
    /// Number of files modified.
    pub modified: usize,
    /// Number of files moved.
    pub moved: usize,
    /// Per-operation detail lines, in document order.
    pub details: Vec<OperationResult>,
}

impl ApplyResult {
    /// Human-readable summary line, e.g. `"2 created, 1 modified"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.created > 0 {
            parts.push(format!("{} created", self.created));
        }
        if self.deleted > 0 {
            parts.push(format!("{} deleted", self.deleted));
        }
        if self.modified > 0 {
            parts.push(format!("{} modified", self.modified));
        }
        if self.moved > 0 {
            parts.push(format!("{} moved", self.moved));
        }
        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}
