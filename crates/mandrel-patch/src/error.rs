//! v4a patch errors.

/// Error parsing a v4a patch document.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Parse-time error; `message` names the specific rule violated.
    #[error("patch parse error: {0}")]
    ParseError(String),

    /// Apply-time error (I/O or move-source-missing). Fallback-append on an
    /// unmatched hunk is deliberate documented behavior, NOT an error.
    #[error("patch apply error: {0}")]
    ApplyError(String),
}

/// Result type for patch parsing/application.
pub type PatchResult<T> = Result<T, PatchError>;
