//! CLI-specific error types and exit code mapping

use tidemark_core::error::{CodecError, TidemarkError};
use tidemark_session::SessionError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Input could not be decoded (cookie value, error payload).
    #[error("decode error: {0}")]
    Decode(String),

    /// JSON serialisation failed during output rendering or input parsing.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (file read, stdin read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from tidemark-core.
    #[error("{0}")]
    Core(#[from] TidemarkError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                              |
    /// |------|--------------------------------------|
    /// | 0    | Success                              |
    /// | 1    | General / command error              |
    /// | 2    | Configuration error                  |
    /// | 3    | Input could not be decoded           |
    /// | 10   | IO error                             |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(TidemarkError::Config(_)) => 2,
            Self::Decode(_) => 3,
            Self::Io(_) => 10,
            Self::Json(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<CodecError> for CliError {
    fn from(e: CodecError) -> Self {
        Self::Decode(e.to_string())
    }
}
