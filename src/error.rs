//! Error types for the task-server core.

/// Top-level error type for the task server.
#[derive(Debug, thiserror::Error)]
pub enum TaskServError {
    /// Startup configuration error. Fatal: aborts process start.
    #[error("config error: {0}")]
    Config(String),

    /// The requested command is not part of the protocol.
    #[error("command not found: `{0}`")]
    CommandNotFound(String),

    /// The caller's origin is not in the configured allowlist.
    #[error("access denied for origin `{0}`")]
    AccessDenied(String),

    /// Scheduler error (lock state, snapshot, stop/join).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Host transport error (bind, serve).
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TaskServError>;
