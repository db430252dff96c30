use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("loading indicator element not found: #{id}")]
    TargetNotFound { id: String },

    #[error("failed to observe attribute mutations: {reason}")]
    ObserveFailed { reason: String },

    #[error("failed to post message to parent context: {reason}")]
    PostFailed { reason: String },

    #[error("no parent browsing context to notify")]
    NoParentContext,

    #[error("unknown mutation record type: {kind}")]
    UnknownMutationKind { kind: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("download filename must not be blank")]
    InvalidFilename,

    #[error("file save failed: {reason}")]
    SaveFailed { reason: String },

    #[error("console logging setup failed: {reason}")]
    LoggingSetup { reason: String },

    #[error("configuration JSON error: {0}")]
    Config(#[source] serde_json::Error),

    #[error("message JSON error: {0}")]
    Message(#[source] serde_json::Error),
}

impl RelayError {
    #[must_use]
    pub fn target_not_found(id: impl Into<String>) -> Self {
        Self::TargetNotFound { id: id.into() }
    }

    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the error stems from page setup rather than a runtime failure.
    ///
    /// Configuration errors are the only failures that can stop the watcher
    /// from ever attaching.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::TargetNotFound { .. } | Self::InvalidConfig { .. } | Self::Config(_)
        )
    }

    /// Short machine-readable label, used for status reporting across the
    /// wasm boundary.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TargetNotFound { .. } => "target_not_found",
            Self::ObserveFailed { .. } => "observe_failed",
            Self::PostFailed { .. } => "post_failed",
            Self::NoParentContext => "no_parent_context",
            Self::UnknownMutationKind { .. } => "unknown_mutation_kind",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::InvalidFilename => "invalid_filename",
            Self::SaveFailed { .. } => "save_failed",
            Self::LoggingSetup { .. } => "logging_setup",
            Self::Config(_) => "config_json",
            Self::Message(_) => "message_json",
        }
    }
}
