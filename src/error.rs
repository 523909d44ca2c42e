//! Error handling module for installwiz
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Refresh failures are split into `Fatal` and `Wrapped` so callers can tell a
//! broken configuration apart from an ordinary evaluation failure without
//! inspecting message strings.

use strum::Display;
use thiserror::Error;

/// Main error type for installwiz
#[derive(Error, Debug)]
pub enum InstallerError {
    /// IO errors (definition files, record output)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Dynamic variable refresh failed (aborts the current transition)
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// Panel index outside the registry
    #[error("No panel at index {index} (registry holds {len})")]
    PanelIndex { index: usize, len: usize },

    /// No view could be created for a panel
    #[error("Cannot create view for panel '{panel}': {reason}")]
    PanelView { panel: String, reason: String },

    /// A panel references a validator that was never registered
    #[error("Panel '{panel}' references unknown validator '{validator}'")]
    UnknownValidator { panel: String, validator: String },

    /// Installation record could not be written
    #[error("Record error: {0}")]
    Record(String),
}

/// Result type alias for installwiz operations
pub type Result<T> = std::result::Result<T, InstallerError>;

impl InstallerError {
    /// Create a panel view construction error
    pub fn panel_view(panel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PanelView {
            panel: panel.into(),
            reason: reason.into(),
        }
    }

    /// Create a record error
    pub fn record(msg: impl Into<String>) -> Self {
        Self::Record(msg.into())
    }

    /// Returns true if this error must terminate the installation
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Refresh(e) if e.kind() == ErrorKind::Fatal)
    }
}

/// Classification of a refresh failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// Configuration defect, propagated unchanged
    Fatal,
    /// Any other evaluation failure, wrapped with the variable name
    Wrapped,
}

/// Error returned by a dynamic variable refresh pass.
///
/// A refresh is all-or-nothing: when this error is returned no variable
/// was set or unset by the failed pass.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("{message}")]
    Fatal { name: String, message: String },

    #[error("failed to refresh dynamic variable {name}")]
    Wrapped {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RefreshError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fatal { .. } => ErrorKind::Fatal,
            Self::Wrapped { .. } => ErrorKind::Wrapped,
        }
    }

    /// Name of the dynamic variable whose evaluation failed
    pub fn variable(&self) -> &str {
        match self {
            Self::Fatal { name, .. } | Self::Wrapped { name, .. } => name,
        }
    }
}

/// Error raised by an expression evaluator for a single dynamic variable
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// The expression itself is broken; aborts the refresh unchanged
    #[error("{0}")]
    Fatal(String),

    /// Anything else; wrapped with the variable name by the refresh pass
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EvaluationError {
    /// Create a fatal evaluation error
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }
}

/// Error raised by a substitutor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubstitutionError {
    #[error("Unterminated placeholder at offset {offset} in '{input}'")]
    Unterminated { input: String, offset: usize },

    #[error("Substitution failed: {0}")]
    Failed(String),
}

impl From<SubstitutionError> for EvaluationError {
    fn from(err: SubstitutionError) -> Self {
        EvaluationError::Other(anyhow::Error::new(err))
    }
}
