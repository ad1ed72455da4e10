//! WC-007: Error taxonomy for recipe validation, evaluation, dispatch, plugins, and sessions.
//!
//! Configuration and session errors are fatal for a run. Everything a step can
//! raise is folded into [`StepError`], which the step executor classifies
//! against the step's `ignore_errors` flag.

use std::fmt;
use thiserror::Error;

/// A single structural problem in a recipe document, located by a
/// JSON-pointer-style path such as `/tasks/0/steps/2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "/ {}", self.message)
        } else {
            write!(f, "{} {}", self.path, self.message)
        }
    }
}

/// Recipe-level configuration error. Always fatal, never subject to `ignore_errors`.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Invalid recipe format: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error("malformed step at {path}: {reason}")]
    MalformedStep { path: String, reason: String },

    #[error("recipe parse error: {0}")]
    Parse(String),
}

impl ConfigError {
    /// Every validation error carried by this configuration error.
    pub fn errors(&self) -> Vec<ValidationError> {
        match self {
            Self::Invalid(errors) => errors.clone(),
            Self::MalformedStep { path, reason } => vec![ValidationError::new(path, reason)],
            Self::Parse(msg) => vec![ValidationError::new("", msg)],
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Expression evaluation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("reference to unset variable '{0}'")]
    UnknownVariable(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("type error: {0}")]
    Type(String),
}

/// Session collaborator failure (open / navigate / close / page primitive).
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("failed to open session: {0}")]
    Open(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigate { url: String, reason: String },

    #[error("failed to close session: {0}")]
    Close(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("page error: {0}")]
    Page(String),
}

/// Failure raised inside a plugin invocation.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("timed out after {millis}ms: {what}")]
    Timeout { millis: u64, what: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Session(SessionError),

    #[error("{0}")]
    Failed(String),
}

impl From<SessionError> for PluginError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::ElementNotFound(selector) => Self::ElementNotFound(selector),
            other => Self::Session(other),
        }
    }
}

/// Broad class of a step failure, used for logs and the run journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Evaluation,
    Dispatch,
    Plugin,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evaluation => write!(f, "evaluation"),
            Self::Dispatch => write!(f, "dispatch"),
            Self::Plugin => write!(f, "plugin"),
        }
    }
}

/// Anything a step can fail with once it has been dispatched.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvalError),

    #[error("unknown plugin namespace '{0}'")]
    UnknownNamespace(String),

    #[error("unknown command '{command}' in plugin '{namespace}'")]
    UnknownCommand { namespace: String, command: String },

    #[error("payload of '{namespace}' has no string 'command' after substitution")]
    InvalidCommand { namespace: String },

    #[error("{namespace}.{command} failed: {source}")]
    Plugin {
        namespace: String,
        command: String,
        #[source]
        source: PluginError,
    },
}

impl StepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Evaluation(_) => ErrorKind::Evaluation,
            Self::UnknownNamespace(_) | Self::UnknownCommand { .. } | Self::InvalidCommand { .. } => {
                ErrorKind::Dispatch
            }
            Self::Plugin { .. } => ErrorKind::Plugin,
        }
    }
}
