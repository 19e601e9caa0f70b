use serde::{Deserialize, Serialize};
use std::fmt;

const PERMISSION_HINT: &str = "Open System Settings > Privacy & Security and allow notelink under \
Accessibility and Screen Recording, then try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    PermissionDenied,
    NoActiveSession,
    NoMatchingWindow,
    ExternalServiceError,
    StateConflict,
}

/// Failures surfaced by the orchestrator. Every variant is recoverable by
/// retrying the action that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    PermissionDenied(String),
    NoActiveSession(String),
    NoMatchingWindow(String),
    ExternalService(String),
    StateConflict(String),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            AgentError::NoActiveSession(_) => ErrorKind::NoActiveSession,
            AgentError::NoMatchingWindow(_) => ErrorKind::NoMatchingWindow,
            AgentError::ExternalService(_) => ErrorKind::ExternalServiceError,
            AgentError::StateConflict(_) => ErrorKind::StateConflict,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AgentError::PermissionDenied(message)
            | AgentError::NoActiveSession(message)
            | AgentError::NoMatchingWindow(message)
            | AgentError::ExternalService(message)
            | AgentError::StateConflict(message) => message,
        }
    }

    pub fn report(&self) -> ErrorReport {
        let hint = match self.kind() {
            ErrorKind::PermissionDenied => Some(PERMISSION_HINT.to_string()),
            _ => None,
        };
        ErrorReport {
            kind: self.kind(),
            message: self.message().to_string(),
            hint,
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::PermissionDenied(message) => write!(f, "permission denied: {message}"),
            AgentError::NoActiveSession(message) => write!(f, "no active session: {message}"),
            AgentError::NoMatchingWindow(message) => write!(f, "no matching window: {message}"),
            AgentError::ExternalService(message) => write!(f, "external service error: {message}"),
            AgentError::StateConflict(message) => write!(f, "operation rejected: {message}"),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<reqwest::Error> for AgentError {
    fn from(error: reqwest::Error) -> Self {
        AgentError::ExternalService(error.to_string())
    }
}

/// Serializable view of the last failure, rendered by the UI as a banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub hint: Option<String>,
}
