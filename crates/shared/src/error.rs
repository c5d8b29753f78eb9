use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::Capability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    TypeMismatch,
    MissingCapability,
    CycleDetected,
    IdentityInstability,
    NotFound,
    NilInput,
    Timeout,
    Cancelled,
    InvalidInput,
    Io,
    Internal,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("type mismatch: expected {expected}")]
    TypeMismatch { expected: String },
    #[error("graph '{graph}' does not support {capability}")]
    MissingCapability {
        capability: Capability,
        graph: String,
    },
    #[error("graph contains cycles: {0}")]
    CycleDetected(String),
    #[error("identity instability: {0}")]
    IdentityInstability(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("nil input: {0}")]
    NilInput(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("cancelled: {0}")]
    Cancelled(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GraphError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::MissingCapability { .. } => ErrorCode::MissingCapability,
            Self::CycleDetected(_) => ErrorCode::CycleDetected,
            Self::IdentityInstability(_) => ErrorCode::IdentityInstability,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::NilInput(_) => ErrorCode::NilInput,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::Cancelled(_) => ErrorCode::Cancelled,
            Self::InvalidInput(_) | Self::Json(_) => ErrorCode::InvalidInput,
            Self::Io(_) => ErrorCode::Io,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn type_mismatch<T: ?Sized>() -> Self {
        Self::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
        }
    }
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// Serializable record of a captured failure, kept for the visible error list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&GraphError> for ErrorReport {
    fn from(value: &GraphError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

impl From<GraphError> for ErrorReport {
    fn from(value: GraphError) -> Self {
        Self::from(&value)
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}
