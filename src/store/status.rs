use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::errors::StoreError;

/// Status codes reported by the store for every remote call and stream completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Success,
    ClientCancelled,
    ClientInternalError,
    SchemeError,
    BadRequest,
    SessionExpired,
    Unavailable,
    Overloaded,
    Timeout,
    NotFound,
    AlreadyExists,
    PreconditionFailed,
    GenericError,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::ClientCancelled => "CLIENT_CANCELLED",
            StatusCode::ClientInternalError => "CLIENT_INTERNAL_ERROR",
            StatusCode::SchemeError => "SCHEME_ERROR",
            StatusCode::BadRequest => "BAD_REQUEST",
            StatusCode::SessionExpired => "SESSION_EXPIRED",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::Overloaded => "OVERLOADED",
            StatusCode::Timeout => "TIMEOUT",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::PreconditionFailed => "PRECONDITION_FAILED",
            StatusCode::GenericError => "GENERIC_ERROR",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A store status: a code plus the human-readable issues attached to it.
/// Successful statuses may still carry informational issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    code: StatusCode,
    issues: Vec<String>,
}

impl Status {
    pub fn success() -> Self {
        Self {
            code: StatusCode::Success,
            issues: Vec::new(),
        }
    }

    pub fn new(code: StatusCode, issue: impl Into<String>) -> Self {
        Self {
            code,
            issues: vec![issue.into()],
        }
    }

    pub fn with_issues(code: StatusCode, issues: Vec<String>) -> Self {
        Self { code, issues }
    }

    pub fn cancelled() -> Self {
        Self::new(StatusCode::ClientCancelled, "stream cancelled by client")
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == StatusCode::ClientCancelled
    }

    pub fn expect_success(self, context: impl Into<String>) -> Result<(), StoreError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(StoreError::new(context, self))
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.issues.join("; "))
        }
    }
}
