// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// Classification of a failed analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Timeout, network failure, rate limit or server error.
    Transient,

    /// Missing or rejected API credential.
    Auth,

    /// The model replied with something that didn't match the expected schema.
    InvalidResponse,

    /// File type or size the service can't take.
    Unsupported,

    /// The analyzer itself crashed.
    Internal,
}

impl FailureKind {
    /// Worth trying again without operator intervention?
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Transient | FailureKind::Internal)
    }

    fn hint(&self) -> &'static str {
        match self {
            FailureKind::Transient | FailureKind::Internal => "retryable",
            FailureKind::Auth => "not retryable, check configuration",
            FailureKind::InvalidResponse | FailureKind::Unsupported => "not retryable",
        }
    }
}

/// Why an analysis failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct AnalysisFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl AnalysisFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transient, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Auth, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidResponse, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unsupported, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, message)
    }

    /// Message saved against the meme, so an operator can tell at a glance
    /// whether a retry is worth it.
    pub fn persisted_message(&self) -> String {
        format!("{} ({}): {}", self.kind, self.kind.hint(), self.message)
    }
}

/// Validated reply from the AI model. One per meme, whatever the number of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    /// Never empty.
    pub description: String,

    /// Short, trimmed and unique when compared case-insensitively.
    pub tags: Vec<String>,

    pub references: Option<String>,

    pub template: Option<String>,

    pub caption: Option<String>,

    pub meaning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kind_names() {
        assert_eq!("invalid_response", FailureKind::InvalidResponse.as_ref());
        assert_eq!(FailureKind::Auth, FailureKind::from_str("auth").unwrap());
    }

    #[test]
    fn persisted_message_flags_retryability() {
        let timeout = AnalysisFailure::transient("request timed out after 60s");
        assert_eq!(
            "transient (retryable): request timed out after 60s",
            timeout.persisted_message()
        );

        let auth = AnalysisFailure::auth("HTTP 401");
        assert!(auth.persisted_message().starts_with("auth (not retryable"));
        assert!(!auth.kind.is_retryable());
    }
}
