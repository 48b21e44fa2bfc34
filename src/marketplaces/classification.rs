//! Table-driven classification of marketplace failures.

use std::collections::HashSet;

use super::strategy::MarketplaceFailure;

/// Message fragments that mark a failure as transient when no code matches
pub const TRANSIENT_ERROR_PATTERNS: &[&str] = &[
    "timeout",
    "connection",
    "network",
    "rate limit",
    "temporary",
    "service unavailable",
    "internal server error",
    "gateway timeout",
];

pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
pub const TIMEOUT_ERROR: &str = "TIMEOUT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Retryable,
    Permanent,
}

/// Per-marketplace mapping from error codes to retry decisions.
///
/// Lookup order: exact code in the permanent set, exact code in the retryable
/// set, then the transient message patterns. Anything else is permanent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorClassificationTable {
    retryable: HashSet<String>,
    permanent: HashSet<String>,
}

impl ErrorClassificationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codes produced by the HTTP transport itself
    pub fn http_defaults() -> Self {
        Self::new()
            .retryable([
                NETWORK_ERROR,
                TIMEOUT_ERROR,
                "HTTP_408",
                "HTTP_429",
                "HTTP_500",
                "HTTP_502",
                "HTTP_503",
                "HTTP_504",
            ])
            .permanent(["HTTP_400", "HTTP_401", "HTTP_403", "HTTP_404", "HTTP_409", "HTTP_422"])
    }

    pub fn retryable<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.retryable
            .extend(codes.into_iter().map(|c| c.as_ref().to_ascii_lowercase()));
        self
    }

    pub fn permanent<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.permanent
            .extend(codes.into_iter().map(|c| c.as_ref().to_ascii_lowercase()));
        self
    }

    pub fn classify(&self, failure: &MarketplaceFailure) -> FailureClass {
        let code = failure.error_code.to_ascii_lowercase();
        if self.permanent.contains(&code) {
            return FailureClass::Permanent;
        }
        if self.retryable.contains(&code) {
            return FailureClass::Retryable;
        }
        if is_transient_message(&failure.message) {
            FailureClass::Retryable
        } else {
            FailureClass::Permanent
        }
    }
}

/// Whether free-form error text looks like a transient upstream condition
pub fn is_transient_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    TRANSIENT_ERROR_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}
