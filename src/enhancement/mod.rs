//! # Content Enhancement
//!
//! The AI content capability consumed by the enhancement step: raw product
//! text in, enhanced description and SEO keywords out.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use openai::OpenAiContentEnhancer;

/// Raw product text handed to the enhancer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementRequest {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedContent {
    pub enhanced_description: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnhancementError {
    #[error("Enhancement rate limited: {0}")]
    RateLimited(String),

    #[error("Enhancement timed out")]
    Timeout,

    #[error("Enhancement backend unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed enhancement input: {0}")]
    MalformedInput(String),

    #[error("Enhancement rejected: {0}")]
    Rejected(String),

    #[error("Invalid enhancement response: {0}")]
    InvalidResponse(String),
}

impl EnhancementError {
    /// Transient conditions worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Timeout | Self::Unavailable(_) | Self::InvalidResponse(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::Timeout => "TIMEOUT",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::MalformedInput(_) => "MALFORMED_INPUT",
            Self::Rejected(_) => "REJECTED",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
        }
    }
}

/// AI content generation capability
#[async_trait]
pub trait ContentEnhancer: Send + Sync {
    async fn enhance(&self, request: &EnhancementRequest) -> Result<EnhancedContent, EnhancementError>;
}

/// Trim, drop empties, de-duplicate case-insensitively (first spelling wins)
/// and cap at `max`
pub fn normalize_keywords<I, S>(raw: I, max: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|kw| kw.as_ref().trim().to_string())
        .filter(|kw| !kw.is_empty())
        .filter(|kw| seen.insert(kw.to_lowercase()))
        .take(max)
        .collect()
}
