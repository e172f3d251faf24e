// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error types for the syndication service

use std::time::Duration;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Feeds are currently disabled")]
    FeedDisabled,

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Content source error: {0}")]
    Content(String),

    #[error("Content query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("Rate limit store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Stable machine-readable code, used in logs and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FeedDisabled => "FEED_DISABLED",
            Self::Generation(_) => "GENERATION_FAILED",
            Self::Content(_) => "CONTENT_ERROR",
            Self::Timeout(_) => "CONTENT_TIMEOUT",
            Self::ConfigUnavailable(_) => "CONFIG_UNAVAILABLE",
            Self::Store(_) => "STORE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::FeedDisabled.code(), "FEED_DISABLED");
        assert_eq!(
            AppError::Timeout(Duration::from_secs(5)).code(),
            "CONTENT_TIMEOUT"
        );
    }

    #[test]
    fn test_display_embeds_message() {
        let err = AppError::Generation("template exploded".to_string());
        assert_eq!(err.to_string(), "Generation failed: template exploded");
    }
}
