//! Unified error types for wombo

use std::time::Duration;
use thiserror::Error;

/// Unified error type for all Dream client operations
///
/// Each pipeline stage reports exactly one category, and the orchestrator
/// hands it to the caller untouched.
#[derive(Error, Debug)]
pub enum DreamError {
    // Scraping errors
    #[error("Parse error: {0}")]
    Parse(String),

    // Credential errors
    #[error("Auth error: {0}")]
    Auth(String),

    // Task errors
    #[error("Submission error: {0}")]
    Submission(String),

    #[error("Task {task_id} did not finish within {budget:?} ({polls} polls)")]
    Timeout {
        task_id: String,
        budget: Duration,
        polls: u32,
    },

    #[error("Task {task_id} failed: {reason}")]
    TaskFailed { task_id: String, reason: String },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    // Transport errors
    #[error("Network error: {0}")]
    Network(String),

    // Frame errors
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Decode error: {0}")]
    Decode(String),

    // Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DreamError {
    /// Whether the failure is a transport hiccup worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, DreamError::Network(_))
    }
}

/// Result type alias using DreamError
pub type Result<T> = std::result::Result<T, DreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_are_transient() {
        assert!(DreamError::Network("reset".to_string()).is_transient());
        assert!(!DreamError::Parse("no token".to_string()).is_transient());
        assert!(!DreamError::Auth("rejected".to_string()).is_transient());
        assert!(!DreamError::Timeout {
            task_id: "t".to_string(),
            budget: Duration::from_secs(60),
            polls: 20,
        }
        .is_transient());
    }

    #[test]
    fn test_timeout_message_names_task() {
        let err = DreamError::Timeout {
            task_id: "abc".to_string(),
            budget: Duration::from_secs(6),
            polls: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("2 polls"));
    }
}
