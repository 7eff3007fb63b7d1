//! Error message classification
//!
//! Maps free-form failure text from backends, the store and item history onto
//! a small set of categories. Three of them are treated as critical patterns
//! by the escalation rules.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static DEPLOYMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(deploy|function not found|edge function|boot error|worker (failed|crashed)|version mismatch|out of sync)")
        .unwrap()
});

static DATABASE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(database|postgres|sql|relation .* does not exist|deadlock|constraint|PGRST\d+)")
        .unwrap()
});

static STORAGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(storage|bucket|object not found|signed url|access denied|permission denied|403)")
        .unwrap()
});

static TIMEOUT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(timeout|timed out|deadline exceeded|504)").unwrap());

static NETWORK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(connection (refused|reset|closed)|dns|network|unreachable|502|503)").unwrap()
});

/// Failure classes observed by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Backend code and its deployment out of step
    DeploymentSync,
    Database,
    /// Blob storage read/write/permission failures
    StorageAccess,
    Timeout,
    Network,
    Other,
}

impl ErrorCategory {
    /// Categories matched by the `critical_error_pattern` trigger.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::DeploymentSync | Self::Database | Self::StorageAccess
        )
    }

    /// Classify one message. Earlier patterns win.
    pub fn classify(message: &str) -> Self {
        if DEPLOYMENT_PATTERN.is_match(message) {
            Self::DeploymentSync
        } else if DATABASE_PATTERN.is_match(message) {
            Self::Database
        } else if STORAGE_PATTERN.is_match(message) {
            Self::StorageAccess
        } else if TIMEOUT_PATTERN.is_match(message) {
            Self::Timeout
        } else if NETWORK_PATTERN.is_match(message) {
            Self::Network
        } else {
            Self::Other
        }
    }

    /// Unique categories of `messages`, in first-seen order.
    pub fn classify_all<S: AsRef<str>>(messages: &[S]) -> Vec<Self> {
        let mut seen = Vec::new();
        for msg in messages {
            let category = Self::classify(msg.as_ref());
            if !seen.contains(&category) {
                seen.push(category);
            }
        }
        seen
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeploymentSync => write!(f, "deployment_sync"),
            Self::Database => write!(f, "database"),
            Self::StorageAccess => write!(f, "storage_access"),
            Self::Timeout => write!(f, "timeout"),
            Self::Network => write!(f, "network"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_critical_classes() {
        assert_eq!(
            ErrorCategory::classify("Edge function returned boot error"),
            ErrorCategory::DeploymentSync
        );
        assert_eq!(
            ErrorCategory::classify("relation \"images\" does not exist"),
            ErrorCategory::Database
        );
        assert_eq!(
            ErrorCategory::classify("Storage bucket access denied"),
            ErrorCategory::StorageAccess
        );
    }

    #[test]
    fn test_classify_non_critical() {
        assert_eq!(ErrorCategory::classify("request timed out"), ErrorCategory::Timeout);
        assert_eq!(
            ErrorCategory::classify("connection refused"),
            ErrorCategory::Network
        );
        assert_eq!(ErrorCategory::classify("model said no"), ErrorCategory::Other);
        assert!(!ErrorCategory::Timeout.is_critical());
        assert!(ErrorCategory::Database.is_critical());
    }

    #[test]
    fn test_classify_all_dedups_in_order() {
        let cats = ErrorCategory::classify_all(&[
            "timeout waiting for AI",
            "postgres deadlock detected",
            "timed out again",
        ]);
        assert_eq!(cats, vec![ErrorCategory::Timeout, ErrorCategory::Database]);
    }
}
