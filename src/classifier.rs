//! Failure classification for the recovery machinery.
//!
//! Classification is an ordered keyword scan over the error message, so it
//! works for any failure the pipeline sees: typed fetch errors, transport
//! errors stringified by reqwest, serde parse errors. The first matching
//! rule wins and the rules never change order at runtime.

use serde::{Deserialize, Serialize};

use crate::fetch::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Network,
    NotFound,
    DataStructure,
    Validation,
    System,
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Network => "network",
            ErrorType::NotFound => "not_found",
            ErrorType::DataStructure => "data_structure",
            ErrorType::Validation => "validation",
            ErrorType::System => "system",
            ErrorType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered so that comparisons read naturally: Low < Moderate < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::Critical => "critical",
        };
        write!(f, "{}", label)
    }
}

/// What the pipeline should do about a failure of this class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Worth retrying with backoff.
    Retry,
    /// Do not waste recovery tiers on it (e.g. the entity does not exist).
    Skip,
    /// Salvage what the payload still offers.
    PartialData,
    /// Fall through the degradation tiers.
    GracefulDegradation,
    /// Give up on this entity immediately.
    Abort,
    /// One more attempt, then treat as Skip.
    RetryThenSkip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub error_type: ErrorType,
    pub severity: Severity,
    pub strategy: RecoveryStrategy,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        ErrorClassifier
    }

    /// Classify a failure by its message. Deterministic: the rules are
    /// scanned in a fixed order and the first hit wins.
    pub fn classify(&self, message: &str) -> ErrorClassification {
        let msg = message.to_lowercase();

        if contains_any(&msg, &["network", "timeout", "timed out", "connection", "connect", "dns"]) {
            return ErrorClassification {
                error_type: ErrorType::Network,
                severity: Severity::Moderate,
                strategy: RecoveryStrategy::Retry,
            };
        }

        if msg.contains("404") || msg.contains("not found") {
            return ErrorClassification {
                error_type: ErrorType::NotFound,
                severity: Severity::Low,
                strategy: RecoveryStrategy::Skip,
            };
        }

        if contains_any(&msg, &["parse", "json", "null", "undefined", "unexpected end"]) {
            return ErrorClassification {
                error_type: ErrorType::DataStructure,
                severity: Severity::Moderate,
                strategy: RecoveryStrategy::PartialData,
            };
        }

        if contains_any(&msg, &["validation", "invalid"]) {
            return ErrorClassification {
                error_type: ErrorType::Validation,
                severity: Severity::Low,
                strategy: RecoveryStrategy::GracefulDegradation,
            };
        }

        if contains_any(&msg, &["memory", "system", "fatal"]) {
            return ErrorClassification {
                error_type: ErrorType::System,
                severity: Severity::Critical,
                strategy: RecoveryStrategy::Abort,
            };
        }

        ErrorClassification {
            error_type: ErrorType::Unknown,
            severity: Severity::Moderate,
            strategy: RecoveryStrategy::RetryThenSkip,
        }
    }

    pub fn classify_error(&self, error: &IngestError) -> ErrorClassification {
        self.classify(&error.to_string())
    }

    /// Backoff multiplier per severity: network-class failures wait longer
    /// than cheap validation misses.
    pub fn delay_factor(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => 0.5,
            Severity::Moderate => 1.0,
            Severity::Critical => 2.0,
        }
    }
}

fn contains_any(message: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| message.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(message: &str) -> ErrorClassification {
        ErrorClassifier::new().classify(message)
    }

    #[test]
    fn test_network_errors_retry() {
        for message in [
            "network error: connection refused",
            "request timed out after 20s",
            "Connection reset by peer",
            "dns lookup failed",
        ] {
            let c = classify(message);
            assert_eq!(c.error_type, ErrorType::Network, "message: {}", message);
            assert_eq!(c.severity, Severity::Moderate);
            assert_eq!(c.strategy, RecoveryStrategy::Retry);
        }
    }

    #[test]
    fn test_not_found_skips() {
        let c = classify("entity 'ember-wolf' not found (HTTP 404)");
        assert_eq!(c.error_type, ErrorType::NotFound);
        assert_eq!(c.severity, Severity::Low);
        assert_eq!(c.strategy, RecoveryStrategy::Skip);

        let c = classify("server said 404");
        assert_eq!(c.error_type, ErrorType::NotFound);
    }

    #[test]
    fn test_data_structure_salvages_partial() {
        for message in [
            "payload parse error: expected value at line 1",
            "json object missing",
            "field was null",
            "undefined entry in modules",
        ] {
            let c = classify(message);
            assert_eq!(c.error_type, ErrorType::DataStructure, "message: {}", message);
            assert_eq!(c.strategy, RecoveryStrategy::PartialData);
        }
    }

    #[test]
    fn test_validation_degrades_gracefully() {
        let c = classify("validation failed: name is empty");
        assert_eq!(c.error_type, ErrorType::Validation);
        assert_eq!(c.severity, Severity::Low);
        assert_eq!(c.strategy, RecoveryStrategy::GracefulDegradation);
    }

    #[test]
    fn test_system_errors_are_critical() {
        let c = classify("fatal: out of memory");
        assert_eq!(c.error_type, ErrorType::System);
        assert_eq!(c.severity, Severity::Critical);
        assert_eq!(c.strategy, RecoveryStrategy::Abort);
    }

    #[test]
    fn test_unknown_fallback() {
        let c = classify("something odd happened");
        assert_eq!(c.error_type, ErrorType::Unknown);
        assert_eq!(c.severity, Severity::Moderate);
        assert_eq!(c.strategy, RecoveryStrategy::RetryThenSkip);

        let c = classify("");
        assert_eq!(c.error_type, ErrorType::Unknown);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // Contains both "json" (data structure) and "invalid" (validation);
        // the data-structure rule comes first.
        let c = classify("invalid json in response body");
        assert_eq!(c.error_type, ErrorType::DataStructure);

        // "timeout" outranks "not found"
        let c = classify("timeout while checking a not found page");
        assert_eq!(c.error_type, ErrorType::Network);
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        let c = classify("NETWORK UNREACHABLE");
        assert_eq!(c.error_type, ErrorType::Network);
    }

    #[test]
    fn test_delay_factor_ordering() {
        let classifier = ErrorClassifier::new();
        assert!(classifier.delay_factor(Severity::Low) < classifier.delay_factor(Severity::Moderate));
        assert!(
            classifier.delay_factor(Severity::Moderate) < classifier.delay_factor(Severity::Critical)
        );
    }
}
