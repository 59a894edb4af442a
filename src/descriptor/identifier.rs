//! Random identifier detection
//!
//! Framework-generated ids and data values change on every render, so they
//! must never become selectors. The pattern is configurable because any fixed
//! threshold misclassifies some ids.

use regex::{Regex, RegexBuilder};

use crate::core::{Result, TargetingError};

/// Default pattern: long runs of hex digits and dashes (hashes, UUIDs)
pub const DEFAULT_RANDOM_ID_PATTERN: &str = r"^[a-f0-9-]{20,}$";

/// Predicate deciding whether an attribute value looks generated
#[derive(Debug, Clone)]
pub struct RandomIdPredicate {
    pattern: Regex,
}

impl RandomIdPredicate {
    /// Build a case-insensitive predicate from a regex pattern
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| TargetingError::config(format!("Invalid random id pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Whether the value looks framework-generated
    pub fn is_random(&self, value: &str) -> bool {
        self.pattern.is_match(value.trim())
    }

    /// Present, non-empty and not generated
    pub fn is_stable(&self, value: &str) -> bool {
        !value.trim().is_empty() && !self.is_random(value)
    }
}

impl Default for RandomIdPredicate {
    fn default() -> Self {
        Self::new(DEFAULT_RANDOM_ID_PATTERN).expect("default random id pattern compiles")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern() {
        let predicate = RandomIdPredicate::default();
        assert!(predicate.is_random("3f2a9c1e-77b0-4d2e-9a51-0c1e2f3a4b5c"));
        assert!(predicate.is_random("A1B2C3D4E5F60718293A"));
        assert!(!predicate.is_random("submit-button"));
        assert!(!predicate.is_random("abc123"));
        assert!(predicate.is_stable("email"));
        assert!(!predicate.is_stable("  "));
    }

    #[test]
    fn test_custom_pattern() {
        let predicate = RandomIdPredicate::new(r"^(:r\d+:|ember\d+)$").unwrap();
        assert!(predicate.is_random(":r12:"));
        assert!(predicate.is_random("ember431"));
        assert!(!predicate.is_random("3f2a9c1e77b04d2e9a51"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = RandomIdPredicate::new("([").unwrap_err();
        assert!(matches!(err, TargetingError::Config(_)));
    }
}
