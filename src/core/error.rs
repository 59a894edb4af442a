//! Error types for the targeting engine
//!
//! One enum covers strategy, step and ambient (browser, config, store) failures.

use thiserror::Error;

/// Main error type for targeting operations
#[derive(Error, Debug)]
pub enum TargetingError {
    /// A single selector or XPath did not resolve within its budget
    #[error("Strategy '{strategy}' timed out after {timeout_ms}ms")]
    StrategyTimeout { strategy: String, timeout_ms: u64 },

    /// No strategy, including fuzzy matching, located the element
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Descriptor carries no candidate selectors
    #[error("Ambiguous descriptor for <{0}>: no candidate selectors")]
    AmbiguousDescriptor(String),

    /// Element was located but the page refused the action
    #[error("Action rejected: {0}")]
    ActionRejected(String),

    /// Browser automation errors
    #[error("Browser error: {0}")]
    Browser(String),

    /// agent-browser not installed
    #[error("agent-browser not found. Install with: npm install -g agent-browser && agent-browser install")]
    AgentBrowserNotFound,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Descriptor store errors
    #[error("Store error: {0}")]
    Store(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for targeting operations
pub type Result<T> = std::result::Result<T, TargetingError>;

impl TargetingError {
    /// Create a strategy timeout error
    pub fn timeout(strategy: impl Into<String>, timeout_ms: u64) -> Self {
        Self::StrategyTimeout {
            strategy: strategy.into(),
            timeout_ms,
        }
    }

    /// Create an element-not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::ElementNotFound(msg.into())
    }

    /// Create an action-rejected error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::ActionRejected(msg.into())
    }

    /// Create a browser error
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Wrap an error with additional context
    pub fn with_context<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Whether this failure belongs to a single strategy attempt and should
    /// be recovered by moving on to the next strategy
    pub fn is_strategy_local(&self) -> bool {
        matches!(
            self,
            Self::StrategyTimeout { .. }
                | Self::ElementNotFound(_)
                | Self::ActionRejected(_)
                | Self::Browser(_)
        )
    }
}
