//! Executor module - Acting on elements through fallback strategies
//!
//! - **fallback**: ordered CSS, XPath, coordinate and fuzzy strategies
//! - **fuzzy**: weighted similarity against the current DOM
//! - **plan**: sequential plan steps with fallback elements

pub mod fallback;
pub mod fuzzy;
pub mod plan;

pub use fallback::{ActionOutcome, Attempt, FallbackExecutor, Method, ALL_STRATEGIES_FAILED};
pub use fuzzy::{FuzzyMatch, FuzzyMatcher};
pub use plan::{load_plan, PlanRunner, PlanStep, StepResult, StepStatus};
