//! Confidence ranking
//!
//! high: a semantic compound selector exists.
//! medium: otherwise, at least one stable attribute selector exists.
//! low: only structural, text and coordinate strategies remain.

use crate::descriptor::model::ConfidenceTier;

/// What the builder found while generating candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrategySignals {
    /// A `tag[aria-label]` or `tag[role]` compound was emitted
    pub semantic: bool,
    /// Count of data/test-id/label/id/name/role/type selectors emitted
    pub stable_attributes: usize,
}

/// Classify the reliability tier of a descriptor
pub fn rank(signals: StrategySignals) -> ConfidenceTier {
    if signals.semantic {
        ConfidenceTier::High
    } else if signals.stable_attributes > 0 {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::Low
    }
}
