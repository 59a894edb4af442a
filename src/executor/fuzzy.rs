//! Fuzzy re-matching of a stored descriptor against current elements

use crate::descriptor::ElementDescriptor;
use crate::page::{ElementHandle, LiveElement};

const TAG_WEIGHT: u32 = 10;
const TEXT_WEIGHT: u32 = 20;
const ROLE_WEIGHT: u32 = 15;
const ARIA_LABEL_WEIGHT: u32 = 25;
const POSITION_WEIGHT: u32 = 15;
const PLACEHOLDER_WEIGHT: u32 = 20;

/// Text is matched on this many leading characters of the snippet
const TEXT_PREFIX_LEN: usize = 50;

/// Best-scoring current element
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    /// Position in the scored list (document order)
    pub index: usize,
    pub handle: ElementHandle,
    pub score: u32,
}

/// Weighted similarity scorer
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    threshold: u32,
    tolerance: f64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(30, 50.0)
    }
}

impl FuzzyMatcher {
    /// `threshold`: scores must be strictly greater. `tolerance`: corner
    /// distance in px under which the position bonus applies.
    pub fn new(threshold: u32, tolerance: f64) -> Self {
        Self {
            threshold,
            tolerance,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn accepts(&self, score: u32) -> bool {
        score > self.threshold
    }

    /// Similarity of one current element to the descriptor
    pub fn score(&self, descriptor: &ElementDescriptor, live: &LiveElement) -> u32 {
        let mut score = 0;

        if live.tag.eq_ignore_ascii_case(&descriptor.tag) {
            score += TAG_WEIGHT;
        }

        if let Some(snippet) = descriptor.text_snippet.as_deref() {
            let prefix: String = snippet.trim().chars().take(TEXT_PREFIX_LEN).collect();
            if !prefix.is_empty() && live.text.as_deref().is_some_and(|t| t.contains(&prefix)) {
                score += TEXT_WEIGHT;
            }
        }

        if let Some(role) = descriptor.effective_role() {
            if live
                .role
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(&role))
            {
                score += ROLE_WEIGHT;
            }
        }

        if let Some(label) = descriptor.identity_attributes.aria_label.as_deref() {
            if live.aria_label.as_deref() == Some(label) {
                score += ARIA_LABEL_WEIGHT;
            }
        }

        if !descriptor.bounding_box.is_empty()
            && !live.bounding_box.is_empty()
            && descriptor.bounding_box.corner_distance(&live.bounding_box) < self.tolerance
        {
            score += POSITION_WEIGHT;
        }

        if let Some(placeholder) = descriptor.identity_attributes.placeholder.as_deref() {
            if live.placeholder.as_deref() == Some(placeholder) {
                score += PLACEHOLDER_WEIGHT;
            }
        }

        score
    }

    /// Highest scorer above the threshold; ties go to the earliest element
    pub fn best_match(
        &self,
        descriptor: &ElementDescriptor,
        elements: &[LiveElement],
    ) -> Option<FuzzyMatch> {
        let mut best: Option<FuzzyMatch> = None;
        for (index, live) in elements.iter().enumerate() {
            let score = self.score(descriptor, live);
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(FuzzyMatch {
                    index,
                    handle: live.handle.clone(),
                    score,
                });
            }
        }
        best.filter(|b| self.accepts(b.score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BoundingBox;
    use crate::descriptor::{ConfidenceTier, ElementCategory, IdentityAttributes};

    fn send_button() -> ElementDescriptor {
        ElementDescriptor {
            id: "el-1".into(),
            tag: "button".into(),
            text_snippet: Some("Send".into()),
            identity_attributes: IdentityAttributes {
                aria_label: Some("Send".into()),
                ..Default::default()
            },
            structural: None,
            candidate_selectors: vec![r#"button[aria-label="Send"]"#.into()],
            candidate_xpaths: vec![],
            css_path: "button".into(),
            fingerprint: "button|Send".into(),
            confidence_tier: ConfidenceTier::High,
            interaction_score: 8,
            bounding_box: BoundingBox::new(100.0, 40.0, 80.0, 30.0),
            category: ElementCategory::Button,
            supported_actions: vec!["click".into(), "hover".into()],
            purpose: "submit".into(),
        }
    }

    fn live(handle: &str, tag: &str, text: Option<&str>, role: Option<&str>) -> LiveElement {
        LiveElement {
            handle: ElementHandle(handle.into()),
            tag: tag.into(),
            text: text.map(str::to_string),
            role: role.map(str::to_string),
            aria_label: None,
            placeholder: None,
            bounding_box: BoundingBox::default(),
        }
    }

    #[test]
    fn test_role_replacement_scores_fifty() {
        let matcher = FuzzyMatcher::default();
        let mut div = live("d", "div", Some("Send"), Some("button"));
        div.bounding_box = BoundingBox::new(104.0, 44.0, 80.0, 30.0);

        assert_eq!(matcher.score(&send_button(), &div), 50);
        let found = matcher.best_match(&send_button(), &[div]).unwrap();
        assert_eq!(found.score, 50);
        assert_eq!(found.handle.as_str(), "d");
    }

    #[test]
    fn test_threshold_is_strict() {
        let matcher = FuzzyMatcher::default();
        assert!(!matcher.accepts(30));
        assert!(matcher.accepts(31));

        // tag + text = 30
        let weak = live("w", "button", Some("Send now"), None);
        assert_eq!(matcher.score(&send_button(), &weak), 30);
        assert!(matcher.best_match(&send_button(), &[weak.clone()]).is_none());

        let lenient = FuzzyMatcher::new(29, 50.0);
        assert_eq!(lenient.best_match(&send_button(), &[weak]).unwrap().score, 30);
    }

    #[test]
    fn test_tie_goes_to_document_order() {
        let matcher = FuzzyMatcher::default();
        let first = live("first", "span", Some("Send"), Some("button"));
        let second = live("second", "a", Some("Send"), Some("button"));
        let found = matcher
            .best_match(&send_button(), &[first, second])
            .unwrap();
        assert_eq!(found.index, 0);
        assert_eq!(found.handle.as_str(), "first");
    }

    #[test]
    fn test_absent_descriptor_fields_never_score() {
        let matcher = FuzzyMatcher::default();
        let mut descriptor = send_button();
        descriptor.text_snippet = None;
        descriptor.identity_attributes.aria_label = None;
        descriptor.bounding_box = BoundingBox::default();

        let mut candidate = live("x", "div", Some("Send"), None);
        candidate.placeholder = Some("Send".into());
        candidate.aria_label = Some("Send".into());
        assert_eq!(matcher.score(&descriptor, &candidate), 0);
    }

    #[test]
    fn test_position_tolerance() {
        let matcher = FuzzyMatcher::default();
        let mut near = live("n", "p", None, None);
        near.bounding_box = BoundingBox::new(130.0, 59.0, 10.0, 10.0);
        let mut far = live("f", "p", None, None);
        far.bounding_box = BoundingBox::new(130.0, 60.0, 10.0, 10.0);

        assert_eq!(matcher.score(&send_button(), &near), 15);
        assert_eq!(matcher.score(&send_button(), &far), 0);
    }
}
