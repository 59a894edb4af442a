//! Scan-local deduplication
//!
//! Keeps the first descriptor for each key (fingerprint, then first XPath,
//! then CSS path) and preserves first-seen order. Idempotent.

use std::collections::HashSet;

use crate::descriptor::model::ElementDescriptor;

/// Collapse descriptors that refer to the same logical element
pub fn dedup(items: Vec<ElementDescriptor>) -> Vec<ElementDescriptor> {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|d| seen.insert(d.dedup_key().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BoundingBox;
    use crate::descriptor::model::{ConfidenceTier, ElementCategory, IdentityAttributes};

    fn item(id: &str, fingerprint: &str, xpath: Option<&str>, css_path: &str) -> ElementDescriptor {
        ElementDescriptor {
            id: id.into(),
            tag: "div".into(),
            text_snippet: None,
            identity_attributes: IdentityAttributes::default(),
            structural: None,
            candidate_selectors: vec![css_path.into()],
            candidate_xpaths: xpath.into_iter().map(str::to_string).collect(),
            css_path: css_path.into(),
            fingerprint: fingerprint.into(),
            confidence_tier: ConfidenceTier::Low,
            interaction_score: 0,
            bounding_box: BoundingBox::default(),
            category: ElementCategory::Generic,
            supported_actions: vec![],
            purpose: "unknown".into(),
        }
    }

    #[test]
    fn test_keeps_first_occurrence_in_order() {
        let out = dedup(vec![
            item("a", "div|menu", None, "p1"),
            item("b", "div|nav", None, "p2"),
            item("c", "div|menu", None, "p3"),
        ]);
        let ids: Vec<&str> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_fingerprint_falls_back_to_xpath_then_css() {
        let out = dedup(vec![
            item("a", "", Some("/html[1]/body[1]/div[1]"), "p1"),
            item("b", "", Some("/html[1]/body[1]/div[2]"), "p2"),
            item("c", "", Some("/html[1]/body[1]/div[1]"), "p3"),
            item("d", "", None, "p4"),
            item("e", "", None, "p4"),
        ]);
        let ids: Vec<&str> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "d"]);
    }

    #[test]
    fn test_idempotent() {
        let input = vec![
            item("a", "x", None, "p1"),
            item("b", "x", None, "p2"),
            item("c", "", Some("//c"), "p3"),
            item("d", "", Some("//c"), "p4"),
            item("e", "y", None, "p5"),
        ];
        let once = dedup(input);
        let twice = dedup(once.clone());
        assert_eq!(once, twice);
    }
}
