//! Serialized DOM records returned from inside the page
//!
//! These are the only shapes that cross the page boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::BoundingBox;
use crate::page::ElementHandle;

/// Result of one DOM walk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// URL at walk time
    #[serde(default)]
    pub url: String,
    /// Document title
    #[serde(default)]
    pub title: String,
    /// Elements in document order
    #[serde(default)]
    pub elements: Vec<RawElement>,
}

/// One element as seen by the in-page walker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawElement {
    /// Position in the walk, document order
    pub index: usize,
    /// Lowercase tag name
    pub tag: String,
    /// Visible text, whitespace collapsed
    #[serde(default)]
    pub text: Option<String>,
    /// Every attribute on the element
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    /// Ancestor chain from the document root down to the element itself
    #[serde(default)]
    pub path: Vec<PathSegment>,
    #[serde(default)]
    pub parent: Option<ParentInfo>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Computed cursor is `pointer`
    #[serde(default)]
    pub pointer_cursor: bool,
    /// Number of shadow roots between the document and the element
    #[serde(default)]
    pub shadow_depth: usize,
    /// Number of (same-origin) frames between the top document and the element
    #[serde(default)]
    pub frame_depth: usize,
}

fn default_visible() -> bool {
    true
}

/// One step of an ancestor chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathSegment {
    pub tag: String,
    /// 1-based index among siblings with the same tag
    pub nth_of_type: usize,
    /// Number of siblings sharing the tag, including this one
    pub of_type_count: usize,
    #[serde(default)]
    pub id: Option<String>,
}

/// Facts about the direct parent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentInfo {
    pub tag: String,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Lightweight record of a current element, used for fuzzy re-matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveElement {
    pub handle: ElementHandle,
    pub tag: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Explicit role, or the implicit ARIA role of the tag
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub bounding_box: BoundingBox,
}

impl RawElement {
    /// Non-empty trimmed attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Whether the attribute is present at all, even empty
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Non-empty trimmed text
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn is_disabled(&self) -> bool {
        self.has_attr("disabled") || self.attr("aria-disabled") == Some("true")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_element_from_walker_json() {
        let raw: RawElement = serde_json::from_value(serde_json::json!({
            "index": 3,
            "tag": "button",
            "text": "  Send ",
            "attributes": { "aria-label": "Send", "class": "btn" },
            "boundingBox": { "top": 10.0, "left": 20.0, "width": 60.0, "height": 24.0 },
            "path": [
                { "tag": "html", "nthOfType": 1, "ofTypeCount": 1 },
                { "tag": "body", "nthOfType": 1, "ofTypeCount": 1 },
                { "tag": "button", "nthOfType": 1, "ofTypeCount": 1 }
            ]
        }))
        .unwrap();

        assert_eq!(raw.attr("aria-label"), Some("Send"));
        assert_eq!(raw.text(), Some("Send"));
        assert!(raw.visible);
        assert_eq!(raw.path.len(), 3);
        assert!(raw.parent.is_none());
    }

    #[test]
    fn test_blank_attribute_is_absent() {
        let mut raw = RawElement::default();
        raw.attributes.insert("title".into(), "   ".into());
        raw.attributes.insert("disabled".into(), String::new());
        assert_eq!(raw.attr("title"), None);
        assert!(raw.is_disabled());
    }
}
