//! Element descriptor types
//!
//! The descriptor is the serializable record handed to planners and
//! executors. It holds no live handle and is never updated in place.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{BoundingBox, Result, TargetingError, VisualPosition};
use crate::descriptor::roles::effective_role;
use crate::page::Locator;

/// Snapshot of one DOM element at scan time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    /// Scan-local id referenced by plan steps
    pub id: String,
    /// Lowercase tag name
    pub tag: String,
    /// First characters of visible text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_snippet: Option<String>,
    #[serde(default)]
    pub identity_attributes: IdentityAttributes,
    /// Derived locators, present in structural mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structural: Option<StructuralLocators>,
    /// CSS strategies, most stable first
    pub candidate_selectors: Vec<String>,
    /// XPath strategies: aria, text, id, positional
    #[serde(default)]
    pub candidate_xpaths: Vec<String>,
    pub css_path: String,
    /// Identity key within one scan; empty when the element has no
    /// distinguishing attributes
    #[serde(default)]
    pub fingerprint: String,
    pub confidence_tier: ConfidenceTier,
    #[serde(default)]
    pub interaction_score: u32,
    /// Advisory; stale once the page changes
    #[serde(default)]
    pub bounding_box: BoundingBox,
    pub category: ElementCategory,
    #[serde(default)]
    pub supported_actions: Vec<String>,
    #[serde(default = "unknown_purpose")]
    pub purpose: String,
}

fn unknown_purpose() -> String {
    "unknown".to_string()
}

/// Attributes that identify an element independently of layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_described_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_controls: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
}

/// Layout-derived locators that avoid volatile attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralLocators {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<String>,
    pub positional: String,
    #[serde(default)]
    pub attribute_based: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    pub visual_position: VisualPosition,
}

/// Coarse reliability of a descriptor's best strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceTier::High => write!(f, "high"),
            ConfidenceTier::Medium => write!(f, "medium"),
            ConfidenceTier::Low => write!(f, "low"),
        }
    }
}

/// What kind of control an element is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementCategory {
    Button,
    InputText,
    InputPassword,
    InputEmail,
    SubmitButton,
    Textarea,
    Dropdown,
    Link,
    Form,
    Heading,
    Image,
    Checkbox,
    Radio,
    Clickable,
    Generic,
}

impl ElementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementCategory::Button => "button",
            ElementCategory::InputText => "input_text",
            ElementCategory::InputPassword => "input_password",
            ElementCategory::InputEmail => "input_email",
            ElementCategory::SubmitButton => "submit_button",
            ElementCategory::Textarea => "textarea",
            ElementCategory::Dropdown => "dropdown",
            ElementCategory::Link => "link",
            ElementCategory::Form => "form",
            ElementCategory::Heading => "heading",
            ElementCategory::Image => "image",
            ElementCategory::Checkbox => "checkbox",
            ElementCategory::Radio => "radio",
            ElementCategory::Clickable => "clickable",
            ElementCategory::Generic => "generic",
        }
    }
}

impl fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ElementDescriptor {
    /// Check the invariants a stored descriptor must satisfy before use
    pub fn validate(&self) -> Result<()> {
        if self.tag.trim().is_empty() || self.candidate_selectors.is_empty() {
            return Err(TargetingError::AmbiguousDescriptor(format!(
                "{} ({})",
                self.tag, self.id
            )));
        }
        Ok(())
    }

    /// Explicit role, or the implicit ARIA role of the tag
    pub fn effective_role(&self) -> Option<String> {
        effective_role(
            self.identity_attributes.role.as_deref(),
            &self.tag,
            self.identity_attributes.input_type.as_deref(),
            self.category == ElementCategory::Link,
        )
    }

    /// Every exact strategy in attempt order: CSS first, then XPath
    pub fn locators(&self) -> impl Iterator<Item = Locator> + '_ {
        self.candidate_selectors
            .iter()
            .map(|s| Locator::Css(s.clone()))
            .chain(self.candidate_xpaths.iter().map(|x| Locator::XPath(x.clone())))
    }

    /// Key used to collapse duplicates within one scan
    pub fn dedup_key(&self) -> &str {
        if !self.fingerprint.is_empty() {
            &self.fingerprint
        } else if let Some(xpath) = self.candidate_xpaths.first() {
            xpath
        } else {
            &self.css_path
        }
    }

    pub fn supports(&self, action: &str) -> bool {
        self.supported_actions.iter().any(|a| a == action)
    }

    /// One-line description for listings and prompts
    pub fn label(&self) -> String {
        let name = self
            .identity_attributes
            .aria_label
            .as_deref()
            .or(self.text_snippet.as_deref())
            .or(self.identity_attributes.placeholder.as_deref())
            .or(self.identity_attributes.title.as_deref())
            .or(self.identity_attributes.name.as_deref())
            .unwrap_or("");
        let name: String = name.chars().take(60).collect();
        format!("{} <{}> \"{}\"", self.category, self.tag, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ElementDescriptor {
        ElementDescriptor {
            id: "el-0".into(),
            tag: "button".into(),
            text_snippet: Some("Send".into()),
            identity_attributes: IdentityAttributes {
                aria_label: Some("Send".into()),
                ..Default::default()
            },
            structural: None,
            candidate_selectors: vec![r#"button[aria-label="Send"]"#.into()],
            candidate_xpaths: vec![r#"//button[@aria-label="Send"]"#.into()],
            css_path: "html > body > button".into(),
            fingerprint: "button|Send".into(),
            confidence_tier: ConfidenceTier::High,
            interaction_score: 8,
            bounding_box: BoundingBox::default(),
            category: ElementCategory::Button,
            supported_actions: vec!["click".into(), "hover".into()],
            purpose: "submit".into(),
        }
    }

    #[test]
    fn test_export_shape_is_camel_case() {
        let json = serde_json::to_value(descriptor()).unwrap();
        assert_eq!(json["confidenceTier"], "high");
        assert_eq!(json["category"], "button");
        assert_eq!(json["identityAttributes"]["ariaLabel"], "Send");
        assert!(json["identityAttributes"].get("role").is_none());
        assert!(json.get("structural").is_none());
    }

    #[test]
    fn test_validate_rejects_empty_candidates() {
        let mut d = descriptor();
        assert!(d.validate().is_ok());
        d.candidate_selectors.clear();
        assert!(matches!(
            d.validate(),
            Err(TargetingError::AmbiguousDescriptor(_))
        ));
    }

    #[test]
    fn test_locators_css_before_xpath() {
        let locators: Vec<Locator> = descriptor().locators().collect();
        assert!(matches!(locators[0], Locator::Css(_)));
        assert!(matches!(locators[1], Locator::XPath(_)));
    }

    #[test]
    fn test_dedup_key_fallbacks() {
        let mut d = descriptor();
        assert_eq!(d.dedup_key(), "button|Send");
        d.fingerprint.clear();
        assert_eq!(d.dedup_key(), r#"//button[@aria-label="Send"]"#);
        d.candidate_xpaths.clear();
        assert_eq!(d.dedup_key(), "html > body > button");
    }

    #[test]
    fn test_effective_role_uses_implicit_role() {
        assert_eq!(descriptor().effective_role().as_deref(), Some("button"));
    }
}
