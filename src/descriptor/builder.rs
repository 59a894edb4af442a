//! Descriptor builder
//!
//! Turns one serialized element into an [`ElementDescriptor`]. Candidate
//! selectors are generated most-stable first:
//!
//! 1. semantic compound (`tag[aria-label]`, else `tag[role]`)
//! 2. test ids, then other stable `data-*` attributes
//! 3. `aria-label`, `title`, `placeholder`
//! 4. stable `id`, `name`
//! 5. `role`, `type` qualified tag
//! 6. parent relationship
//! 7. positional path, full CSS path
//! 8. text content (short text only)
//!
//! Root-relative paths are only candidates when they start at the top
//! document: a depth-capped path, or one computed inside a frame or shadow
//! root, would match whatever sits at the same position elsewhere.
//!
//! XPaths follow in their own list. Bounding box coordinates are kept on the
//! descriptor and only used by the executor.

use crate::core::config::{ScanConfig, MAX_PATH_DEPTH, MIN_PATH_DEPTH};
use crate::core::{Result, TargetingError};
use crate::descriptor::category::{categorize, infer_purpose, interaction_score, supported_actions};
use crate::descriptor::confidence::{rank, StrategySignals};
use crate::descriptor::identifier::RandomIdPredicate;
use crate::descriptor::model::{ElementDescriptor, IdentityAttributes, StructuralLocators};
use crate::descriptor::selector::{attr_selector, id_selector, text_selector, xpath_literal};
use crate::page::{PathSegment, RawElement};

const TEST_ID_ATTRIBUTES: [&str; 3] = ["data-testid", "data-test-id", "data-test"];

/// Attributes never used for attribute-based selectors
const VOLATILE_ATTRIBUTES: [&str; 3] = ["class", "id", "style"];

/// Longest attribute value worth turning into a selector
const MAX_ATTRIBUTE_VALUE_LEN: usize = 100;

/// Builder options derived from [`ScanConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderOptions {
    pub structural: bool,
    pub max_path_depth: usize,
    pub text_selector_max_len: usize,
    pub text_snippet_len: usize,
}

impl From<&ScanConfig> for BuilderOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            structural: config.structural,
            max_path_depth: config.path_depth(),
            text_selector_max_len: config.text_selector_max_len,
            text_snippet_len: config.text_snippet_len,
        }
    }
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

/// Ordered candidate list that ignores repeats
#[derive(Default)]
struct Candidates(Vec<String>);

impl Candidates {
    fn push(&mut self, candidate: String) -> bool {
        if candidate.is_empty() || self.0.contains(&candidate) {
            return false;
        }
        self.0.push(candidate);
        true
    }
}

/// Builds descriptors from serialized elements
#[derive(Debug, Clone, Default)]
pub struct DescriptorBuilder {
    options: BuilderOptions,
    random: RandomIdPredicate,
}

impl DescriptorBuilder {
    pub fn new(mut options: BuilderOptions, random: RandomIdPredicate) -> Self {
        options.max_path_depth = options.max_path_depth.clamp(MIN_PATH_DEPTH, MAX_PATH_DEPTH);
        Self { options, random }
    }

    /// Builder configured from the scan section of the config
    pub fn from_config(config: &ScanConfig) -> Result<Self> {
        Ok(Self::new(
            BuilderOptions::from(config),
            RandomIdPredicate::new(&config.random_id_pattern)?,
        ))
    }

    /// Build the descriptor for one element
    pub fn build(&self, raw: &RawElement) -> Result<ElementDescriptor> {
        let tag = raw.tag.trim().to_lowercase();
        if tag.is_empty() {
            return Err(TargetingError::AmbiguousDescriptor(format!(
                "element #{} has no tag",
                raw.index
            )));
        }

        let stable = |name: &str| raw.attr(name).filter(|v| self.random.is_stable(v));
        let text = raw.text().map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "));
        let short_text = text
            .as_deref()
            .filter(|t| t.chars().count() < self.options.text_selector_max_len);

        let mut candidates = Candidates::default();
        let mut signals = StrategySignals::default();

        // 1. semantic compound
        let semantic = stable("aria-label")
            .map(|label| attr_selector(Some(&tag), "aria-label", label))
            .or_else(|| stable("role").map(|role| attr_selector(Some(&tag), "role", role)));
        if let Some(selector) = &semantic {
            signals.semantic = candidates.push(selector.clone());
        }

        // 2. test ids, then other data attributes
        for name in TEST_ID_ATTRIBUTES {
            if let Some(value) = stable(name) {
                signals.stable_attributes +=
                    candidates.push(attr_selector(None, name, value)) as usize;
            }
        }
        for (name, value) in &raw.attributes {
            let value = value.trim();
            if name.starts_with("data-")
                && !TEST_ID_ATTRIBUTES.contains(&name.as_str())
                && value.len() <= MAX_ATTRIBUTE_VALUE_LEN
                && self.random.is_stable(value)
            {
                signals.stable_attributes +=
                    candidates.push(attr_selector(Some(&tag), name, value)) as usize;
            }
        }

        // 3. label-like attributes
        for name in ["aria-label", "title", "placeholder"] {
            if let Some(value) = stable(name) {
                signals.stable_attributes +=
                    candidates.push(attr_selector(None, name, value)) as usize;
            }
        }

        // 4. id and name
        if let Some(id) = stable("id") {
            signals.stable_attributes += candidates.push(id_selector(id)) as usize;
        }
        if let Some(name) = stable("name") {
            signals.stable_attributes +=
                candidates.push(attr_selector(Some(&tag), "name", name)) as usize;
        }

        // 5. role and type
        for name in ["role", "type"] {
            if let Some(value) = stable(name) {
                signals.stable_attributes +=
                    candidates.push(attr_selector(Some(&tag), name, value)) as usize;
            }
        }

        // 6. parent relationship
        let relationship = self.relationship(raw, &tag);
        if self.options.structural {
            if let Some(selector) = &relationship {
                candidates.push(selector.clone());
            }
        }

        // 7. positional and full path
        let top_level = raw.frame_depth == 0 && raw.shadow_depth == 0;
        let (window, complete) = self.path_window(&raw.path);
        let positional = positional_path(window, &tag);
        let css_path = self.css_path(&raw.path, &tag);
        if self.options.structural && top_level && complete {
            candidates.push(positional.clone());
        }
        if top_level || self.id_anchor(&raw.path).is_some() {
            candidates.push(css_path.clone());
        }

        // 8. text content
        if let Some(text) = short_text {
            candidates.push(text_selector(&tag, text));
        }

        let candidate_xpaths = self.xpaths(raw, &tag, short_text, top_level && complete);

        let structural = self.options.structural.then(|| StructuralLocators {
            semantic: semantic.clone(),
            positional,
            attribute_based: self.attribute_based(raw, &tag),
            relationship,
            visual_position: raw.bounding_box.rounded(),
        });

        let category = categorize(raw);
        let identity_attributes = identity_attributes(raw);
        let purpose = infer_purpose(&[
            identity_attributes.aria_label.as_deref(),
            text.as_deref(),
            identity_attributes.placeholder.as_deref(),
            identity_attributes.title.as_deref(),
            identity_attributes.name.as_deref(),
            identity_attributes.input_type.as_deref(),
        ]);

        let descriptor = ElementDescriptor {
            id: format!("el-{}", raw.index),
            tag: tag.clone(),
            text_snippet: text.map(|t| t.chars().take(self.options.text_snippet_len).collect()),
            fingerprint: fingerprint(&tag, &identity_attributes),
            identity_attributes,
            structural,
            candidate_selectors: candidates.0,
            candidate_xpaths,
            css_path,
            confidence_tier: rank(signals),
            interaction_score: interaction_score(raw, category),
            bounding_box: raw.bounding_box,
            category,
            supported_actions: supported_actions(category)
                .into_iter()
                .map(str::to_string)
                .collect(),
            purpose: purpose.to_string(),
        };

        descriptor.validate()?;
        Ok(descriptor)
    }

    fn relationship(&self, raw: &RawElement, tag: &str) -> Option<String> {
        let parent = raw.parent.as_ref()?;
        if let Some(label) = parent
            .aria_label
            .as_deref()
            .filter(|l| self.random.is_stable(l))
        {
            return Some(format!("{} > {}", attr_selector(None, "aria-label", label.trim()), tag));
        }
        parent
            .id
            .as_deref()
            .filter(|id| self.random.is_stable(id))
            .map(|id| format!("{} > {}", id_selector(id.trim()), tag))
    }

    /// Last `max_path_depth` segments, and whether nothing was cut
    fn path_window<'p>(&self, path: &'p [PathSegment]) -> (&'p [PathSegment], bool) {
        let start = path.len().saturating_sub(self.options.max_path_depth);
        (&path[start..], start == 0)
    }

    /// Index of the nearest ancestor with a stable id
    fn id_anchor(&self, path: &[PathSegment]) -> Option<usize> {
        path.iter().rposition(|s| {
            s.id
                .as_deref()
                .is_some_and(|id| self.random.is_stable(id))
        })
    }

    /// Full ancestor chain, anchored at the nearest stable id
    fn css_path(&self, path: &[PathSegment], tag: &str) -> String {
        if path.is_empty() {
            return tag.to_string();
        }
        let (head, rest) = match self.id_anchor(path) {
            Some(i) => (
                path[i].id.as_deref().map(|id| id_selector(id.trim())),
                &path[i + 1..],
            ),
            None => (None, path),
        };
        head.into_iter()
            .chain(rest.iter().map(|s| {
                if s.of_type_count > 1 {
                    format!("{}:nth-of-type({})", s.tag, s.nth_of_type.max(1))
                } else {
                    s.tag.clone()
                }
            }))
            .collect::<Vec<_>>()
            .join(" > ")
    }

    fn xpaths(
        &self,
        raw: &RawElement,
        tag: &str,
        short_text: Option<&str>,
        rooted: bool,
    ) -> Vec<String> {
        let mut xpaths = Candidates::default();

        if let Some(label) = raw.attr("aria-label").filter(|l| self.random.is_stable(l)) {
            xpaths.push(format!("//{}[@aria-label={}]", tag, xpath_literal(label)));
        }
        if let Some(text) = short_text {
            xpaths.push(format!("//{}[normalize-space(.)={}]", tag, xpath_literal(text)));
        }
        if let Some(id) = raw.attr("id").filter(|id| self.random.is_stable(id)) {
            xpaths.push(format!("//*[@id={}]", xpath_literal(id)));
        }

        if raw.path.is_empty() {
            xpaths.push(format!("//{}", tag));
        } else if rooted {
            let steps = raw
                .path
                .iter()
                .map(|s| format!("{}[{}]", s.tag, s.nth_of_type.max(1)))
                .collect::<Vec<_>>()
                .join("/");
            xpaths.push(format!("/{}", steps));
        }

        xpaths.0
    }

    fn attribute_based(&self, raw: &RawElement, tag: &str) -> Vec<String> {
        raw.attributes
            .iter()
            .filter(|(name, _)| !VOLATILE_ATTRIBUTES.contains(&name.as_str()))
            .filter(|(name, _)| !name.starts_with("on"))
            .map(|(name, value)| (name, value.trim()))
            .filter(|(_, value)| value.len() <= MAX_ATTRIBUTE_VALUE_LEN)
            .filter(|(_, value)| self.random.is_stable(value))
            .map(|(name, value)| attr_selector(Some(tag), name, value))
            .collect()
    }
}

/// Same-tag sibling index path
fn positional_path(path: &[PathSegment], tag: &str) -> String {
    if path.is_empty() {
        return format!("{}:nth-of-type(1)", tag);
    }
    path.iter()
        .map(|s| format!("{}:nth-of-type({})", s.tag, s.nth_of_type.max(1)))
        .collect::<Vec<_>>()
        .join(" > ")
}

fn identity_attributes(raw: &RawElement) -> IdentityAttributes {
    let get = |name: &str| raw.attr(name).map(str::to_string);
    IdentityAttributes {
        id: get("id"),
        name: get("name"),
        aria_label: get("aria-label"),
        aria_described_by: get("aria-describedby"),
        aria_controls: get("aria-controls"),
        role: get("role"),
        title: get("title"),
        placeholder: get("placeholder"),
        input_type: get("type"),
        test_id: TEST_ID_ATTRIBUTES.iter().find_map(|name| get(name)),
    }
}

/// Join of tag and semantic attributes; empty when only the tag is known
fn fingerprint(tag: &str, attrs: &IdentityAttributes) -> String {
    let parts: Vec<&str> = [
        attrs.role.as_deref(),
        attrs.aria_label.as_deref(),
        attrs.placeholder.as_deref(),
        attrs.input_type.as_deref(),
        attrs.title.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        return String::new();
    }
    std::iter::once(tag).chain(parts).collect::<Vec<_>>().join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BoundingBox;
    use crate::descriptor::model::{ConfidenceTier, ElementCategory};
    use crate::page::ParentInfo;

    fn segment(tag: &str, nth: usize, count: usize, id: Option<&str>) -> PathSegment {
        PathSegment {
            tag: tag.into(),
            nth_of_type: nth,
            of_type_count: count,
            id: id.map(str::to_string),
        }
    }

    fn raw(tag: &str, attrs: &[(&str, &str)], text: Option<&str>) -> RawElement {
        RawElement {
            index: 4,
            tag: tag.into(),
            text: text.map(str::to_string),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            bounding_box: BoundingBox::new(100.4, 20.6, 80.0, 30.0),
            path: vec![
                segment("html", 1, 1, None),
                segment("body", 1, 1, None),
                segment("div", 2, 3, Some("app")),
                segment(tag, 1, 1, None),
            ],
            parent: Some(ParentInfo {
                tag: "div".into(),
                aria_label: None,
                id: Some("app".into()),
            }),
            visible: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_send_button_descriptor() {
        let builder = DescriptorBuilder::default();
        let d = builder
            .build(&raw("button", &[("aria-label", "Send")], Some("Send")))
            .unwrap();

        assert_eq!(d.id, "el-4");
        assert_eq!(d.confidence_tier, ConfidenceTier::High);
        assert_eq!(d.candidate_selectors[0], r#"button[aria-label="Send"]"#);
        assert_eq!(d.candidate_selectors[1], r#"[aria-label="Send"]"#);
        assert_eq!(d.category, ElementCategory::Button);
        assert!(d.supports("click") && d.supports("hover"));
        assert_eq!(d.fingerprint, "button|Send");
        assert_eq!(d.candidate_xpaths[0], r#"//button[@aria-label="Send"]"#);
        assert_eq!(d.candidate_xpaths[1], r#"//button[normalize-space(.)="Send"]"#);
        assert_eq!(d.purpose, "submit");
    }

    #[test]
    fn test_candidate_order_across_tiers() {
        let builder = DescriptorBuilder::default();
        let d = builder
            .build(&raw(
                "input",
                &[
                    ("data-testid", "email-field"),
                    ("data-section", "signup"),
                    ("placeholder", "Email"),
                    ("id", "email"),
                    ("name", "email"),
                    ("type", "email"),
                    ("class", "css-1x2y3z"),
                ],
                None,
            ))
            .unwrap();

        assert_eq!(
            &d.candidate_selectors[..6],
            &[
                r#"[data-testid="email-field"]"#.to_string(),
                r#"input[data-section="signup"]"#.to_string(),
                r#"[placeholder="Email"]"#.to_string(),
                "#email".to_string(),
                r#"input[name="email"]"#.to_string(),
                r#"input[type="email"]"#.to_string(),
            ]
        );
        assert_eq!(d.confidence_tier, ConfidenceTier::Medium);
        assert!(d.candidate_selectors.iter().all(|s| !s.contains("css-1x2y3z")));
        assert_eq!(d.identity_attributes.test_id.as_deref(), Some("email-field"));
        assert_eq!(d.css_path, "#app > input");
    }

    #[test]
    fn test_random_ids_are_excluded() {
        let builder = DescriptorBuilder::default();
        let d = builder
            .build(&raw(
                "button",
                &[("id", "3f2a9c1e-77b0-4d2e-9a51-0c1e2f3a4b5c")],
                Some("Go"),
            ))
            .unwrap();

        assert!(d
            .candidate_selectors
            .iter()
            .all(|s| !s.contains("3f2a9c1e")));
        assert!(d.candidate_xpaths.iter().all(|x| !x.contains("@id")));
        assert_eq!(d.confidence_tier, ConfidenceTier::Low);
    }

    #[test]
    fn test_bare_element_yields_structural_tiers_only() {
        let builder = DescriptorBuilder::default();
        let mut element = raw("div", &[], None);
        element.parent = None;
        let d = builder.build(&element).unwrap();

        assert_eq!(d.confidence_tier, ConfidenceTier::Low);
        assert_eq!(d.fingerprint, "");
        assert_eq!(
            d.candidate_selectors,
            vec![
                "html:nth-of-type(1) > body:nth-of-type(1) > div:nth-of-type(2) > div:nth-of-type(1)"
                    .to_string(),
                "#app > div".to_string(),
            ]
        );
        assert_eq!(d.candidate_xpaths, vec!["/html[1]/body[1]/div[2]/div[1]"]);
    }

    #[test]
    fn test_relationship_and_structural_locators() {
        let builder = DescriptorBuilder::default();
        let d = builder
            .build(&raw("a", &[("href", "/home"), ("style", "color:red")], Some("Home")))
            .unwrap();

        let structural = d.structural.as_ref().unwrap();
        assert_eq!(structural.relationship.as_deref(), Some("#app > a"));
        assert_eq!(structural.attribute_based, vec![r#"a[href="/home"]"#]);
        assert_eq!(structural.visual_position.top, 100);
        assert_eq!(structural.visual_position.left, 21);
        assert!(d.candidate_selectors.contains(&"#app > a".to_string()));
        assert_eq!(d.candidate_selectors.last().unwrap(), r#"a:has-text("Home")"#);
    }

    #[test]
    fn test_non_structural_mode_keeps_css_path() {
        let options = BuilderOptions {
            structural: false,
            ..Default::default()
        };
        let builder = DescriptorBuilder::new(options, RandomIdPredicate::default());
        let d = builder.build(&raw("span", &[], None)).unwrap();

        assert!(d.structural.is_none());
        assert_eq!(d.candidate_selectors, vec!["#app > span".to_string()]);
    }

    #[test]
    fn test_long_text_has_no_text_selector() {
        let builder = DescriptorBuilder::default();
        let long = "word ".repeat(40);
        let d = builder.build(&raw("p", &[], Some(&long))).unwrap();

        assert!(d.candidate_selectors.iter().all(|s| !s.contains(":has-text")));
        assert!(d.candidate_xpaths.iter().all(|x| !x.contains("normalize-space")));
        assert!(d.text_snippet.unwrap().chars().count() <= 200);
    }

    /// html > body > div(2 of 2) > div x11 > span
    fn deep_element() -> RawElement {
        let mut path = vec![
            segment("html", 1, 1, None),
            segment("body", 1, 1, None),
            segment("div", 2, 2, None),
        ];
        path.extend((0..11).map(|_| segment("div", 1, 1, None)));
        path.push(segment("span", 1, 1, None));
        RawElement {
            index: 30,
            tag: "span".into(),
            path,
            parent: Some(ParentInfo {
                tag: "div".into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_capped_path_is_not_a_candidate() {
        let builder = DescriptorBuilder::default();
        let d = builder.build(&deep_element()).unwrap();

        let structural = d.structural.as_ref().unwrap();
        assert_eq!(structural.positional.matches(" > ").count(), 11);
        assert!(!structural.positional.starts_with("html"));
        assert!(!d.candidate_selectors.contains(&structural.positional));
        assert!(d.candidate_xpaths.is_empty());

        assert_eq!(d.candidate_selectors, vec![d.css_path.clone()]);
        assert!(d.css_path.starts_with("html > body > div:nth-of-type(2) > div > "));
        assert!(d.css_path.ends_with("> span"));
    }

    #[test]
    fn test_depth_options_are_clamped() {
        let options = BuilderOptions {
            max_path_depth: 2,
            ..Default::default()
        };
        let builder = DescriptorBuilder::new(options, RandomIdPredicate::default());
        let d = builder.build(&raw("em", &[], None)).unwrap();
        assert_eq!(
            d.structural.unwrap().positional,
            "html:nth-of-type(1) > body:nth-of-type(1) > div:nth-of-type(2) > em:nth-of-type(1)"
        );
        assert_eq!(d.candidate_xpaths.last().unwrap(), "/html[1]/body[1]/div[2]/em[1]");
    }

    #[test]
    fn test_nested_root_paths_are_not_candidates() {
        let builder = DescriptorBuilder::default();

        let mut framed = raw("span", &[], None);
        framed.frame_depth = 1;
        framed.path[2].id = None;
        framed.parent = None;
        let err = builder.build(&framed).unwrap_err();
        assert!(matches!(err, TargetingError::AmbiguousDescriptor(_)));

        let mut shadowed = raw("span", &[("title", "Close")], None);
        shadowed.shadow_depth = 1;
        shadowed.path.drain(..2);
        let d = builder.build(&shadowed).unwrap();
        assert!(d.candidate_selectors.iter().all(|s| !s.contains("nth-of-type")));
        assert!(d.candidate_selectors.contains(&"#app > span".to_string()));
        assert!(d.candidate_xpaths.iter().all(|x| !x.starts_with("/div")));
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = DescriptorBuilder::default();
        let element = raw("button", &[("role", "tab"), ("title", "Inbox")], Some("Inbox"));
        let a = builder.build(&element).unwrap();
        let b = builder.build(&element).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_tag_is_ambiguous() {
        let builder = DescriptorBuilder::default();
        let err = builder.build(&raw(" ", &[], None)).unwrap_err();
        assert!(matches!(err, TargetingError::AmbiguousDescriptor(_)));
    }
}
