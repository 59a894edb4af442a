//! Element classification
//!
//! Category, supported actions, interaction score and purpose are all pure
//! functions of the serialized element.

use crate::descriptor::model::ElementCategory;
use crate::page::RawElement;

/// Classify an element into a category
pub fn categorize(raw: &RawElement) -> ElementCategory {
    let input_type = raw.attr("type").map(str::to_lowercase);
    let role = raw.attr("role").map(str::to_lowercase);

    match raw.tag.as_str() {
        "select" => return ElementCategory::Dropdown,
        "textarea" => return ElementCategory::Textarea,
        "form" => return ElementCategory::Form,
        "img" | "svg" | "picture" => return ElementCategory::Image,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => return ElementCategory::Heading,
        "a" if raw.has_attr("href") => return ElementCategory::Link,
        "button" => {
            return if input_type.as_deref() == Some("submit") {
                ElementCategory::SubmitButton
            } else {
                ElementCategory::Button
            };
        }
        "input" => {
            return match input_type.as_deref() {
                Some("password") => ElementCategory::InputPassword,
                Some("email") => ElementCategory::InputEmail,
                Some("submit") | Some("image") => ElementCategory::SubmitButton,
                Some("button") | Some("reset") => ElementCategory::Button,
                Some("checkbox") => ElementCategory::Checkbox,
                Some("radio") => ElementCategory::Radio,
                Some("hidden") | Some("file") => ElementCategory::Generic,
                _ => ElementCategory::InputText,
            };
        }
        _ => {}
    }

    match role.as_deref() {
        Some("button") => return ElementCategory::Button,
        Some("link") => return ElementCategory::Link,
        Some("checkbox") | Some("switch") => return ElementCategory::Checkbox,
        Some("radio") => return ElementCategory::Radio,
        Some("textbox") | Some("searchbox") => return ElementCategory::InputText,
        Some("combobox") | Some("listbox") => return ElementCategory::Dropdown,
        Some("heading") => return ElementCategory::Heading,
        Some("menuitem") | Some("tab") | Some("option") => return ElementCategory::Clickable,
        _ => {}
    }

    if raw.attr("contenteditable").is_some_and(|v| v != "false") {
        return ElementCategory::InputText;
    }

    if raw.has_attr("onclick")
        || raw.pointer_cursor
        || raw
            .attr("tabindex")
            .and_then(|t| t.parse::<i32>().ok())
            .is_some_and(|t| t >= 0)
    {
        return ElementCategory::Clickable;
    }

    ElementCategory::Generic
}

/// Actions a category can take part in
pub fn supported_actions(category: ElementCategory) -> Vec<&'static str> {
    match category {
        ElementCategory::Button
        | ElementCategory::SubmitButton
        | ElementCategory::Link
        | ElementCategory::Clickable => vec!["click", "hover"],
        ElementCategory::InputText
        | ElementCategory::InputPassword
        | ElementCategory::InputEmail
        | ElementCategory::Textarea => vec!["type", "clear", "fill"],
        ElementCategory::Dropdown => vec!["select"],
        ElementCategory::Checkbox | ElementCategory::Radio => vec!["check", "uncheck"],
        ElementCategory::Form
        | ElementCategory::Heading
        | ElementCategory::Image
        | ElementCategory::Generic => Vec::new(),
    }
}

/// Whether the category is something a plan would act on
pub fn is_interactive(category: ElementCategory) -> bool {
    !supported_actions(category).is_empty()
}

/// Heuristic likelihood that the element is actionable; 0 when disabled
pub fn interaction_score(raw: &RawElement, category: ElementCategory) -> u32 {
    if raw.is_disabled() {
        return 0;
    }

    let mut score = 0;
    if matches!(
        raw.tag.as_str(),
        "button" | "a" | "input" | "select" | "textarea"
    ) {
        score += 5;
    }
    if is_interactive(category) {
        score += 3;
    }
    if raw
        .attr("tabindex")
        .and_then(|t| t.parse::<i32>().ok())
        .is_some_and(|t| t >= 0)
    {
        score += 2;
    }
    if raw.has_attr("onclick") {
        score += 2;
    }
    if raw.pointer_cursor {
        score += 1;
    }
    if raw.visible && !raw.bounding_box.is_empty() {
        score += 1;
    }
    score
}

/// Ordered keyword rules; the first rule with a matching keyword wins
const PURPOSE_RULES: &[(&str, &[&str])] = &[
    ("search", &["search", "query"]),
    ("logout", &["logout", "log out", "sign out", "signout"]),
    (
        "authentication",
        &["login", "log in", "sign in", "signin", "password"],
    ),
    (
        "registration",
        &["sign up", "signup", "register", "create account"],
    ),
    ("cart", &["cart", "basket", "checkout", "buy"]),
    ("cancel", &["cancel", "close", "dismiss"]),
    (
        "submit",
        &["submit", "send", "save", "confirm", "continue", "next"],
    ),
    ("email_input", &["email", "e-mail"]),
    ("contact", &["phone", "contact", "address"]),
    ("navigation", &["home", "menu", "back"]),
];

/// Guess what the element is for from its visible and semantic text.
///
/// Returns `"unknown"` when no rule matches.
pub fn infer_purpose(signals: &[Option<&str>]) -> &'static str {
    let haystack = signals
        .iter()
        .flatten()
        .map(|s| s.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    if haystack.trim().is_empty() {
        return "unknown";
    }

    PURPOSE_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k)))
        .map(|(purpose, _)| *purpose)
        .unwrap_or("unknown")
}
