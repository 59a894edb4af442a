//! Implicit ARIA roles
//!
//! Used wherever a role must be compared across re-renders: a `<button>` and a
//! `<div role="button">` are the same kind of control.

/// Implicit ARIA role of an element without an explicit `role` attribute
pub fn implicit_role(tag: &str, input_type: Option<&str>, has_href: bool) -> Option<&'static str> {
    let role = match tag {
        "button" => "button",
        "a" | "area" if has_href => "link",
        "select" => "combobox",
        "textarea" => "textbox",
        "form" => "form",
        "nav" => "navigation",
        "main" => "main",
        "header" => "banner",
        "footer" => "contentinfo",
        "aside" => "complementary",
        "dialog" => "dialog",
        "img" => "img",
        "ul" | "ol" => "list",
        "li" => "listitem",
        "table" => "table",
        "option" => "option",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "input" => match input_type.map(|t| t.to_lowercase()).as_deref() {
            None | Some("text") | Some("email") | Some("tel") | Some("url") | Some("password") => {
                "textbox"
            }
            Some("search") => "searchbox",
            Some("checkbox") => "checkbox",
            Some("radio") => "radio",
            Some("number") => "spinbutton",
            Some("range") => "slider",
            Some("button") | Some("submit") | Some("reset") | Some("image") => "button",
            _ => return None,
        },
        _ => return None,
    };
    Some(role)
}

/// Explicit role if present, otherwise the implicit one
pub fn effective_role(
    explicit: Option<&str>,
    tag: &str,
    input_type: Option<&str>,
    has_href: bool,
) -> Option<String> {
    explicit
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .or_else(|| implicit_role(tag, input_type, has_href).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_roles() {
        assert_eq!(implicit_role("button", None, false), Some("button"));
        assert_eq!(implicit_role("a", None, true), Some("link"));
        assert_eq!(implicit_role("a", None, false), None);
        assert_eq!(implicit_role("input", Some("checkbox"), false), Some("checkbox"));
        assert_eq!(implicit_role("input", None, false), Some("textbox"));
        assert_eq!(implicit_role("div", None, false), None);
    }

    #[test]
    fn test_explicit_role_wins() {
        assert_eq!(
            effective_role(Some("Tab"), "button", None, false).as_deref(),
            Some("tab")
        );
        assert_eq!(
            effective_role(Some("  "), "button", None, false).as_deref(),
            Some("button")
        );
    }
}
