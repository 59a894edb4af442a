//! Selector and XPath string rendering

/// Quote a CSS attribute value
pub fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' | '\t' => out.push(' '),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `tag[name="value"]`, or `[name="value"]` without a tag
pub fn attr_selector(tag: Option<&str>, name: &str, value: &str) -> String {
    format!("{}[{}={}]", tag.unwrap_or(""), name, css_string(value))
}

/// Whether a string can be used verbatim after `#`
pub fn is_css_ident(value: &str) -> bool {
    let mut chars = value.chars();
    let first_ok = match chars.next() {
        Some('-') => matches!(chars.clone().next(), Some(c) if c.is_ascii_alphabetic() || c == '_'),
        Some(c) => c.is_ascii_alphabetic() || c == '_',
        None => false,
    };
    first_ok && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// `#id` when possible, otherwise an attribute selector
pub fn id_selector(id: &str) -> String {
    if is_css_ident(id) {
        format!("#{}", id)
    } else {
        attr_selector(None, "id", id)
    }
}

/// `tag:has-text("text")`
pub fn text_selector(tag: &str, text: &str) -> String {
    format!("{}:has-text({})", tag, css_string(text))
}

/// XPath string literal, falling back to `concat()` when both quote kinds appear
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        format!("\"{}\"", value)
    } else if !value.contains('\'') {
        format!("'{}'", value)
    } else {
        let parts: Vec<String> = value
            .split('"')
            .map(|p| format!("\"{}\"", p))
            .collect();
        format!("concat({})", parts.join(", '\"', "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_string_escapes_quotes() {
        assert_eq!(css_string("Send"), "\"Send\"");
        assert_eq!(css_string(r#"Say "hi""#), r#""Say \"hi\"""#);
    }

    #[test]
    fn test_attr_selector() {
        assert_eq!(
            attr_selector(Some("button"), "aria-label", "Send"),
            r#"button[aria-label="Send"]"#
        );
        assert_eq!(
            attr_selector(None, "data-testid", "save"),
            r#"[data-testid="save"]"#
        );
    }

    #[test]
    fn test_id_selector() {
        assert_eq!(id_selector("main-nav"), "#main-nav");
        assert_eq!(id_selector("1st"), r#"[id="1st"]"#);
        assert_eq!(id_selector("a.b"), r#"[id="a.b"]"#);
    }

    #[test]
    fn test_xpath_literal() {
        assert_eq!(xpath_literal("Send"), "\"Send\"");
        assert_eq!(xpath_literal(r#"say "hi""#), r#"'say "hi"'"#);
        assert_eq!(
            xpath_literal(r#"it's "x""#),
            r#"concat("it's ", '"', "x", '"', "")"#
        );
    }
}
