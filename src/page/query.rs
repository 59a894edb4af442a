//! Selector and XPath evaluation over an in-process DOM tree
//!
//! Covers the grammar the descriptor builder emits: compound CSS selectors
//! (`tag`, `#id`, `[attr="v"]`, `:nth-of-type(n)`, `:has-text("t")`) joined by
//! child or descendant combinators, and absolute or `//` XPaths with position,
//! `@attr=` and `normalize-space()=` predicates.

use crate::core::{Result, TargetingError};

/// Read access to a DOM tree for query evaluation
pub trait QueryTree {
    type Node: Copy + Eq;

    /// Children of the document itself (normally just `<html>`)
    fn top_level(&self) -> Vec<Self::Node>;

    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    fn tag(&self, node: Self::Node) -> &str;

    fn attr(&self, node: Self::Node, name: &str) -> Option<&str>;

    /// Text directly owned by the node
    fn own_text(&self, node: Self::Node) -> String;

    /// Text of the node and all descendants
    fn text_content(&self, node: Self::Node) -> String;
}

/// Parsed CSS selector
#[derive(Debug, Clone, PartialEq)]
pub struct CssSelector {
    parts: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    None,
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Id(String),
    Attr { name: String, value: Option<String> },
    NthOfType(usize),
    HasText(String),
}

/// Parsed XPath expression
#[derive(Debug, Clone, PartialEq)]
pub struct XPathExpr {
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    descendant: bool,
    name: Option<String>,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    AttrEq(String, String),
    OwnTextEq(String),
    TextEq(String),
}

fn invalid(kind: &str, input: &str, reason: &str) -> TargetingError {
    TargetingError::Other(format!("Invalid {} '{}': {}", kind, input, reason))
}

/// Collapse runs of whitespace and trim
pub fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Cursor<'a> {
    chars: Vec<char>,
    pos: usize,
    input: &'a str,
    kind: &'static str,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str, kind: &'static str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            input,
            kind,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        let n = s.chars().count();
        let ahead: String = self.chars.iter().skip(self.pos).take(n).collect();
        if ahead == s {
            self.pos += n;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c)))
        }
    }

    fn error(&self, reason: &str) -> TargetingError {
        invalid(self.kind, self.input, &format!("{} at {}", reason, self.pos))
    }

    fn ident(&mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                out.push(c);
                self.pos += 1;
            } else if c == '\\' && self.kind == "selector" {
                self.pos += 1;
                match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.error("dangling escape")),
                }
            } else {
                break;
            }
        }
        if out.is_empty() {
            Err(self.error("expected identifier"))
        } else {
            Ok(out)
        }
    }

    fn number(&mut self) -> Result<usize> {
        let mut digits = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
            digits.push(c);
            self.pos += 1;
        }
        digits
            .parse()
            .map_err(|_| self.error("expected number"))
    }

    /// Quoted string; backslash escapes only apply to CSS
    fn quoted(&mut self) -> Result<String> {
        let quote = match self.bump() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("expected quoted string")),
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') if self.kind == "selector" => match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.error("dangling escape")),
                },
                Some(c) => out.push(c),
            }
        }
    }
}

impl CssSelector {
    /// Parse a selector string
    pub fn parse(input: &str) -> Result<Self> {
        let mut cur = Cursor::new(input, "selector");
        let mut parts = Vec::new();
        cur.skip_ws();
        let mut combinator = Combinator::None;

        loop {
            let compound = parse_compound(&mut cur)?;
            parts.push((combinator, compound));

            let had_ws = cur.skip_ws();
            if cur.peek().is_none() {
                break;
            }
            combinator = if cur.eat('>') {
                cur.skip_ws();
                Combinator::Child
            } else if had_ws {
                Combinator::Descendant
            } else {
                return Err(cur.error("unexpected character"));
            };
        }

        Ok(Self { parts })
    }

    /// Whether a node matches the whole selector
    pub fn matches<T: QueryTree>(&self, tree: &T, node: T::Node) -> bool {
        matches_from(tree, node, &self.parts, self.parts.len() - 1)
    }
}

fn parse_compound(cur: &mut Cursor<'_>) -> Result<Compound> {
    let mut compound = Compound::default();

    let universal = cur.eat('*');
    if !universal && matches!(cur.peek(), Some(c) if c.is_alphabetic()) {
        compound.tag = Some(cur.ident()?.to_lowercase());
    }

    loop {
        match cur.peek() {
            Some('#') => {
                cur.bump();
                compound.conditions.push(Condition::Id(cur.ident()?));
            }
            Some('[') => {
                cur.bump();
                cur.skip_ws();
                let name = cur.ident()?.to_lowercase();
                cur.skip_ws();
                let value = if cur.eat('=') {
                    cur.skip_ws();
                    let v = if matches!(cur.peek(), Some('"' | '\'')) {
                        cur.quoted()?
                    } else {
                        cur.ident()?
                    };
                    cur.skip_ws();
                    Some(v)
                } else {
                    None
                };
                cur.expect(']')?;
                compound.conditions.push(Condition::Attr { name, value });
            }
            Some(':') => {
                cur.bump();
                let pseudo = cur.ident()?;
                cur.expect('(')?;
                cur.skip_ws();
                let condition = match pseudo.as_str() {
                    "nth-of-type" => Condition::NthOfType(cur.number()?),
                    "has-text" => Condition::HasText(cur.quoted()?),
                    other => return Err(cur.error(&format!("unsupported pseudo-class :{}", other))),
                };
                cur.skip_ws();
                cur.expect(')')?;
                compound.conditions.push(condition);
            }
            _ => break,
        }
    }

    if !universal && compound.tag.is_none() && compound.conditions.is_empty() {
        return Err(cur.error("empty compound selector"));
    }
    Ok(compound)
}

fn matches_from<T: QueryTree>(
    tree: &T,
    node: T::Node,
    parts: &[(Combinator, Compound)],
    index: usize,
) -> bool {
    let (combinator, compound) = &parts[index];
    if !matches_compound(tree, node, compound) {
        return false;
    }
    if index == 0 {
        return true;
    }
    match combinator {
        Combinator::Child => tree
            .parent(node)
            .map(|p| matches_from(tree, p, parts, index - 1))
            .unwrap_or(false),
        Combinator::Descendant => {
            let mut ancestor = tree.parent(node);
            while let Some(a) = ancestor {
                if matches_from(tree, a, parts, index - 1) {
                    return true;
                }
                ancestor = tree.parent(a);
            }
            false
        }
        Combinator::None => true,
    }
}

fn matches_compound<T: QueryTree>(tree: &T, node: T::Node, compound: &Compound) -> bool {
    if let Some(tag) = &compound.tag {
        if tree.tag(node) != tag {
            return false;
        }
    }
    compound.conditions.iter().all(|condition| match condition {
        Condition::Id(id) => tree.attr(node, "id") == Some(id.as_str()),
        Condition::Attr { name, value } => match (tree.attr(node, name), value) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        },
        Condition::NthOfType(n) => nth_of_type(tree, node) == *n,
        Condition::HasText(text) => normalize_space(&tree.text_content(node))
            .to_lowercase()
            .contains(&normalize_space(text).to_lowercase()),
    })
}

fn siblings<T: QueryTree>(tree: &T, node: T::Node) -> Vec<T::Node> {
    match tree.parent(node) {
        Some(p) => tree.children(p),
        None => tree.top_level(),
    }
}

fn nth_of_type<T: QueryTree>(tree: &T, node: T::Node) -> usize {
    let tag = tree.tag(node);
    siblings(tree, node)
        .into_iter()
        .filter(|s| tree.tag(*s) == tag)
        .position(|s| s == node)
        .map(|i| i + 1)
        .unwrap_or(0)
}

impl XPathExpr {
    /// Parse an XPath expression
    pub fn parse(input: &str) -> Result<Self> {
        let mut cur = Cursor::new(input.trim(), "xpath");
        let mut steps = Vec::new();

        if cur.peek() != Some('/') {
            return Err(cur.error("only absolute paths are supported"));
        }

        while cur.eat('/') {
            let descendant = cur.eat('/');
            let name = if cur.eat('*') {
                None
            } else {
                Some(cur.ident()?.to_lowercase())
            };
            let mut predicates = Vec::new();
            while cur.eat('[') {
                cur.skip_ws();
                predicates.push(parse_predicate(&mut cur)?);
                cur.skip_ws();
                cur.expect(']')?;
            }
            steps.push(Step {
                descendant,
                name,
                predicates,
            });
        }

        if cur.peek().is_some() {
            return Err(cur.error("unexpected character"));
        }
        Ok(Self { steps })
    }

    /// Evaluate against a tree, returning matches in the order found
    pub fn evaluate<T: QueryTree>(&self, tree: &T) -> Vec<T::Node> {
        let mut context: Vec<Option<T::Node>> = vec![None];

        for step in &self.steps {
            let mut next: Vec<Option<T::Node>> = Vec::new();
            for ctx in &context {
                let bases = if step.descendant {
                    descendants_or_self(tree, *ctx)
                } else {
                    vec![*ctx]
                };
                for base in bases {
                    let children = match base {
                        Some(n) => tree.children(n),
                        None => tree.top_level(),
                    };
                    let mut candidates: Vec<T::Node> = children
                        .into_iter()
                        .filter(|c| step.name.as_deref().map_or(true, |name| tree.tag(*c) == name))
                        .collect();
                    for predicate in &step.predicates {
                        candidates = apply_predicate(tree, candidates, predicate);
                    }
                    for c in candidates {
                        if !next.contains(&Some(c)) {
                            next.push(Some(c));
                        }
                    }
                }
            }
            context = next;
        }

        context.into_iter().flatten().collect()
    }
}

fn parse_predicate(cur: &mut Cursor<'_>) -> Result<Predicate> {
    if matches!(cur.peek(), Some(c) if c.is_ascii_digit()) {
        return Ok(Predicate::Position(cur.number()?));
    }
    if cur.eat('@') {
        let name = cur.ident()?.to_lowercase();
        cur.skip_ws();
        cur.expect('=')?;
        cur.skip_ws();
        return Ok(Predicate::AttrEq(name, xpath_literal(cur)?));
    }
    let own_text = if cur.eat_str("normalize-space(text())") || cur.eat_str("text()") {
        true
    } else if cur.eat_str("normalize-space(.)") || cur.eat_str("normalize-space()") {
        false
    } else {
        return Err(cur.error("unsupported predicate"));
    };
    cur.skip_ws();
    cur.expect('=')?;
    cur.skip_ws();
    let literal = xpath_literal(cur)?;
    Ok(if own_text {
        Predicate::OwnTextEq(literal)
    } else {
        Predicate::TextEq(literal)
    })
}

/// A quoted literal or a `concat(...)` of quoted literals
fn xpath_literal(cur: &mut Cursor<'_>) -> Result<String> {
    if !cur.eat_str("concat(") {
        return cur.quoted();
    }
    let mut out = String::new();
    loop {
        cur.skip_ws();
        out.push_str(&cur.quoted()?);
        cur.skip_ws();
        if cur.eat(')') {
            return Ok(out);
        }
        cur.expect(',')?;
    }
}

fn descendants_or_self<T: QueryTree>(tree: &T, ctx: Option<T::Node>) -> Vec<Option<T::Node>> {
    let mut out = vec![ctx];
    let mut stack: Vec<T::Node> = match ctx {
        Some(n) => tree.children(n),
        None => tree.top_level(),
    };
    stack.reverse();
    while let Some(node) = stack.pop() {
        out.push(Some(node));
        let mut children = tree.children(node);
        children.reverse();
        stack.extend(children);
    }
    out
}

fn apply_predicate<T: QueryTree>(
    tree: &T,
    candidates: Vec<T::Node>,
    predicate: &Predicate,
) -> Vec<T::Node> {
    match predicate {
        Predicate::Position(n) => candidates
            .get(n.wrapping_sub(1))
            .copied()
            .into_iter()
            .collect(),
        Predicate::AttrEq(name, value) => candidates
            .into_iter()
            .filter(|c| tree.attr(*c, name) == Some(value.as_str()))
            .collect(),
        Predicate::OwnTextEq(value) => candidates
            .into_iter()
            .filter(|c| normalize_space(&tree.own_text(*c)) == normalize_space(value))
            .collect(),
        Predicate::TextEq(value) => candidates
            .into_iter()
            .filter(|c| normalize_space(&tree.text_content(*c)) == normalize_space(value))
            .collect(),
    }
}
