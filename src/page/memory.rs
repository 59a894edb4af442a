//! In-memory page
//!
//! A `Page` over a mutable in-process DOM tree. Used to exercise scanning and
//! targeting without a browser, and to simulate re-renders between a scan and
//! a later action.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::core::{Action, BoundingBox, Result, TargetingError, WaitPolicy};
use crate::descriptor::roles::effective_role;
use crate::page::query::{normalize_space, CssSelector, QueryTree, XPathExpr};
use crate::page::{
    ElementHandle, LiveElement, Locator, Page, PageRequest, PageSnapshot, ParentInfo, PathSegment,
    RawElement,
};

/// Index of a node in an [`InMemoryPage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mem:{}", self.0)
    }
}

/// Description of an element to insert
#[derive(Debug, Clone)]
pub struct ElementSpec {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: Option<String>,
    bounding_box: BoundingBox,
    visible: bool,
    pointer_cursor: bool,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            attributes: BTreeMap::new(),
            text: None,
            bounding_box: BoundingBox::default(),
            visible: true,
            pointer_cursor: false,
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into().to_lowercase(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn bbox(mut self, top: f64, left: f64, width: f64, height: f64) -> Self {
        self.bounding_box = BoundingBox::new(top, left, width, height);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn pointer(mut self) -> Self {
        self.pointer_cursor = true;
        self
    }
}

/// Something the page observed, in order
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Navigated(String),
    Acted {
        node: NodeId,
        action: Action,
        value: Option<String>,
    },
    MouseClick {
        x: f64,
        y: f64,
        node: NodeId,
    },
}

#[derive(Debug, Clone)]
struct MemNode {
    spec: ElementSpec,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attached: bool,
    value: Option<String>,
}

#[derive(Debug)]
struct Dom {
    nodes: Vec<MemNode>,
    root: NodeId,
    body: NodeId,
    url: String,
    title: String,
}

impl Dom {
    fn node(&self, id: NodeId) -> &MemNode {
        &self.nodes[id.0]
    }

    fn insert(&mut self, parent: Option<NodeId>, spec: ElementSpec) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MemNode {
            spec,
            parent,
            children: Vec::new(),
            attached: true,
            value: None,
        });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        id
    }

    fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(n) = current {
            if !self.node(n).attached {
                return false;
            }
            current = self.node(n).parent;
        }
        true
    }

    fn document_order(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).into_iter().rev());
        }
        out
    }

    /// Elements below `<body>`, in document order
    fn content_nodes(&self) -> Vec<NodeId> {
        self.document_order()
            .into_iter()
            .filter(|id| *id != self.root && *id != self.body)
            .collect()
    }

    fn path(&self, id: NodeId) -> Vec<PathSegment> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(n) = current {
            let tag = self.tag(n);
            let same_tag: Vec<NodeId> = match self.parent(n) {
                Some(p) => self.children(p),
                None => self.top_level(),
            }
            .into_iter()
            .filter(|s| self.tag(*s) == tag)
            .collect();
            chain.push(PathSegment {
                tag: tag.to_string(),
                nth_of_type: same_tag.iter().position(|s| *s == n).map_or(1, |i| i + 1),
                of_type_count: same_tag.len().max(1),
                id: self.attr(n, "id").map(str::to_string),
            });
            current = self.node(n).parent;
        }
        chain.reverse();
        chain
    }

    fn raw_element(&self, id: NodeId, index: usize, snippet_len: usize) -> RawElement {
        let node = self.node(id);
        let text = normalize_space(&self.text_content(id));
        RawElement {
            index,
            tag: node.spec.tag.clone(),
            text: (!text.is_empty()).then(|| text.chars().take(snippet_len).collect()),
            attributes: node.spec.attributes.clone(),
            bounding_box: node.spec.bounding_box,
            path: self.path(id),
            parent: node.parent.map(|p| ParentInfo {
                tag: self.tag(p).to_string(),
                aria_label: self.attr(p, "aria-label").map(str::to_string),
                id: self.attr(p, "id").map(str::to_string),
            }),
            visible: node.spec.visible,
            pointer_cursor: node.spec.pointer_cursor,
            shadow_depth: 0,
            frame_depth: 0,
        }
    }

    fn live_element(&self, id: NodeId) -> LiveElement {
        let node = self.node(id);
        let text = normalize_space(&self.text_content(id));
        LiveElement {
            handle: ElementHandle(id.to_string()),
            tag: node.spec.tag.clone(),
            text: (!text.is_empty()).then_some(text),
            role: effective_role(
                self.attr(id, "role"),
                &node.spec.tag,
                self.attr(id, "type"),
                self.attr(id, "href").is_some(),
            ),
            aria_label: self.attr(id, "aria-label").map(str::to_string),
            placeholder: self.attr(id, "placeholder").map(str::to_string),
            bounding_box: node.spec.bounding_box,
        }
    }

    fn resolve(&self, handle: &ElementHandle) -> Result<NodeId> {
        let id = handle
            .as_str()
            .strip_prefix("mem:")
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n < self.nodes.len())
            .map(NodeId)
            .ok_or_else(|| {
                TargetingError::not_found(format!("unknown handle {}", handle.as_str()))
            })?;
        if !self.is_attached(id) {
            return Err(TargetingError::not_found(format!("stale handle {}", id)));
        }
        Ok(id)
    }

    fn outline(&self) -> String {
        let mut out = format!("{} | {}\n", self.url, self.title);
        for id in self.document_order() {
            let depth = self.path(id).len().saturating_sub(1);
            let b = self.node(id).spec.bounding_box;
            out.push_str(&format!(
                "{}<{}> @({}, {}) {}x{}\n",
                "  ".repeat(depth),
                self.tag(id),
                b.left,
                b.top,
                b.width,
                b.height
            ));
        }
        out
    }
}

impl QueryTree for Dom {
    type Node = NodeId;

    fn top_level(&self) -> Vec<NodeId> {
        vec![self.root]
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node)
            .children
            .iter()
            .copied()
            .filter(|c| self.node(*c).attached)
            .collect()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    fn tag(&self, node: NodeId) -> &str {
        &self.node(node).spec.tag
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node).spec.attributes.get(name).map(String::as_str)
    }

    fn own_text(&self, node: NodeId) -> String {
        self.node(node).spec.text.clone().unwrap_or_default()
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut parts = vec![self.own_text(node)];
        for child in self.children(node) {
            parts.push(self.text_content(child));
        }
        parts.retain(|p| !p.trim().is_empty());
        parts.join(" ")
    }
}

/// A page whose DOM lives in process memory
pub struct InMemoryPage {
    dom: Mutex<Dom>,
    events: Mutex<Vec<PageEvent>>,
    lookups: Mutex<Vec<Locator>>,
}

impl InMemoryPage {
    /// Create a page holding an empty `<html><body>` document
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        let mut dom = Dom {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            url: url.into(),
            title: title.into(),
        };
        let root = dom.insert(None, ElementSpec::new("html"));
        let body = dom.insert(Some(root), ElementSpec::new("body"));
        dom.root = root;
        dom.body = body;

        Self {
            dom: Mutex::new(dom),
            events: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
        }
    }

    fn dom(&self) -> MutexGuard<'_, Dom> {
        self.dom.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, event: PageEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    pub fn body(&self) -> NodeId {
        self.dom().body
    }

    /// Append a child element and return its id
    pub fn append(&self, parent: NodeId, spec: ElementSpec) -> NodeId {
        self.dom().insert(Some(parent), spec)
    }

    /// Set or replace an attribute
    pub fn set_attr(&self, node: NodeId, name: &str, value: &str) {
        self.dom().nodes[node.0]
            .spec
            .attributes
            .insert(name.to_lowercase(), value.to_string());
    }

    pub fn remove_attr(&self, node: NodeId, name: &str) {
        self.dom().nodes[node.0].spec.attributes.remove(name);
    }

    /// Detach a node (and its subtree) from the document
    pub fn remove(&self, node: NodeId) {
        self.dom().nodes[node.0].attached = false;
    }

    /// Current form value of a node, as set by `type`/`select`/`clear`
    pub fn value(&self, node: NodeId) -> Option<String> {
        self.dom().node(node).value.clone()
    }

    pub fn is_checked(&self, node: NodeId) -> bool {
        self.dom().node(node).spec.attributes.contains_key("checked")
    }

    /// Everything the page observed so far
    pub fn events(&self) -> Vec<PageEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Every locator passed to `locate`, in call order
    pub fn lookups(&self) -> Vec<Locator> {
        self.lookups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Handle of a node, as `locate` would return it
    pub fn handle(&self, node: NodeId) -> ElementHandle {
        ElementHandle(node.to_string())
    }
}

fn accepts_text(dom: &Dom, id: NodeId) -> bool {
    match dom.tag(id) {
        "textarea" => true,
        "input" => !matches!(
            dom.attr(id, "type"),
            Some("checkbox" | "radio" | "submit" | "button" | "reset" | "image" | "file" | "hidden")
        ),
        _ => dom.attr(id, "contenteditable").is_some_and(|v| v != "false"),
    }
}

#[async_trait]
impl Page for InMemoryPage {
    async fn navigate(&self, url: &str, _wait: WaitPolicy, _timeout: Duration) -> Result<()> {
        self.dom().url = url.to_string();
        self.record(PageEvent::Navigated(url.to_string()));
        Ok(())
    }

    async fn run_in_page_context(&self, request: &PageRequest) -> Result<serde_json::Value> {
        let dom = self.dom();
        match request {
            PageRequest::Scan(options) => {
                let elements: Vec<RawElement> = dom
                    .content_nodes()
                    .into_iter()
                    .filter(|id| options.include_hidden || dom.node(*id).spec.visible)
                    .enumerate()
                    .map(|(index, id)| dom.raw_element(id, index, options.text_snippet_len))
                    .collect();
                let snapshot = PageSnapshot {
                    url: dom.url.clone(),
                    title: dom.title.clone(),
                    elements,
                };
                Ok(serde_json::to_value(snapshot)?)
            }
            PageRequest::LiveElements => {
                let elements: Vec<LiveElement> = dom
                    .content_nodes()
                    .into_iter()
                    .map(|id| dom.live_element(id))
                    .collect();
                Ok(serde_json::to_value(elements)?)
            }
        }
    }

    async fn locate(&self, locator: &Locator) -> Result<Option<ElementHandle>> {
        self.lookups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(locator.clone());

        let dom = self.dom();
        let order = dom.document_order();
        let found = match locator {
            Locator::Css(selector) => {
                let parsed = CssSelector::parse(selector)?;
                order.into_iter().find(|id| parsed.matches(&*dom, *id))
            }
            Locator::XPath(expr) => {
                let matches = XPathExpr::parse(expr)?.evaluate(&*dom);
                order.into_iter().find(|id| matches.contains(id))
            }
        };
        Ok(found.map(|id| ElementHandle(id.to_string())))
    }

    async fn act(&self, handle: &ElementHandle, action: Action, value: Option<&str>) -> Result<()> {
        let node = {
            let mut dom = self.dom();
            let id = dom.resolve(handle)?;
            let disabled = dom.attr(id, "disabled").is_some();
            if disabled && !matches!(action, Action::Verify | Action::Wait) {
                return Err(TargetingError::rejected(format!("<{}> is disabled", dom.tag(id))));
            }
            match action {
                Action::Type | Action::Clear if !accepts_text(&dom, id) => {
                    return Err(TargetingError::rejected(format!(
                        "<{}> does not accept text",
                        dom.tag(id)
                    )));
                }
                Action::Select if dom.tag(id) != "select" => {
                    return Err(TargetingError::rejected(format!(
                        "<{}> is not a select",
                        dom.tag(id)
                    )));
                }
                Action::Check | Action::Uncheck
                    if !matches!(dom.attr(id, "type"), Some("checkbox" | "radio")) =>
                {
                    return Err(TargetingError::rejected(format!(
                        "<{}> is not checkable",
                        dom.tag(id)
                    )));
                }
                _ => {}
            }

            let node = &mut dom.nodes[id.0];
            match action {
                Action::Type | Action::Select => node.value = value.map(str::to_string),
                Action::Clear => node.value = Some(String::new()),
                Action::Check => {
                    node.spec.attributes.insert("checked".into(), String::new());
                }
                Action::Uncheck => {
                    node.spec.attributes.remove("checked");
                }
                _ => {}
            }
            id
        };

        self.record(PageEvent::Acted {
            node,
            action,
            value: value.map(str::to_string),
        });
        Ok(())
    }

    async fn mouse_click(&self, x: f64, y: f64) -> Result<()> {
        let hit = {
            let dom = self.dom();
            dom.content_nodes().into_iter().rev().find(|id| {
                let spec = &dom.node(*id).spec;
                let b = spec.bounding_box;
                spec.visible
                    && !b.is_empty()
                    && x >= b.left
                    && x <= b.left + b.width
                    && y >= b.top
                    && y <= b.top + b.height
            })
        };
        match hit {
            Some(node) => {
                self.record(PageEvent::MouseClick { x, y, node });
                Ok(())
            }
            None => Err(TargetingError::not_found(format!(
                "no element at ({}, {})",
                x, y
            ))),
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.dom().outline().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> (InMemoryPage, NodeId, NodeId) {
        let page = InMemoryPage::new("https://example.test/", "Example");
        let form = page.append(page.body(), ElementSpec::new("form").attr("aria-label", "Login"));
        let input = page.append(
            form,
            ElementSpec::new("input")
                .attr("type", "email")
                .attr("placeholder", "Email"),
        );
        let button = page.append(
            form,
            ElementSpec::new("button")
                .text("Sign in")
                .bbox(100.0, 20.0, 80.0, 30.0),
        );
        (page, input, button)
    }

    #[tokio::test]
    async fn test_locate_css_and_xpath() {
        let (page, input, button) = sample_page();

        let found = page
            .locate(&Locator::Css(r#"[placeholder="Email"]"#.into()))
            .await
            .unwrap();
        assert_eq!(found, Some(page.handle(input)));

        let found = page
            .locate(&Locator::Css(r#"[aria-label="Login"] > button"#.into()))
            .await
            .unwrap();
        assert_eq!(found, Some(page.handle(button)));

        let found = page
            .locate(&Locator::XPath("/html[1]/body[1]/form[1]/button[1]".into()))
            .await
            .unwrap();
        assert_eq!(found, Some(page.handle(button)));

        let found = page
            .locate(&Locator::Css(r#"button:has-text("sign IN")"#.into()))
            .await
            .unwrap();
        assert_eq!(found, Some(page.handle(button)));
    }

    #[tokio::test]
    async fn test_removed_nodes_are_not_found() {
        let (page, _, button) = sample_page();
        let handle = page.handle(button);
        page.remove(button);

        let found = page.locate(&Locator::Css("button".into())).await.unwrap();
        assert!(found.is_none());

        let err = page.act(&handle, Action::Click, None).await.unwrap_err();
        assert!(matches!(err, TargetingError::ElementNotFound(_)));
    }

    #[tokio::test]
    async fn test_act_updates_state_and_rejects_invalid_actions() {
        let (page, input, button) = sample_page();

        page.act(&page.handle(input), Action::Type, Some("a@b.c"))
            .await
            .unwrap();
        assert_eq!(page.value(input).as_deref(), Some("a@b.c"));

        let err = page
            .act(&page.handle(button), Action::Type, Some("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TargetingError::ActionRejected(_)));

        page.set_attr(button, "disabled", "");
        let err = page
            .act(&page.handle(button), Action::Click, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TargetingError::ActionRejected(_)));
    }

    #[tokio::test]
    async fn test_mouse_click_hits_element_under_point() {
        let (page, _, button) = sample_page();
        page.mouse_click(60.0, 115.0).await.unwrap();
        assert_eq!(
            page.events(),
            vec![PageEvent::MouseClick {
                x: 60.0,
                y: 115.0,
                node: button
            }]
        );
        assert!(page.mouse_click(900.0, 900.0).await.is_err());
    }

    #[tokio::test]
    async fn test_scan_snapshot_paths() {
        let (page, _, _) = sample_page();
        let value = page
            .run_in_page_context(&PageRequest::Scan(Default::default()))
            .await
            .unwrap();
        let snapshot: PageSnapshot = serde_json::from_value(value).unwrap();

        assert_eq!(snapshot.elements.len(), 3);
        let button = &snapshot.elements[2];
        assert_eq!(button.tag, "button");
        let tags: Vec<&str> = button.path.iter().map(|s| s.tag.as_str()).collect();
        assert_eq!(tags, vec!["html", "body", "form", "button"]);
        assert_eq!(
            button.parent.as_ref().and_then(|p| p.aria_label.as_deref()),
            Some("Login")
        );
    }
}
