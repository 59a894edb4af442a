//! agent-browser page - live [`Page`] over the agent-browser CLI
//!
//! In-page work is done by shipping self-contained scripts through `eval`
//! and reading JSON back. Handles are tokens in a page-side registry; an
//! element is tagged with `data-retarget-handle` right before an action so
//! the CLI can address it with a plain attribute selector.
//!
//! Scan, live-element listing and locate share one traversal: the top
//! document, open shadow roots up to the depth bound, and same-origin iframes
//! one level deep.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::core::config::{BrowserConfig, MAX_SHADOW_DEPTH};
use crate::core::{Action, BoundingBox, Result, TargetingError, WaitPolicy};
use crate::descriptor::roles::effective_role;
use crate::page::{ElementHandle, LiveElement, Locator, Page, PageRequest};

/// Attribute used to address a registered element from the CLI
const HANDLE_ATTRIBUTE: &str = "data-retarget-handle";

/// Shared traversal, spliced in for `__TRAVERSE__`. `enter` sees each root,
/// `visit` each element with its depths and the frame offset.
const TRAVERSE_SCRIPT: &str = r#"
  const traverse = (maxShadowDepth, visit, enter) => {
    const walk = (root, shadowDepth, frameDepth, dx, dy) => {
      if (enter) enter(root);
      for (const el of root.querySelectorAll('*')) {
        const tag = el.tagName.toLowerCase();
        if (visit) visit(el, tag, shadowDepth, frameDepth, dx, dy);
        if (el.shadowRoot && shadowDepth < maxShadowDepth) {
          walk(el.shadowRoot, shadowDepth + 1, frameDepth, dx, dy);
        }
        if (tag === 'iframe' && frameDepth < 1) {
          let doc = null;
          try { doc = el.contentDocument; } catch (e) { doc = null; }
          if (doc && doc.documentElement) {
            const r = el.getBoundingClientRect();
            walk(doc, shadowDepth, frameDepth + 1, dx + r.left, dy + r.top);
          }
        }
      }
    };
    walk(document, 0, 0, 0, 0);
  };
"#;

/// DOM walker
const SCAN_SCRIPT: &str = r#"(() => {
  const opts = __ARG__;
  __TRAVERSE__
  const SKIP = new Set(['script', 'style', 'noscript', 'template', 'meta', 'link', 'head', 'title', 'base', 'html', 'body']);
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const out = [];

  const segment = (el) => {
    const parent = el.parentElement;
    let nth = 1, count = 1;
    if (parent) {
      const same = Array.from(parent.children).filter((c) => c.tagName === el.tagName);
      nth = same.indexOf(el) + 1;
      count = same.length;
    }
    return { tag: el.tagName.toLowerCase(), nthOfType: nth, ofTypeCount: count, id: el.id || null };
  };

  const pathOf = (el) => {
    const segments = [];
    for (let cur = el; cur; cur = cur.parentElement) segments.unshift(segment(cur));
    return segments;
  };

  const record = (el, tag, shadowDepth, frameDepth, dx, dy) => {
    const view = el.ownerDocument.defaultView;
    const style = view.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const visible = style.display !== 'none' && style.visibility !== 'hidden'
      && parseFloat(style.opacity || '1') !== 0 && rect.width > 0 && rect.height > 0;
    if (!visible && !opts.includeHidden) return;

    const attributes = {};
    for (const a of el.attributes) {
      if (!a.name.startsWith('data-retarget')) attributes[a.name] = a.value;
    }
    const text = norm(el.innerText !== undefined ? el.innerText : el.textContent);
    const parent = el.parentElement;
    out.push({
      index: out.length,
      tag,
      text: text ? text.slice(0, opts.textSnippetLen) : null,
      attributes,
      boundingBox: { top: rect.top + dy, left: rect.left + dx, width: rect.width, height: rect.height },
      path: pathOf(el),
      parent: parent ? { tag: parent.tagName.toLowerCase(), ariaLabel: parent.getAttribute('aria-label'), id: parent.id || null } : null,
      visible,
      pointerCursor: style.cursor === 'pointer',
      shadowDepth,
      frameDepth,
    });
  };

  traverse(opts.maxShadowDepth, (el, tag, shadowDepth, frameDepth, dx, dy) => {
    if (!SKIP.has(tag)) record(el, tag, shadowDepth, frameDepth, dx, dy);
  });
  return JSON.stringify({ url: location.href, title: document.title, elements: out });
})()"#;

/// Registers every element and returns its raw identity facts
const LIVE_ELEMENTS_SCRIPT: &str = r#"(() => {
  const opts = __ARG__;
  __TRAVERSE__
  const reg = window.__retarget || (window.__retarget = { seq: 0, nodes: new Map() });
  reg.nodes = new Map();
  const SKIP = new Set(['script', 'style', 'noscript', 'template', 'meta', 'link', 'head', 'title', 'base', 'html', 'body']);
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const out = [];
  traverse(opts.maxShadowDepth, (el, tag, shadowDepth, frameDepth, dx, dy) => {
    if (SKIP.has(tag)) return;
    const handle = 'rt-' + (++reg.seq);
    reg.nodes.set(handle, el);
    const rect = el.getBoundingClientRect();
    const text = norm(el.textContent);
    out.push({
      handle,
      tag,
      text: text || null,
      role: el.getAttribute('role'),
      inputType: el.getAttribute('type'),
      hasHref: el.hasAttribute('href'),
      ariaLabel: el.getAttribute('aria-label'),
      placeholder: el.getAttribute('placeholder'),
      boundingBox: { top: rect.top + dy, left: rect.left + dx, width: rect.width, height: rect.height },
    });
  });
  return JSON.stringify(out);
})()"#;

/// Finds the first match for a locator, root by root in traversal order,
/// and registers it. XPaths only run against documents.
const LOCATE_SCRIPT: &str = r#"(() => {
  const q = __ARG__;
  __TRAVERSE__
  const reg = window.__retarget || (window.__retarget = { seq: 0, nodes: new Map() });
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const roots = [];
  traverse(q.maxShadowDepth, null, (root) => roots.push(root));
  const m = q.kind === 'css' ? q.value.match(/^(.*):has-text\(("(?:[^"\\]|\\.)*")\)$/) : null;
  const find = (root) => {
    if (q.kind === 'xpath') {
      if (root.nodeType !== Node.DOCUMENT_NODE) return null;
      return root.evaluate(q.value, root, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
    }
    if (m) {
      const needle = norm(JSON.parse(m[2])).toLowerCase();
      return Array.from(root.querySelectorAll(m[1] || '*'))
        .find((e) => norm(e.textContent).toLowerCase().includes(needle)) || null;
    }
    return root.querySelector(q.value);
  };
  let el = null;
  for (const root of roots) {
    el = find(root);
    if (el) break;
  }
  if (!el) return JSON.stringify(null);
  const handle = 'rt-' + (++reg.seq);
  reg.nodes.set(handle, el);
  return JSON.stringify(handle);
})()"#;

/// Tags a registered element so the CLI can address it
const MARK_SCRIPT: &str = r#"(() => {
  const handle = __ARG__;
  const reg = window.__retarget;
  const el = reg && reg.nodes.get(handle);
  if (!el || !el.isConnected) return JSON.stringify(false);
  el.setAttribute('data-retarget-handle', handle);
  return JSON.stringify(true);
})()"#;

/// Tag of the deepest element under a viewport point, through open shadow
/// roots and same-origin iframes, or null
const HIT_SCRIPT: &str = r#"(() => {
  const p = __ARG__;
  const deep = (root, x, y) => {
    const el = root.elementFromPoint(x, y);
    if (!el) return null;
    if (el.shadowRoot) {
      const inner = el.shadowRoot.elementFromPoint(x, y);
      if (inner && inner !== el) return deep(el.shadowRoot, x, y) || inner;
    }
    if (el.tagName === 'IFRAME') {
      try {
        const r = el.getBoundingClientRect();
        const doc = el.contentDocument;
        if (doc) return deep(doc, x - r.left, y - r.top) || el;
      } catch (e) { return el; }
    }
    return el;
  };
  const el = deep(document, p.x, p.y);
  return JSON.stringify(el ? el.tagName.toLowerCase() : null);
})()"#;

/// Raw element facts; the role is resolved on this side
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveRecord {
    handle: String,
    tag: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    input_type: Option<String>,
    #[serde(default)]
    has_href: bool,
    #[serde(default)]
    aria_label: Option<String>,
    #[serde(default)]
    placeholder: Option<String>,
    #[serde(default)]
    bounding_box: BoundingBox,
}

impl From<LiveRecord> for LiveElement {
    fn from(record: LiveRecord) -> Self {
        let role = effective_role(
            record.role.as_deref(),
            &record.tag,
            record.input_type.as_deref(),
            record.has_href,
        );
        Self {
            handle: ElementHandle(record.handle),
            tag: record.tag,
            text: record.text,
            role,
            aria_label: record.aria_label,
            placeholder: record.placeholder,
            bounding_box: record.bounding_box,
        }
    }
}

/// Substitute the shared traversal and a JSON argument into a script template
fn render_script(template: &str, arg: &impl Serialize) -> Result<String> {
    Ok(template
        .replace("__TRAVERSE__", TRAVERSE_SCRIPT)
        .replace("__ARG__", &serde_json::to_string(arg)?))
}

/// Locator plus the traversal bound, as read by the locate script
fn locate_query(locator: &Locator) -> Result<Value> {
    let mut query = serde_json::to_value(locator)?;
    query["maxShadowDepth"] = Value::from(MAX_SHADOW_DEPTH);
    Ok(query)
}

/// A coordinate click only counts when it lands on a real element
fn check_hit(hit: &Value, x: f64, y: f64) -> Result<()> {
    match hit.as_str() {
        Some(tag) if tag != "html" && tag != "body" => Ok(()),
        Some(tag) => Err(TargetingError::not_found(format!(
            "only <{}> at ({}, {})",
            tag, x, y
        ))),
        None => Err(TargetingError::not_found(format!("nothing at ({}, {})", x, y))),
    }
}

/// Decode `eval` output. The CLI may print the returned string quoted or raw.
fn parse_eval_output(output: &str) -> Result<Value> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_str::<Value>(trimmed)? {
        Value::String(inner) => Ok(serde_json::from_str(&inner).unwrap_or(Value::String(inner))),
        other => Ok(other),
    }
}

/// CSS selector that addresses a marked handle
fn handle_selector(handle: &ElementHandle) -> String {
    format!("[{}=\"{}\"]", HANDLE_ATTRIBUTE, handle.as_str())
}

/// Page driven through the agent-browser CLI
pub struct AgentBrowserPage {
    /// Session name for isolation
    session_name: String,
    /// Whether to run in headed mode
    headed: bool,
}

impl AgentBrowserPage {
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            headed: false,
        }
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        let mut page = Self::new(config.session_name.clone());
        page.set_headed(config.headed);
        page
    }

    /// Set headed mode
    pub fn set_headed(&mut self, headed: bool) {
        self.headed = headed;
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Check if agent-browser is installed
    pub async fn is_available() -> bool {
        Command::new("agent-browser")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Close the browser session
    pub async fn close(&self) -> Result<()> {
        self.run_command(&["close"]).await.map(|_| ())
    }

    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("agent-browser");
        cmd.args(["--session", &self.session_name]);

        if self.headed {
            cmd.arg("--headed");
        }

        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        debug!(command = args.first().copied().unwrap_or_default(), "agent-browser");
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TargetingError::AgentBrowserNotFound
            } else {
                TargetingError::browser(format!("Failed to run agent-browser: {}", e))
            }
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(TargetingError::browser(format!(
                "agent-browser {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )))
        }
    }

    async fn eval_json(&self, script: &str) -> Result<Value> {
        let output = self.run_command(&["eval", script]).await?;
        parse_eval_output(&output)
    }

    /// Tag a registered element; fails when the handle went stale
    async fn mark(&self, handle: &ElementHandle) -> Result<String> {
        let script = render_script(MARK_SCRIPT, &handle.as_str())?;
        match self.eval_json(&script).await? {
            Value::Bool(true) => Ok(handle_selector(handle)),
            _ => Err(TargetingError::not_found(format!(
                "{} is no longer attached",
                handle.as_str()
            ))),
        }
    }
}

impl Default for AgentBrowserPage {
    fn default() -> Self {
        Self::new("retarget")
    }
}

#[async_trait]
impl Page for AgentBrowserPage {
    async fn navigate(&self, url: &str, wait: WaitPolicy, timeout: Duration) -> Result<()> {
        let load = async {
            self.run_command(&["open", url]).await?;
            if let Err(e) = self.run_command(&["wait", "--load", wait.as_str()]).await {
                warn!(url, wait = wait.as_str(), error = %e, "Load state not reached");
            }
            Ok::<(), TargetingError>(())
        };
        tokio::time::timeout(timeout, load).await.map_err(|_| {
            TargetingError::browser(format!(
                "Navigation to {} timed out after {}ms",
                url,
                timeout.as_millis()
            ))
        })?
    }

    async fn run_in_page_context(&self, request: &PageRequest) -> Result<Value> {
        match request {
            PageRequest::Scan(options) => {
                let script = render_script(SCAN_SCRIPT, options)?;
                self.eval_json(&script).await
            }
            PageRequest::LiveElements => {
                let script = render_script(
                    LIVE_ELEMENTS_SCRIPT,
                    &serde_json::json!({ "maxShadowDepth": MAX_SHADOW_DEPTH }),
                )?;
                let records: Vec<LiveRecord> =
                    serde_json::from_value(self.eval_json(&script).await?)?;
                let elements: Vec<LiveElement> =
                    records.into_iter().map(LiveElement::from).collect();
                Ok(serde_json::to_value(elements)?)
            }
        }
    }

    async fn locate(&self, locator: &Locator) -> Result<Option<ElementHandle>> {
        let script = render_script(LOCATE_SCRIPT, &locate_query(locator)?)?;
        match self.eval_json(&script).await? {
            Value::String(handle) => Ok(Some(ElementHandle(handle))),
            _ => Ok(None),
        }
    }

    async fn act(&self, handle: &ElementHandle, action: Action, value: Option<&str>) -> Result<()> {
        let marked = self.mark(handle).await?;
        let selector = marked.as_str();
        let value = value.unwrap_or_default();
        let args: Vec<&str> = match action {
            Action::Click => vec!["click", selector],
            Action::Type => vec!["fill", selector, value],
            Action::Clear => vec!["fill", selector, ""],
            Action::Select => vec!["select", selector, value],
            Action::Hover => vec!["hover", selector],
            Action::Check => vec!["check", selector],
            Action::Uncheck => vec!["uncheck", selector],
            Action::Verify => return Ok(()),
            Action::Wait => {
                return Err(TargetingError::rejected("wait does not target an element"));
            }
        };
        self.run_command(&args)
            .await
            .map(|_| ())
            .map_err(|e| {
                TargetingError::rejected(format!("{} on {}: {}", action, handle.as_str(), e))
            })
    }

    async fn mouse_click(&self, x: f64, y: f64) -> Result<()> {
        let script = render_script(HIT_SCRIPT, &serde_json::json!({ "x": x, "y": y }))?;
        check_hit(&self.eval_json(&script).await?, x, y)?;

        let (x, y) = (x.round().to_string(), y.round().to_string());
        self.run_command(&["mouse", "move", &x, &y]).await?;
        self.run_command(&["mouse", "down"]).await?;
        self.run_command(&["mouse", "up"]).await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let path = std::env::temp_dir().join(format!(
            "retarget-{}-{}.png",
            self.session_name,
            std::process::id()
        ));
        let path_str = path.to_string_lossy().into_owned();
        self.run_command(&["screenshot", &path_str]).await?;
        let bytes = tokio::fs::read(&path).await?;
        let _ = tokio::fs::remove_file(&path).await;
        Ok(bytes)
    }
}
