//! Page capability interface
//!
//! Everything the targeting engine needs from a live browser tab. Data that
//! crosses the page boundary is plain serde values; nothing returned from
//! `run_in_page_context` refers back into the page.

pub mod agent_browser;
pub mod memory;
pub mod query;
mod snapshot;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::core::config::ScanConfig;
use crate::core::{Action, Result, WaitPolicy};

pub use agent_browser::AgentBrowserPage;
pub use memory::{ElementSpec, InMemoryPage, NodeId, PageEvent};
pub use snapshot::{LiveElement, PageSnapshot, ParentInfo, PathSegment, RawElement};

/// One way of finding an element in the live DOM
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    /// The raw selector or expression
    pub fn as_str(&self) -> &str {
        match self {
            Locator::Css(s) | Locator::XPath(s) => s,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::XPath(s) => write!(f, "xpath={}", s),
        }
    }
}

/// Opaque token for an element located in the current page state.
///
/// Only meaningful to the page that issued it, and only until the next
/// re-render. Never stored in descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Options shipped into the page for a DOM walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOptions {
    pub max_shadow_depth: usize,
    pub include_hidden: bool,
    pub text_snippet_len: usize,
}

impl From<&ScanConfig> for ScanOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            max_shadow_depth: config.shadow_depth(),
            include_hidden: config.include_hidden,
            text_snippet_len: config.text_snippet_len,
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

/// Serializable request evaluated inside the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum PageRequest {
    /// Walk the DOM and return a [`PageSnapshot`]
    Scan(ScanOptions),
    /// Return every current element as a list of [`LiveElement`]
    LiveElements,
}

/// Capabilities of one live page or tab
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to a URL and wait for the given load state
    async fn navigate(&self, url: &str, wait: WaitPolicy, timeout: Duration) -> Result<()>;

    /// Evaluate a serializable request inside the page
    async fn run_in_page_context(&self, request: &PageRequest) -> Result<serde_json::Value>;

    /// Find the first element matching a locator, if any
    async fn locate(&self, locator: &Locator) -> Result<Option<ElementHandle>>;

    /// Perform an action on a located element
    async fn act(&self, handle: &ElementHandle, action: Action, value: Option<&str>) -> Result<()>;

    /// Click at viewport coordinates
    async fn mouse_click(&self, x: f64, y: f64) -> Result<()>;

    /// Capture the current viewport
    async fn screenshot(&self) -> Result<Vec<u8>>;
}

/// Run a DOM walk through the page boundary and decode the snapshot
pub async fn scan_snapshot(page: &dyn Page, options: &ScanOptions) -> Result<PageSnapshot> {
    let value = page
        .run_in_page_context(&PageRequest::Scan(options.clone()))
        .await?;
    Ok(serde_json::from_value(value)?)
}

/// Collect every current element through the page boundary
pub async fn live_elements(page: &dyn Page) -> Result<Vec<LiveElement>> {
    let value = page.run_in_page_context(&PageRequest::LiveElements).await?;
    Ok(serde_json::from_value(value)?)
}
