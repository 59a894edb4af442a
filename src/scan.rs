//! Page scanner
//!
//! Navigates, lets client-side rendering settle, walks the DOM through the
//! page boundary and turns every element into a descriptor. Descriptors are
//! bucketed into interactive elements, form controls and readable content,
//! then deduplicated per bucket.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::core::config::BrowserConfig;
use crate::core::{Config, Result};
use crate::descriptor::{dedup, DescriptorBuilder, ElementCategory, ElementDescriptor};
use crate::page::{scan_snapshot, Page, PageSnapshot, ScanOptions};

/// Generic elements kept as readable content when they carry text
const CONTENT_TAGS: &[&str] = &[
    "p", "span", "label", "li", "td", "th", "dt", "dd", "blockquote", "pre", "code", "strong",
    "em", "small", "figcaption", "legend", "caption",
];

/// Descriptors produced by one scan of one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageScan {
    pub page_id: String,
    pub url: String,
    pub title: String,
    pub interactive: Vec<ElementDescriptor>,
    pub forms: Vec<ElementDescriptor>,
    pub content: Vec<ElementDescriptor>,
}

impl PageScan {
    /// Look up a descriptor by element id across all buckets
    pub fn find(&self, element_id: &str) -> Option<&ElementDescriptor> {
        self.all().find(|d| d.id == element_id)
    }

    /// Every descriptor: interactive, then forms, then content
    pub fn all(&self) -> impl Iterator<Item = &ElementDescriptor> {
        self.interactive
            .iter()
            .chain(self.forms.iter())
            .chain(self.content.iter())
    }

    pub fn len(&self) -> usize {
        self.interactive.len() + self.forms.len() + self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compact listing for a planner prompt
    pub fn summary(&self) -> String {
        let mut out = format!("Page: {} ({})\n", self.title, self.url);
        for (heading, items) in [
            ("Interactive", &self.interactive),
            ("Forms", &self.forms),
            ("Content", &self.content),
        ] {
            if items.is_empty() {
                continue;
            }
            out.push_str(&format!("\n{} ({}):\n", heading, items.len()));
            for d in items {
                out.push_str(&format!("- [{}] {}", d.id, d.label()));
                if !d.supported_actions.is_empty() {
                    out.push_str(&format!(" actions={}", d.supported_actions.join(",")));
                }
                if d.purpose != "unknown" {
                    out.push_str(&format!(" purpose={}", d.purpose));
                }
                out.push('\n');
            }
        }
        out
    }
}

/// Stable page id: host plus path without a trailing slash
pub fn page_id(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            let path = parsed.path().trim_end_matches('/');
            format!("{}{}", host, path)
        }
        Err(_) => url.to_string(),
    }
}

/// Which bucket a descriptor belongs to, if any
fn bucket(descriptor: &ElementDescriptor) -> Option<Bucket> {
    use ElementCategory::*;
    match descriptor.category {
        Button | SubmitButton | Link | Clickable => Some(Bucket::Interactive),
        InputText | InputPassword | InputEmail | Textarea | Dropdown | Checkbox | Radio | Form => {
            Some(Bucket::Forms)
        }
        Heading | Image => Some(Bucket::Content),
        Generic
            if descriptor.text_snippet.is_some()
                && CONTENT_TAGS.contains(&descriptor.tag.as_str()) =>
        {
            Some(Bucket::Content)
        }
        Generic => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Interactive,
    Forms,
    Content,
}

/// Scans pages into descriptor sets
pub struct PageScanner {
    page: Arc<dyn Page>,
    browser: BrowserConfig,
    builder: DescriptorBuilder,
    options: ScanOptions,
}

impl PageScanner {
    pub fn new(page: Arc<dyn Page>, config: &Config) -> Result<Self> {
        Ok(Self {
            page,
            browser: config.browser.clone(),
            builder: DescriptorBuilder::from_config(&config.scan)?,
            options: ScanOptions::from(&config.scan),
        })
    }

    /// Navigate to a URL, wait for it to settle, then scan it
    pub async fn scan(&self, url: &str) -> Result<PageScan> {
        info!(url, "Scanning page");
        self.page
            .navigate(url, self.browser.wait_policy, self.browser.navigation_timeout())
            .await?;
        tokio::time::sleep(self.browser.settle_delay()).await;
        self.scan_current().await
    }

    /// Scan whatever the page currently shows
    pub async fn scan_current(&self) -> Result<PageScan> {
        let snapshot = scan_snapshot(self.page.as_ref(), &self.options).await?;
        let scan = self.build_scan(snapshot);
        info!(
            page = %scan.page_id,
            interactive = scan.interactive.len(),
            forms = scan.forms.len(),
            content = scan.content.len(),
            "Scan complete"
        );
        Ok(scan)
    }

    /// Build, bucket and deduplicate descriptors for a snapshot
    pub fn build_scan(&self, snapshot: PageSnapshot) -> PageScan {
        let mut interactive = Vec::new();
        let mut forms = Vec::new();
        let mut content = Vec::new();

        for raw in &snapshot.elements {
            let descriptor = match self.builder.build(raw) {
                Ok(d) => d,
                Err(e) => {
                    debug!(index = raw.index, error = %e, "Skipping element");
                    continue;
                }
            };
            match bucket(&descriptor) {
                Some(Bucket::Interactive) => interactive.push(descriptor),
                Some(Bucket::Forms) => forms.push(descriptor),
                Some(Bucket::Content) => content.push(descriptor),
                None => {}
            }
        }

        PageScan {
            page_id: page_id(&snapshot.url),
            url: snapshot.url,
            title: snapshot.title,
            interactive: dedup(interactive),
            forms: dedup(forms),
            content: dedup(content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ElementSpec, InMemoryPage, PageEvent};

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.browser.settle_delay_ms = 0;
        config
    }

    fn fixture() -> Arc<InMemoryPage> {
        let page = Arc::new(InMemoryPage::new("https://mail.test/inbox/", "Inbox"));
        let body = page.body();
        page.append(body, ElementSpec::new("h1").text("Inbox").bbox(0.0, 0.0, 300.0, 40.0));
        let form = page.append(body, ElementSpec::new("form").attr("id", "compose"));
        page.append(
            form,
            ElementSpec::new("input")
                .attr("type", "email")
                .attr("placeholder", "To")
                .bbox(50.0, 0.0, 200.0, 30.0),
        );
        page.append(
            form,
            ElementSpec::new("button")
                .attr("aria-label", "Send")
                .text("Send")
                .bbox(100.0, 0.0, 80.0, 30.0),
        );
        page.append(
            body,
            ElementSpec::new("button")
                .attr("aria-label", "Send")
                .text("Send")
                .bbox(400.0, 0.0, 80.0, 30.0),
        );
        page.append(body, ElementSpec::new("div"));
        page
    }

    #[test]
    fn test_page_id() {
        assert_eq!(page_id("https://mail.test/inbox/"), "mail.test/inbox");
        assert_eq!(page_id("https://mail.test"), "mail.test");
        assert_eq!(page_id("not a url"), "not a url");
    }

    #[tokio::test]
    async fn test_scan_buckets_and_dedups() {
        let page = fixture();
        let scanner = PageScanner::new(page.clone(), &fast_config()).unwrap();
        let scan = scanner.scan("https://mail.test/inbox/").await.unwrap();

        assert_eq!(scan.page_id, "mail.test/inbox");
        assert_eq!(scan.title, "Inbox");
        assert_eq!(scan.interactive.len(), 1);
        assert_eq!(
            scan.interactive[0].candidate_selectors[0],
            r#"button[aria-label="Send"]"#
        );
        assert_eq!(scan.forms.len(), 2);
        assert_eq!(scan.content.len(), 1);
        assert!(matches!(page.events()[0], PageEvent::Navigated(_)));

        let send = scan.interactive[0].id.clone();
        assert!(scan.find(&send).is_some());
        assert!(scan.find("el-999").is_none());
    }

    #[tokio::test]
    async fn test_scan_is_deterministic() {
        let page = fixture();
        let scanner = PageScanner::new(page, &fast_config()).unwrap();
        let a = scanner.scan_current().await.unwrap();
        let b = scanner.scan_current().await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_summary_lists_buckets() {
        let scanner = PageScanner::new(fixture(), &fast_config()).unwrap();
        let summary = scanner.scan_current().await.unwrap().summary();

        assert!(summary.starts_with("Page: Inbox (https://mail.test/inbox/)"));
        assert!(summary.contains("Interactive (1):"));
        assert!(summary.contains(r#"button <button> "Send" actions=click,hover purpose=submit"#));
        assert!(summary.contains("Forms (2):"));
    }
}
