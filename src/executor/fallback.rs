//! Fallback action executor
//!
//! Tries every exact strategy of a descriptor in order (CSS, then XPath),
//! then a coordinate click, then fuzzy re-matching. Each strategy gets its
//! own time budget and a failure only moves the chain to the next one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::config::ExecutorConfig;
use crate::core::{Action, Result, TargetingError};
use crate::descriptor::ElementDescriptor;
use crate::executor::fuzzy::FuzzyMatcher;
use crate::page::{live_elements, ElementHandle, Locator, Page};

/// Error reported when every strategy has been tried
pub const ALL_STRATEGIES_FAILED: &str = "All strategies failed";

/// Which kind of strategy resolved the element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Css,
    Xpath,
    Coordinates,
    Fuzzy,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Css => "css",
            Method::Xpath => "xpath",
            Method::Coordinates => "coordinates",
            Method::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&Locator> for Method {
    fn from(locator: &Locator) -> Self {
        match locator {
            Locator::Css(_) => Method::Css,
            Locator::XPath(_) => Method::Xpath,
        }
    }
}

/// One failed strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub method: Method,
    pub strategy: String,
    pub error: String,
}

/// Outcome of one action against one descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failed strategies, in the order they were tried
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<Attempt>,
}

impl ActionOutcome {
    /// Successful outcome for a resolved strategy
    pub fn resolved(method: Method, selector: impl Into<String>, attempts: Vec<Attempt>) -> Self {
        Self {
            success: true,
            method: Some(method),
            selector: Some(selector.into()),
            score: None,
            error: None,
            attempts,
        }
    }

    /// Successful outcome that touched no element
    pub fn done() -> Self {
        Self {
            success: true,
            method: None,
            selector: None,
            score: None,
            error: None,
            attempts: Vec::new(),
        }
    }

    /// Failed outcome
    pub fn failed(error: impl Into<String>, attempts: Vec<Attempt>) -> Self {
        Self {
            success: false,
            method: None,
            selector: None,
            score: None,
            error: Some(error.into()),
            attempts,
        }
    }
}

/// Runs actions through the fallback chain against one page
pub struct FallbackExecutor {
    page: Arc<dyn Page>,
    config: ExecutorConfig,
    matcher: FuzzyMatcher,
}

impl FallbackExecutor {
    pub fn new(page: Arc<dyn Page>, config: ExecutorConfig) -> Self {
        let matcher = FuzzyMatcher::new(config.fuzzy_threshold, config.position_tolerance_px);
        Self {
            page,
            config,
            matcher,
        }
    }

    /// Perform an action on the element a descriptor identifies
    pub async fn perform(
        &self,
        descriptor: &ElementDescriptor,
        action: Action,
        value: Option<&str>,
    ) -> ActionOutcome {
        match action {
            Action::Wait => return self.wait(value).await,
            Action::Verify => return self.verify(descriptor).await,
            _ => {}
        }

        let mut attempts = Vec::new();

        for locator in descriptor.locators() {
            let method = Method::from(&locator);
            match self.try_locator(&locator, action, value).await {
                Ok(()) => {
                    info!(element = %descriptor.id, %action, %method, selector = locator.as_str(), "Action performed");
                    return ActionOutcome::resolved(method, locator.as_str(), attempts);
                }
                Err(e) => {
                    if e.is_strategy_local() {
                        debug!(element = %descriptor.id, %method, selector = locator.as_str(), error = %e, "Strategy failed");
                    } else {
                        warn!(element = %descriptor.id, %method, selector = locator.as_str(), error = %e, "Strategy errored");
                    }
                    attempts.push(Attempt {
                        method,
                        strategy: locator.as_str().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if self.config.coordinate_fallback
            && action.supports_coordinates()
            && !descriptor.bounding_box.is_empty()
        {
            let (x, y) = descriptor.bounding_box.center();
            let point = format!("{},{}", x, y);
            match self.page.mouse_click(x, y).await {
                Ok(()) => {
                    info!(element = %descriptor.id, %point, "Clicked at last known position");
                    return ActionOutcome::resolved(Method::Coordinates, point, attempts);
                }
                Err(e) => {
                    debug!(element = %descriptor.id, %point, error = %e, "Coordinate click failed");
                    attempts.push(Attempt {
                        method: Method::Coordinates,
                        strategy: point,
                        error: e.to_string(),
                    });
                }
            }
        }

        match self.try_fuzzy(descriptor, action, value).await {
            Ok((handle, score)) => {
                info!(element = %descriptor.id, %action, score, "Action performed on fuzzy match");
                let mut outcome = ActionOutcome::resolved(Method::Fuzzy, handle.as_str(), attempts);
                outcome.score = Some(score);
                return outcome;
            }
            Err(e) => {
                debug!(element = %descriptor.id, error = %e, "Fuzzy matching failed");
                attempts.push(Attempt {
                    method: Method::Fuzzy,
                    strategy: format!("threshold>{}", self.matcher.threshold()),
                    error: e.to_string(),
                });
            }
        }

        warn!(element = %descriptor.id, %action, attempts = attempts.len(), "{}", ALL_STRATEGIES_FAILED);
        ActionOutcome::failed(ALL_STRATEGIES_FAILED, attempts)
    }

    /// Run an action that needs no element
    pub async fn perform_unbound(&self, action: Action, value: Option<&str>) -> ActionOutcome {
        match action {
            Action::Wait => self.wait(value).await,
            other => ActionOutcome::failed(format!("'{}' needs an element", other), Vec::new()),
        }
    }

    /// Sleep for the given number of milliseconds, or the configured default
    async fn wait(&self, value: Option<&str>) -> ActionOutcome {
        let millis = match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => self.config.default_wait_ms,
            Some(v) => match v.parse::<u64>() {
                Ok(ms) => ms,
                Err(_) => {
                    let error = format!("Invalid wait duration: {}", v);
                    return ActionOutcome::failed(error, Vec::new());
                }
            },
        };
        debug!(millis, "Waiting");
        tokio::time::sleep(Duration::from_millis(millis)).await;
        ActionOutcome::done()
    }

    /// Existence check over the exact strategies only, one lookup each
    async fn verify(&self, descriptor: &ElementDescriptor) -> ActionOutcome {
        let mut attempts = Vec::new();
        for locator in descriptor.locators() {
            let method = Method::from(&locator);
            let found = self.page.locate(&locator).await.and_then(|handle| {
                handle.ok_or_else(|| TargetingError::not_found(locator.to_string()))
            });
            match found {
                Ok(_) => return ActionOutcome::resolved(method, locator.as_str(), attempts),
                Err(e) => attempts.push(Attempt {
                    method,
                    strategy: locator.as_str().to_string(),
                    error: e.to_string(),
                }),
            }
        }
        warn!(element = %descriptor.id, "Element not present");
        ActionOutcome::failed(format!("Element not found: {}", descriptor.id), attempts)
    }

    async fn try_locator(
        &self,
        locator: &Locator,
        action: Action,
        value: Option<&str>,
    ) -> Result<()> {
        let handle = self.poll(locator).await?;
        self.page.act(&handle, action, value).await
    }

    /// Poll `locate` until an element shows up or the strategy budget runs out
    async fn poll(&self, locator: &Locator) -> Result<ElementHandle> {
        let interval = self.config.poll_interval();
        let search = async {
            loop {
                match self.page.locate(locator).await {
                    Ok(Some(handle)) => return Ok(handle),
                    Ok(None) => tokio::time::sleep(interval).await,
                    Err(e) => return Err(e),
                }
            }
        };

        let budget = self.config.strategy_timeout_ms;
        tokio::time::timeout(self.config.strategy_timeout(), search)
            .await
            .map_err(|_| TargetingError::timeout(locator.to_string(), budget))?
    }

    async fn try_fuzzy(
        &self,
        descriptor: &ElementDescriptor,
        action: Action,
        value: Option<&str>,
    ) -> Result<(ElementHandle, u32)> {
        let elements = live_elements(self.page.as_ref()).await?;
        let found = self
            .matcher
            .best_match(descriptor, &elements)
            .ok_or_else(|| {
                TargetingError::not_found(format!(
                    "no element scored above {}",
                    self.matcher.threshold()
                ))
            })?;
        debug!(element = %descriptor.id, handle = found.handle.as_str(), score = found.score, "Fuzzy match");
        self.page.act(&found.handle, action, value).await?;
        Ok((found.handle, found.score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BoundingBox;
    use crate::descriptor::DescriptorBuilder;
    use crate::page::{ElementSpec, InMemoryPage, PageEvent, RawElement};

    fn fast_config() -> ExecutorConfig {
        ExecutorConfig {
            strategy_timeout_ms: 20,
            poll_interval_ms: 5,
            default_wait_ms: 10,
            ..Default::default()
        }
    }

    fn descriptor(selectors: &[&str], xpaths: &[&str], bbox: BoundingBox) -> ElementDescriptor {
        let raw = RawElement {
            tag: "button".into(),
            text: Some("Send".into()),
            attributes: [("aria-label".to_string(), "Send".to_string())].into(),
            bounding_box: bbox,
            ..Default::default()
        };
        let mut d = DescriptorBuilder::default().build(&raw).unwrap();
        d.candidate_selectors = selectors.iter().map(|s| s.to_string()).collect();
        d.candidate_xpaths = xpaths.iter().map(|s| s.to_string()).collect();
        d
    }

    #[tokio::test]
    async fn test_css_then_xpath_order() {
        let page = Arc::new(InMemoryPage::new("https://app.test", "App"));
        page.append(
            page.body(),
            ElementSpec::new("button").attr("id", "go").text("Go"),
        );
        let executor = FallbackExecutor::new(page.clone(), fast_config());

        let d = descriptor(
            &["#missing", r#"button[name="gone"]"#],
            &["//*[@id=\"go\"]"],
            BoundingBox::default(),
        );
        let outcome = executor.perform(&d, Action::Click, None).await;

        assert!(outcome.success);
        assert_eq!(outcome.method, Some(Method::Xpath));
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.attempts[0].strategy, "#missing");
        assert_eq!(outcome.attempts[1].method, Method::Css);
    }

    #[tokio::test]
    async fn test_coordinates_only_for_click() {
        let page = Arc::new(InMemoryPage::new("https://app.test", "App"));
        page.append(
            page.body(),
            ElementSpec::new("canvas").bbox(100.0, 40.0, 80.0, 20.0),
        );
        let executor = FallbackExecutor::new(page.clone(), fast_config());
        let d = descriptor(&["#nope"], &[], BoundingBox::new(100.0, 40.0, 80.0, 20.0));

        let click = executor.perform(&d, Action::Click, None).await;
        assert_eq!(click.method, Some(Method::Coordinates));
        assert_eq!(click.selector.as_deref(), Some("80,110"));
        assert!(page
            .events()
            .iter()
            .any(|e| matches!(e, PageEvent::MouseClick { .. })));

        let hover = executor.perform(&d, Action::Hover, None).await;
        assert!(!hover.success);
        assert_eq!(hover.error.as_deref(), Some(ALL_STRATEGIES_FAILED));
        assert!(hover.attempts.iter().all(|a| a.method != Method::Coordinates));
    }

    #[tokio::test]
    async fn test_coordinate_miss_moves_on_to_fuzzy() {
        let page = Arc::new(InMemoryPage::new("https://app.test", "App"));
        let moved = page.append(
            page.body(),
            ElementSpec::new("button")
                .attr("aria-label", "Send")
                .text("Send")
                .bbox(600.0, 500.0, 80.0, 20.0),
        );
        let executor = FallbackExecutor::new(page.clone(), fast_config());
        let d = descriptor(&["#nope"], &[], BoundingBox::new(100.0, 40.0, 80.0, 20.0));

        let outcome = executor.perform(&d, Action::Click, None).await;

        assert!(outcome.success);
        assert_eq!(outcome.method, Some(Method::Fuzzy));
        let methods: Vec<Method> = outcome.attempts.iter().map(|a| a.method).collect();
        assert_eq!(methods, vec![Method::Css, Method::Coordinates]);
        assert!(page
            .events()
            .iter()
            .any(|e| matches!(e, PageEvent::Acted { node, .. } if *node == moved)));
    }

    #[tokio::test]
    async fn test_empty_box_skips_coordinates() {
        let page = Arc::new(InMemoryPage::new("https://app.test", "App"));
        let executor = FallbackExecutor::new(page, fast_config());
        let d = descriptor(&["#nope"], &["//nope"], BoundingBox::default());

        let outcome = executor.perform(&d, Action::Click, None).await;
        assert!(!outcome.success);
        let methods: Vec<Method> = outcome.attempts.iter().map(|a| a.method).collect();
        assert_eq!(methods, vec![Method::Css, Method::Xpath, Method::Fuzzy]);
    }

    #[tokio::test]
    async fn test_verify_fails_fast() {
        let page = Arc::new(InMemoryPage::new("https://app.test", "App"));
        page.append(page.body(), ElementSpec::new("div").attr("role", "button").text("Send"));
        let executor = FallbackExecutor::new(page.clone(), fast_config());
        let d = descriptor(&["#nope"], &[], BoundingBox::new(0.0, 0.0, 10.0, 10.0));

        let outcome = executor.perform(&d, Action::Verify, None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.attempts.len(), 1);
        assert!(page.events().is_empty());
    }

    #[tokio::test]
    async fn test_verify_does_not_poll() {
        let page = Arc::new(InMemoryPage::new("https://app.test", "App"));
        page.append(page.body(), ElementSpec::new("a").attr("href", "/x").text("X"));
        let config = ExecutorConfig {
            strategy_timeout_ms: 5_000,
            ..fast_config()
        };
        let executor = FallbackExecutor::new(page.clone(), config);
        let d = descriptor(
            &["#a", "#b", "#c", "#d", "#e", "#f"],
            &["//nope", "//gone"],
            BoundingBox::default(),
        );

        let outcome = tokio::time::timeout(
            Duration::from_millis(1_000),
            executor.perform(&d, Action::Verify, None),
        )
        .await
        .expect("verify waited on a strategy budget");

        assert!(!outcome.success);
        assert_eq!(outcome.attempts.len(), 8);
        assert_eq!(page.lookups().len(), 8);
    }

    #[tokio::test]
    async fn test_wait_never_touches_page() {
        let page = Arc::new(InMemoryPage::new("https://app.test", "App"));
        let executor = FallbackExecutor::new(page.clone(), fast_config());
        let d = descriptor(&["#nope"], &[], BoundingBox::default());

        assert!(executor.perform(&d, Action::Wait, Some("5")).await.success);
        assert!(executor.perform(&d, Action::Wait, None).await.success);
        assert!(!executor.perform(&d, Action::Wait, Some("soon")).await.success);
        assert!(page.lookups().is_empty());
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = ActionOutcome::resolved(Method::Css, "#go", Vec::new());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["method"], "css");
        assert_eq!(json["selector"], "#go");
        assert!(json.get("attempts").is_none());
    }
}
