//! CLI commands
//!
//! One handler per subcommand. Handlers return the text to print on stdout;
//! progress and diagnostics go through tracing.

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::core::{Config, Result, TargetingError};
use crate::executor::{load_plan, FallbackExecutor, PlanRunner, StepResult};
use crate::page::{AgentBrowserPage, Page};
use crate::scan::PageScanner;
use crate::store::{load_scan, save_scan, DescriptorStore, InMemoryStore};

/// `scan <url>`: navigate, scan and print or save the result
pub async fn scan(
    config: &Config,
    url: &str,
    output: Option<&Path>,
    screenshot: Option<&Path>,
) -> Result<String> {
    let page = Arc::new(AgentBrowserPage::from_config(&config.browser));
    let scanner = PageScanner::new(page.clone(), config)?;
    let scan = scanner.scan(url).await?;

    if let Some(path) = screenshot {
        let bytes = page.screenshot().await?;
        tokio::fs::write(path, bytes).await?;
        info!(path = %path.display(), "Screenshot saved");
    }

    match output {
        Some(path) => {
            save_scan(&scan, path).await?;
            Ok(format!(
                "Saved {} elements for {} to {}\n\n{}",
                scan.len(),
                scan.page_id,
                path.display(),
                scan.summary()
            ))
        }
        None => Ok(serde_json::to_string_pretty(&scan)?),
    }
}

/// `run <plan> --scan <scan>`: execute a plan against the live page
pub async fn run(
    config: &Config,
    plan_path: &Path,
    scan_path: &Path,
    url: Option<&str>,
) -> Result<String> {
    let store = InMemoryStore::new();
    let loaded = load_scan(scan_path).await?;
    let page_id = loaded.page_id.clone();
    store.put(loaded).await?;
    let scan = store
        .get(&page_id)
        .await?
        .ok_or_else(|| TargetingError::store(format!("No scan stored for {}", page_id)))?;

    let steps = load_plan(plan_path).await?;
    let url = url.unwrap_or(scan.url.as_str()).to_string();

    let page: Arc<dyn Page> = Arc::new(AgentBrowserPage::from_config(&config.browser));
    page.navigate(
        &url,
        config.browser.wait_policy,
        config.browser.navigation_timeout(),
    )
    .await?;
    tokio::time::sleep(config.browser.settle_delay()).await;

    let executor = FallbackExecutor::new(page, config.executor.clone());
    let results = PlanRunner::new(&executor, &scan).run(&steps).await;
    info!(
        steps = results.len(),
        failed = results.iter().filter(|r| !r.is_success()).count(),
        "Plan finished"
    );

    render_results(&results)
}

/// `config [--init]`: show the effective config, or write the default file
pub fn config(config: &Config, init: bool) -> Result<String> {
    if init {
        let path = Config::default().save_and_get_path()?;
        return Ok(format!("Wrote default config to {}", path.display()));
    }

    let body = toml::to_string_pretty(config)
        .map_err(|e| TargetingError::config(format!("Failed to serialize config: {}", e)))?;
    Ok(format!("# {}\n{}", Config::config_file().display(), body))
}

fn render_results(results: &[StepResult]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}
