//! retarget - Resilient element targeting for browser automation
//!
//! Scans a page into multi-strategy element descriptors and later acts on
//! those elements even after the page has been re-rendered, restyled or
//! restructured.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **Page**: Page capability trait, agent-browser and in-memory pages
//! - **Descriptor**: Descriptor builder, classification and deduplication
//! - **Scan**: Page scanner producing bucketed descriptor sets
//! - **Store**: Descriptor storage keyed by page id
//! - **Executor**: Fallback action chain, fuzzy matching and plan runner
//! - **CLI**: Subcommand handlers for the binary
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use retarget::{Action, Config, FallbackExecutor, PageScanner};
//! use retarget::page::AgentBrowserPage;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load();
//!     let page = Arc::new(AgentBrowserPage::from_config(&config.browser));
//!
//!     let scanner = PageScanner::new(page.clone(), &config).unwrap();
//!     let scan = scanner.scan("https://example.com").await.unwrap();
//!
//!     let executor = FallbackExecutor::new(page, config.executor.clone());
//!     let link = &scan.interactive[0];
//!     let outcome = executor.perform(link, Action::Click, None).await;
//!     println!("{:?}", outcome.method);
//! }
//! ```

pub mod cli;
pub mod core;
pub mod descriptor;
pub mod executor;
pub mod page;
pub mod scan;
pub mod store;

// Re-export commonly used items
pub use crate::core::{Action, BoundingBox, Config, Result, TargetingError, WaitPolicy};
pub use descriptor::{DescriptorBuilder, ElementDescriptor};
pub use executor::{ActionOutcome, FallbackExecutor, PlanRunner, PlanStep, StepResult};
pub use page::{Page, PageRequest};
pub use scan::{PageScan, PageScanner};
pub use store::{DescriptorLookup, DescriptorStore, InMemoryStore};
