//! Descriptor storage
//!
//! Scans are stored per page id. Storage is a trait so a persistent backend
//! can replace the in-memory one without touching the executor.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

use crate::core::{Result, TargetingError};
use crate::descriptor::ElementDescriptor;
use crate::scan::PageScan;

/// Persistent home for page scans
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    /// Scan stored for a page id
    async fn get(&self, page_id: &str) -> Result<Option<PageScan>>;

    /// Store a scan, replacing any previous scan for the same page
    async fn put(&self, scan: PageScan) -> Result<()>;

    /// Ids of every stored page
    async fn list(&self) -> Result<Vec<String>>;
}

/// Resolves element ids to descriptors
pub trait DescriptorLookup: Send + Sync {
    fn lookup(&self, element_id: &str) -> Option<&ElementDescriptor>;
}

impl DescriptorLookup for PageScan {
    fn lookup(&self, element_id: &str) -> Option<&ElementDescriptor> {
        self.find(element_id)
    }
}

/// Store backed by a map in memory
#[derive(Default)]
pub struct InMemoryStore {
    scans: RwLock<HashMap<String, PageScan>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DescriptorStore for InMemoryStore {
    async fn get(&self, page_id: &str) -> Result<Option<PageScan>> {
        Ok(self.scans.read().await.get(page_id).cloned())
    }

    async fn put(&self, scan: PageScan) -> Result<()> {
        if scan.page_id.trim().is_empty() {
            return Err(TargetingError::store("scan has no page id"));
        }
        for descriptor in scan.all() {
            descriptor.validate()?;
        }
        debug!(page = %scan.page_id, elements = scan.len(), "Storing scan");
        self.scans.write().await.insert(scan.page_id.clone(), scan);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.scans.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Read a scan previously written as JSON
pub async fn load_scan(path: impl AsRef<Path>) -> Result<PageScan> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| {
            TargetingError::with_context(format!("Failed to read {}", path.display()), e)
        })?;
    Ok(serde_json::from_str(&content)?)
}

/// Write a scan as pretty JSON
pub async fn save_scan(scan: &PageScan, path: impl AsRef<Path>) -> Result<()> {
    let content = serde_json::to_string_pretty(scan)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}
