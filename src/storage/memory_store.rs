use crate::error::Result;
use crate::storage::{StorageManager, TableStore};
use async_trait::async_trait;
use polars::prelude::*;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local store; contents live as long as the store value.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, DataFrame>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn truncate(&self, table: &str) -> Result<()> {
        self.tables
            .write()
            .await
            .insert(table.to_string(), DataFrame::empty());
        debug!("Truncated {}", table);
        Ok(())
    }

    async fn append(&self, table: &str, df: &DataFrame) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stacked = StorageManager::stack(tables.remove(table), df)?;
        debug!("Appended {} rows to {}", df.height(), table);
        tables.insert(table.to_string(), stacked);
        Ok(())
    }

    async fn read(&self, table: &str) -> Result<DataFrame> {
        Ok(self
            .tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_else(DataFrame::empty))
    }
}
