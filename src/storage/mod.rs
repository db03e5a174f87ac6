//! Table stores receiving the processed tables.
//!
//! Every store follows truncate-then-append: a run first truncates the tables
//! it owns, then appends its full output, so a rerun overwrites the previous
//! run completely.

pub mod memory_store;
pub mod minio_client;
pub mod parquet_store;
pub mod storage_manager;

pub use memory_store::MemoryStore;
pub use minio_client::MinioStore;
pub use parquet_store::ParquetStore;
pub use storage_manager::StorageManager;

use crate::config::{MinioConfig, StoreConfig, StoreKind};
use crate::error::Result;
use anyhow::Context;
use async_trait::async_trait;
use polars::prelude::*;
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Removes every row of `table`.
    async fn truncate(&self, table: &str) -> Result<()>;

    async fn append(&self, table: &str, df: &DataFrame) -> Result<()>;

    /// Reads all rows of `table`. A table without stored rows reads as an
    /// empty frame.
    async fn read(&self, table: &str) -> Result<DataFrame>;

    async fn count(&self, table: &str) -> Result<usize> {
        Ok(self.read(table).await?.height())
    }

    async fn replace(&self, table: &str, df: &DataFrame) -> Result<()> {
        self.truncate(table).await?;
        self.append(table, df).await
    }
}

/// Builds the store selected by the configuration.
pub async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn TableStore>> {
    let store: Arc<dyn TableStore> = match config.kind {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Parquet => Arc::new(ParquetStore::new(&config.dir)),
        StoreKind::Minio => {
            let minio = MinioConfig::from_file(&config.minio_config)
                .context("Failed to load MinIO configuration")?;
            let store = MinioStore::from_config(&minio)
                .context("Failed to initialize MinIO storage")?;
            store.ensure_bucket().await?;
            info!("Using MinIO bucket {}", store.get_bucket_name());
            Arc::new(store)
        }
    };
    Ok(store)
}
