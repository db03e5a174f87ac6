use crate::error::Result;
use crate::storage::{StorageManager, TableStore};
use async_trait::async_trait;
use polars::prelude::*;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Stores each table as one Parquet file in a directory.
pub struct ParquetStore {
    dir: PathBuf,
}

impl ParquetStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(StorageManager::table_file_name(table))
    }

    async fn read_existing(&self, table: &str) -> Result<Option<DataFrame>> {
        match tokio::fs::read(self.table_path(table)).await {
            Ok(bytes) => Ok(Some(StorageManager::decode_parquet(bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TableStore for ParquetStore {
    async fn truncate(&self, table: &str) -> Result<()> {
        match tokio::fs::remove_file(self.table_path(table)).await {
            Ok(()) => debug!("Truncated {}", table),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn append(&self, table: &str, df: &DataFrame) -> Result<()> {
        let stacked = StorageManager::stack(self.read_existing(table).await?, df)?;
        let bytes = StorageManager::encode_parquet(&stacked)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.table_path(table);
        tokio::fs::write(&path, bytes).await?;
        info!("Stored {} rows in {}", stacked.height(), path.display());
        Ok(())
    }

    async fn read(&self, table: &str) -> Result<DataFrame> {
        Ok(self
            .read_existing(table)
            .await?
            .unwrap_or_else(DataFrame::empty))
    }
}
