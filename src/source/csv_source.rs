use crate::config::{SourceConfig, TableSource};
use crate::error::{PipelineError, Result};
use crate::processor::table_codec::tables;
use crate::source::{SourceReader, apply_renames};
use async_trait::async_trait;
use polars::prelude::*;
use std::io::Cursor;
use std::path::PathBuf;
use tracing::{debug, info};

/// Reads source tables from CSV files in one directory.
///
/// Every column is loaded as text; numeric coercion is left to the cleaning
/// rules so malformed numbers become nulls instead of read failures.
pub struct CsvSource {
    dir: PathBuf,
    products: TableSource,
    sales: TableSource,
}

impl CsvSource {
    pub fn new(dir: impl Into<PathBuf>, products: TableSource, sales: TableSource) -> Self {
        Self {
            dir: dir.into(),
            products,
            sales,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            config.dir.clone(),
            config.products.clone(),
            config.sales.clone(),
        )
    }

    fn table_source(&self, table: &str) -> Option<&TableSource> {
        match table {
            tables::PRODUCTS => Some(&self.products),
            tables::SALES => Some(&self.sales),
            _ => None,
        }
    }

    pub fn path_for(&self, table: &str) -> Option<PathBuf> {
        self.table_source(table).map(|t| self.dir.join(&t.file))
    }
}

#[async_trait]
impl SourceReader for CsvSource {
    async fn read(&self, table: &str) -> Result<DataFrame> {
        let (source, path) = match (self.table_source(table), self.path_for(table)) {
            (Some(source), Some(path)) => (source, path),
            _ => {
                return Err(PipelineError::NotFound {
                    table: table.to_string(),
                    location: self.dir.display().to_string(),
                });
            }
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::NotFound {
                    table: table.to_string(),
                    location: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        info!("Reading {} from {}", table, path.display());

        let mut df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;
        apply_renames(&mut df, &source.rename)?;

        debug!("Columns of {}: {:?}", table, df.get_column_names());
        Ok(df)
    }
}
