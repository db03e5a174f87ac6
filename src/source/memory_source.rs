use crate::error::{PipelineError, Result};
use crate::source::SourceReader;
use async_trait::async_trait;
use polars::prelude::*;
use std::collections::HashMap;

/// Source backed by frames held in memory.
#[derive(Default, Clone)]
pub struct MemorySource {
    tables: HashMap<String, DataFrame>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, df: DataFrame) -> Self {
        self.tables.insert(name.to_string(), df);
        self
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn read(&self, table: &str) -> Result<DataFrame> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound {
                table: table.to_string(),
                location: "memory".to_string(),
            })
    }
}
