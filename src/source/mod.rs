//! Source readers supplying the raw product and sale tables.

pub mod csv_source;
pub mod memory_source;

pub use csv_source::CsvSource;
pub use memory_source::MemorySource;

use crate::error::Result;
use async_trait::async_trait;
use polars::prelude::*;
use std::collections::HashMap;

#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Reads a whole table. Fails with `NotFound` if the table does not exist.
    async fn read(&self, table: &str) -> Result<DataFrame>;
}

/// Renames source headers onto the canonical column names.
/// Header matching is case-insensitive.
pub fn apply_renames(df: &mut DataFrame, renames: &HashMap<String, String>) -> Result<()> {
    if renames.is_empty() {
        return Ok(());
    }
    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    for header in headers {
        if let Some(target) = renames
            .iter()
            .find(|(from, _)| from.eq_ignore_ascii_case(&header))
            .map(|(_, to)| to)
        {
            if target != &header {
                df.rename(&header, target.as_str().into())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_renames_is_case_insensitive() {
        let mut df = df!(
            "ID_Produto" => ["P1"],
            "Nome_Produto" => ["Mouse"],
            "status" => ["Ativo"]
        )
        .unwrap();
        let renames = HashMap::from([
            ("id_produto".to_string(), "id".to_string()),
            ("Nome_Produto".to_string(), "name".to_string()),
        ]);

        apply_renames(&mut df, &renames).unwrap();

        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["id", "name", "status"]);
    }
}
