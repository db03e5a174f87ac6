use crate::error::Result;
use polars::prelude::*;
use std::io::Cursor;

/// Table file naming and Parquet encoding shared by the file-backed stores.
pub struct StorageManager;

impl StorageManager {
    pub fn table_file_name(table: &str) -> String {
        format!("{}.parquet", table)
    }

    pub fn table_key(prefix: &str, table: &str) -> String {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            Self::table_file_name(table)
        } else {
            format!("{}/{}", prefix, Self::table_file_name(table))
        }
    }

    pub fn encode_parquet(df: &DataFrame) -> Result<Vec<u8>> {
        let mut df = df.clone();
        let mut buf = Vec::new();
        {
            let writer = ParquetWriter::new(&mut buf);
            writer.finish(&mut df)?;
        }
        Ok(buf)
    }

    pub fn decode_parquet(bytes: Vec<u8>) -> Result<DataFrame> {
        Ok(ParquetReader::new(Cursor::new(bytes)).finish()?)
    }

    /// Appends `df` below `existing`. A column-less frame (truncated table)
    /// is replaced rather than stacked.
    pub fn stack(existing: Option<DataFrame>, df: &DataFrame) -> Result<DataFrame> {
        match existing {
            Some(existing) if existing.width() > 0 => Ok(existing.vstack(df)?),
            _ => Ok(df.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_key() {
        assert_eq!(StorageManager::table_key("tables", "sales_report"), "tables/sales_report.parquet");
        assert_eq!(StorageManager::table_key("/a/b/", "x"), "a/b/x.parquet");
        assert_eq!(StorageManager::table_key("", "x"), "x.parquet");
    }

    #[test]
    fn test_parquet_round_trip() {
        let df = df!(
            "sale_id" => ["S1", "S2"],
            "revenue_total" => [Some(26.0), None]
        )
        .unwrap();

        let bytes = StorageManager::encode_parquet(&df).unwrap();
        let back = StorageManager::decode_parquet(bytes).unwrap();

        assert!(back.equals_missing(&df));
    }

    #[test]
    fn test_stack_after_truncate_replaces() {
        let df = df!("a" => [1i64, 2]).unwrap();
        let stacked = StorageManager::stack(Some(DataFrame::empty()), &df).unwrap();
        assert_eq!(stacked.height(), 2);

        let stacked = StorageManager::stack(Some(stacked), &df).unwrap();
        assert_eq!(stacked.height(), 4);
    }
}
