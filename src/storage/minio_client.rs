use crate::config::MinioConfig;
use crate::error::{PipelineError, Result as StoreResult};
use crate::storage::{StorageManager, TableStore};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use polars::prelude::*;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use tracing::info;

/// Table store keeping one Parquet object per table in a MinIO/S3 bucket.
pub struct MinioStore {
    bucket: Bucket,
    table_prefix: String,
}

impl MinioStore {
    pub fn new(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        bucket_name: &str,
    ) -> Result<Self> {
        let region = Region::Custom {
            region: "us-east-1".to_owned(),
            endpoint: endpoint.to_owned(),
        };
        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)?;
        let bucket = Bucket::new(bucket_name, region, credentials)?;

        Ok(MinioStore {
            bucket: *bucket.with_path_style(),
            table_prefix: "tables".to_string(),
        })
    }

    pub fn from_config(config: &MinioConfig) -> Result<Self> {
        config.validate()?;

        let region = Region::Custom {
            region: config.get_region().to_owned(),
            endpoint: config.endpoint.clone(),
        };
        let credentials = Credentials::new(
            Some(config.get_access_key()?),
            Some(config.get_secret_key()?),
            None,
            None,
            None,
        )?;
        let bucket = Bucket::new(&config.bucket_name, region, credentials)?;
        let bucket = if config.is_path_style() {
            *bucket.with_path_style()
        } else {
            *bucket
        };

        Ok(MinioStore {
            bucket,
            table_prefix: config.get_table_prefix().to_string(),
        })
    }

    pub async fn ensure_bucket(&self) -> Result<()> {
        match self.bucket.exists().await {
            Ok(true) => {
                info!("Bucket '{}' already exists", self.bucket.name);
            }
            Ok(false) => {
                let config = s3::BucketConfiguration::default();
                s3::Bucket::create(
                    &self.bucket.name,
                    self.bucket.region.clone(),
                    self.bucket.credentials().await?,
                    config,
                )
                .await
                .map_err(|e| anyhow!("Failed to create bucket: {}", e))?;
                info!("Created bucket: {}", self.bucket.name);
            }
            Err(e) => {
                return Err(anyhow!("Failed to check bucket existence: {}", e));
            }
        }
        Ok(())
    }

    pub fn table_key(&self, table: &str) -> String {
        StorageManager::table_key(&self.table_prefix, table)
    }

    pub fn get_bucket_name(&self) -> &str {
        &self.bucket.name
    }

    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let list = self.bucket.list(prefix.to_string(), None).await?;
        Ok(list
            .into_iter()
            .flat_map(|result| result.contents)
            .map(|object| object.key)
            .collect())
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        Ok(self.list_objects(key).await?.iter().any(|k| k == key))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let response = self.bucket.get_object(key).await?;
        if response.status_code() == 200 {
            Ok(response.bytes().to_vec())
        } else {
            Err(anyhow!("Failed to get object: HTTP {}", response.status_code()))
        }
    }

    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        let response = self.bucket.put_object(key, data).await?;
        if response.status_code() == 200 {
            info!("Stored object: {}", key);
            Ok(())
        } else {
            Err(anyhow!("Failed to store object: HTTP {}", response.status_code()))
        }
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let response = self.bucket.delete_object(key).await?;
        if response.status_code() == 204 || response.status_code() == 200 {
            info!("Deleted object: {}", key);
            Ok(())
        } else {
            Err(anyhow!("Failed to delete object: HTTP {}", response.status_code()))
        }
    }

    async fn read_existing(&self, table: &str) -> Result<Option<DataFrame>> {
        let key = self.table_key(table);
        if !self.object_exists(&key).await? {
            return Ok(None);
        }
        let bytes = self.get_object(&key).await?;
        Ok(Some(StorageManager::decode_parquet(bytes)?))
    }
}

#[async_trait]
impl TableStore for MinioStore {
    async fn truncate(&self, table: &str) -> StoreResult<()> {
        let key = self.table_key(table);
        let exists = self
            .object_exists(&key)
            .await
            .map_err(|e| PipelineError::storage(table, e))?;
        if exists {
            self.delete_object(&key)
                .await
                .map_err(|e| PipelineError::storage(table, e))?;
        }
        Ok(())
    }

    async fn append(&self, table: &str, df: &DataFrame) -> StoreResult<()> {
        let existing = self
            .read_existing(table)
            .await
            .map_err(|e| PipelineError::storage(table, e))?;
        let stacked = StorageManager::stack(existing, df)?;
        let bytes = StorageManager::encode_parquet(&stacked)?;
        self.put_object(&self.table_key(table), &bytes)
            .await
            .map_err(|e| PipelineError::storage(table, e))
    }

    async fn read(&self, table: &str) -> StoreResult<DataFrame> {
        let existing = self
            .read_existing(table)
            .await
            .map_err(|e| PipelineError::storage(table, e))?;
        Ok(existing.unwrap_or_else(DataFrame::empty))
    }
}
