use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinioConfigFile {
    pub minio: MinioSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinioSection {
    pub endpoint: String,
    pub bucket_name: String,
    pub region: Option<String>,
    pub path_style: Option<bool>,
    /// Object key prefix under which table files are written.
    pub table_prefix: Option<String>,
    pub env_access_key: Option<String>,
    pub env_secret_key: Option<String>,
}

/// Connection settings for the MinIO/S3 table store.
#[derive(Debug, Clone)]
pub struct MinioConfig {
    pub endpoint: String,
    pub bucket_name: String,
    pub region: Option<String>,
    pub path_style: Option<bool>,
    pub table_prefix: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub env_access_key: Option<String>,
    pub env_secret_key: Option<String>,
}

impl MinioConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read MinIO config file: {}", path))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse MinIO config file: {}", path))?;
        config.load_credentials()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: MinioConfigFile = toml::from_str(content)?;
        let section = file.minio;
        Ok(Self {
            endpoint: section.endpoint,
            bucket_name: section.bucket_name,
            region: section.region,
            path_style: section.path_style,
            table_prefix: section.table_prefix,
            access_key: None,
            secret_key: None,
            env_access_key: section.env_access_key,
            env_secret_key: section.env_secret_key,
        })
    }

    /// Reads credentials from the configured (or default) environment variables.
    pub fn load_credentials(&mut self) -> Result<()> {
        let access_key_var = self.env_access_key.as_deref().unwrap_or("MINIO_ACCESS_KEY");
        let secret_key_var = self.env_secret_key.as_deref().unwrap_or("MINIO_SECRET_KEY");

        self.access_key = env::var(access_key_var)
            .with_context(|| format!("Missing environment variable: {}", access_key_var))?
            .into();
        self.secret_key = env::var(secret_key_var)
            .with_context(|| format!("Missing environment variable: {}", secret_key_var))?
            .into();
        Ok(())
    }

    pub fn get_access_key(&self) -> Result<&str> {
        self.access_key
            .as_deref()
            .ok_or_else(|| anyhow!("Access key not loaded"))
    }

    pub fn get_secret_key(&self) -> Result<&str> {
        self.secret_key
            .as_deref()
            .ok_or_else(|| anyhow!("Secret key not loaded"))
    }

    pub fn is_path_style(&self) -> bool {
        self.path_style.unwrap_or(true)
    }

    pub fn get_region(&self) -> &str {
        self.region.as_deref().unwrap_or("us-east-1")
    }

    pub fn get_table_prefix(&self) -> &str {
        self.table_prefix.as_deref().unwrap_or("tables")
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(anyhow!("MinIO endpoint cannot be empty"));
        }
        if self.bucket_name.is_empty() {
            return Err(anyhow!("MinIO bucket name cannot be empty"));
        }
        if self.access_key.is_none() || self.secret_key.is_none() {
            return Err(anyhow!("MinIO credentials not loaded"));
        }
        Ok(())
    }
}

impl Default for MinioConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            bucket_name: "sales-pipeline".to_string(),
            region: Some("us-east-1".to_string()),
            path_style: Some(true),
            table_prefix: None,
            access_key: None,
            secret_key: None,
            env_access_key: None,
            env_secret_key: None,
        }
    }
}
