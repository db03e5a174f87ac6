use crate::error::PipelineError;
use crate::processor::{DEFAULT_LOW_PERFORMANCE_THRESHOLD, DEFAULT_MARKUP_FACTOR, SUPPLIER_PLACEHOLDER};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "src/configs/pipeline.toml";
pub const ENV_PREFIX: &str = "PIPELINE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub cleaning: CleaningConfig,
    pub anomaly: AnomalyConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub dir: PathBuf,
    pub products: TableSource,
    pub sales: TableSource,
}

/// One source table: its file name and a header rename map applied on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSource {
    pub file: String,
    pub rename: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Parquet,
    Minio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub dir: PathBuf,
    pub minio_config: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub markup_factor: f64,
    pub supplier_placeholder: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub threshold: usize,
    pub persist: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            products: TableSource {
                file: "products.csv".to_string(),
                rename: HashMap::new(),
            },
            sales: TableSource {
                file: "sales.csv".to_string(),
                rename: HashMap::new(),
            },
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            dir: PathBuf::from("warehouse"),
            minio_config: "src/configs/minio.toml".to_string(),
        }
    }
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            markup_factor: DEFAULT_MARKUP_FACTOR,
            supplier_placeholder: SUPPLIER_PLACEHOLDER.to_string(),
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LOW_PERFORMANCE_THRESHOLD,
            persist: true,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            retry_delay_secs: 300,
        }
    }
}

impl ScheduleConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl PipelineConfig {
    /// Loads the TOML file at `path` and layers `PIPELINE__SECTION__KEY`
    /// environment variables over it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).required(true))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read pipeline config: {}", path.display()))?;

        let config: PipelineConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse pipeline config: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(content).context("Failed to parse pipeline config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        if !self.cleaning.markup_factor.is_finite() || self.cleaning.markup_factor <= 0.0 {
            return Err(PipelineError::Config(format!(
                "cleaning.markup_factor must be a positive number, got {}",
                self.cleaning.markup_factor
            )));
        }
        if self.anomaly.threshold == 0 {
            return Err(PipelineError::Config(
                "anomaly.threshold must be at least 1".to_string(),
            ));
        }
        if self.source.products.file.trim().is_empty() || self.source.sales.file.trim().is_empty() {
            return Err(PipelineError::Config(
                "source table file names cannot be empty".to_string(),
            ));
        }
        if self.store.kind == StoreKind::Parquet && self.store.dir.as_os_str().is_empty() {
            return Err(PipelineError::Config(
                "store.dir is required for the parquet store".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.cleaning.markup_factor, 1.3);
        assert_eq!(config.cleaning.supplier_placeholder, "Não Informado");
        assert_eq!(config.anomaly.threshold, 2);
        assert_eq!(config.schedule.retries, 2);
        assert_eq!(config.schedule.retry_delay(), Duration::from_secs(300));
        assert_eq!(config.store.kind, StoreKind::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [source]
            dir = "/opt/data"

            [source.products]
            file = "produtos_loja.csv"
            rename = { ID_Produto = "id", Preco_Custo = "cost_price" }

            [store]
            kind = "parquet"
            dir = "/tmp/warehouse"

            [anomaly]
            threshold = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.source.dir, PathBuf::from("/opt/data"));
        assert_eq!(config.source.products.file, "produtos_loja.csv");
        assert_eq!(config.source.products.rename.get("ID_Produto").unwrap(), "id");
        assert_eq!(config.source.sales.file, "sales.csv");
        assert_eq!(config.store.kind, StoreKind::Parquet);
        assert_eq!(config.anomaly.threshold, 3);
        assert!(config.anomaly.persist);
        assert_eq!(config.cleaning.markup_factor, 1.3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(PipelineConfig::from_toml_str("[cleaning]\nmarkup_factor = 0.0").is_err());
        assert!(PipelineConfig::from_toml_str("[anomaly]\nthreshold = 0").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[cleaning]\nmarkup_factor = 1.5\n[schedule]\nretries = 4").unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.cleaning.markup_factor, 1.5);
        assert_eq!(config.schedule.retries, 4);
        assert_eq!(config.anomaly.threshold, 2);
    }
}
