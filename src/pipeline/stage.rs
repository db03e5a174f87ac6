use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::{
    AnalyticsReport, DataQualityWarning, EnrichedSale, LowPerformanceProduct, Product, RawProduct,
    RawSale,
};
use crate::source::SourceReader;
use crate::storage::TableStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Data handed from one stage to the stages that depend on it.
#[derive(Debug, Clone)]
pub enum Artifact {
    RawProducts(Vec<RawProduct>),
    RawSales(Vec<RawSale>),
    Transformed {
        products: Vec<Product>,
        sales: Vec<EnrichedSale>,
    },
    Report(AnalyticsReport),
    LowPerformance(Vec<LowPerformanceProduct>),
}

/// Artifacts produced so far in a run.
#[derive(Debug, Default)]
pub struct Artifacts {
    raw_products: Option<Vec<RawProduct>>,
    raw_sales: Option<Vec<RawSale>>,
    products: Option<Vec<Product>>,
    enriched_sales: Option<Vec<EnrichedSale>>,
    report: Option<AnalyticsReport>,
    low_performance: Option<Vec<LowPerformanceProduct>>,
}

fn missing(stage: &str, artifact: &str) -> PipelineError {
    PipelineError::MissingArtifact {
        stage: stage.to_string(),
        artifact: artifact.to_string(),
    }
}

impl Artifacts {
    pub fn absorb(&mut self, artifact: Artifact) {
        match artifact {
            Artifact::RawProducts(p) => self.raw_products = Some(p),
            Artifact::RawSales(s) => self.raw_sales = Some(s),
            Artifact::Transformed { products, sales } => {
                self.products = Some(products);
                self.enriched_sales = Some(sales);
            }
            Artifact::Report(r) => self.report = Some(r),
            Artifact::LowPerformance(l) => self.low_performance = Some(l),
        }
    }

    pub fn raw_products(&self, stage: &str) -> Result<&[RawProduct]> {
        self.raw_products
            .as_deref()
            .ok_or_else(|| missing(stage, "raw_products"))
    }

    pub fn raw_sales(&self, stage: &str) -> Result<&[RawSale]> {
        self.raw_sales
            .as_deref()
            .ok_or_else(|| missing(stage, "raw_sales"))
    }

    pub fn products(&self, stage: &str) -> Result<&[Product]> {
        self.products
            .as_deref()
            .ok_or_else(|| missing(stage, "products"))
    }

    pub fn enriched_sales(&self, stage: &str) -> Result<&[EnrichedSale]> {
        self.enriched_sales
            .as_deref()
            .ok_or_else(|| missing(stage, "enriched_sales"))
    }

    pub fn take_report(&mut self) -> Option<AnalyticsReport> {
        self.report.take()
    }

    pub fn take_low_performance(&mut self) -> Option<Vec<LowPerformanceProduct>> {
        self.low_performance.take()
    }
}

/// What a stage sees while it runs.
pub struct StageContext<'a> {
    pub run_started: DateTime<Utc>,
    pub config: &'a PipelineConfig,
    pub source: &'a dyn SourceReader,
    pub store: &'a dyn TableStore,
    pub artifacts: &'a Artifacts,
}

/// Structured result of a successful stage.
#[derive(Debug, Default)]
pub struct StageOutput {
    pub metrics: BTreeMap<String, Value>,
    pub warnings: Vec<DataQualityWarning>,
    pub artifact: Option<Artifact>,
}

impl StageOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metric(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.metrics.insert(key.to_string(), value);
        self
    }

    pub fn warnings(mut self, warnings: Vec<DataQualityWarning>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = Some(artifact);
        self
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Advisory stages are logged and recorded on failure but do not fail the run.
    fn advisory(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput>;
}
