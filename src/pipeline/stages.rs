use crate::error::{PipelineError, Result};
use crate::models::{RawProduct, RawSale, SalesReportRow};
use crate::pipeline::stage::{Artifact, Stage, StageContext, StageOutput};
use crate::processor::table_codec::{self, tables, PRODUCT_COLUMNS, SALE_COLUMNS};
use crate::processor::{AnomalyDetector, CleaningEngine, EnrichmentEngine, reporter};
use crate::source::SourceReader;
use async_trait::async_trait;
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::{info, warn};

pub const PREPARE_TABLES: &str = "prepare_tables";
pub const EXTRACT_PRODUCTS: &str = "extract_products";
pub const EXTRACT_SALES: &str = "extract_sales";
pub const TRANSFORM: &str = "transform";
pub const LOAD: &str = "load";
pub const GENERATE_REPORT: &str = "generate_report";
pub const DETECT_LOW_PERFORMANCE: &str = "detect_low_performance";

/// Reads a source table and rejects it when it has no rows.
async fn read_source(source: &dyn SourceReader, table: &str) -> Result<DataFrame> {
    let df = source.read(table).await?;
    if df.height() == 0 {
        return Err(PipelineError::EmptySource {
            table: table.to_string(),
        });
    }
    Ok(df)
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Truncates every table a run writes.
pub struct PrepareTables;

#[async_trait]
impl Stage for PrepareTables {
    fn name(&self) -> &'static str {
        PREPARE_TABLES
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput> {
        for table in tables::PERSISTED {
            ctx.store.truncate(table).await?;
        }
        info!("Truncated {} tables", tables::PERSISTED.len());
        Ok(StageOutput::new().metric("tables_truncated", tables::PERSISTED))
    }
}

pub struct ExtractProducts;

#[async_trait]
impl Stage for ExtractProducts {
    fn name(&self) -> &'static str {
        EXTRACT_PRODUCTS
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let df = read_source(ctx.source, tables::PRODUCTS).await?;
        table_codec::require_columns(&df, tables::PRODUCTS, &PRODUCT_COLUMNS)?;
        let products = table_codec::decode_raw_products(&df, tables::PRODUCTS)?;

        let categories: BTreeSet<String> = products.iter().map(|p| p.category.clone()).collect();
        let null_cost = products.iter().filter(|p| p.cost_price.is_none()).count();
        let null_supplier = products.iter().filter(|p| p.supplier.is_none()).count();
        info!(
            "Extracted {} products in {} categories ({} without cost_price, {} without supplier)",
            products.len(),
            categories.len(),
            null_cost,
            null_supplier
        );

        Ok(StageOutput::new()
            .metric("rows", products.len())
            .metric("columns", column_names(&df))
            .metric("categories", categories)
            .metric("null_cost_price", null_cost)
            .metric("null_supplier", null_supplier)
            .artifact(Artifact::RawProducts(products)))
    }
}

pub struct ExtractSales;

/// Lexicographic bounds of the raw sale dates.
fn sale_period(sales: &[RawSale]) -> Option<(&str, &str)> {
    let min = sales.iter().map(|s| s.sale_date.as_str()).min()?;
    let max = sales.iter().map(|s| s.sale_date.as_str()).max()?;
    Some((min, max))
}

#[async_trait]
impl Stage for ExtractSales {
    fn name(&self) -> &'static str {
        EXTRACT_SALES
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let df = read_source(ctx.source, tables::SALES).await?;
        table_codec::require_columns(&df, tables::SALES, &SALE_COLUMNS)?;
        let sales = table_codec::decode_raw_sales(&df, tables::SALES)?;

        let null_price = sales.iter().filter(|s| s.sale_price.is_none()).count();
        let mut output = StageOutput::new()
            .metric("rows", sales.len())
            .metric("columns", column_names(&df))
            .metric("null_sale_price", null_price);
        if let Some((start, end)) = sale_period(&sales) {
            info!("Extracted {} sales from {} to {}", sales.len(), start, end);
            output = output.metric("period_start", start).metric("period_end", end);
        }

        Ok(output.artifact(Artifact::RawSales(sales)))
    }
}

/// Cleans both tables, then enriches the sales.
pub struct Transform;

#[async_trait]
impl Stage for Transform {
    fn name(&self) -> &'static str {
        TRANSFORM
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let raw_products: Vec<RawProduct> = ctx.artifacts.raw_products(TRANSFORM)?.to_vec();
        let raw_sales: Vec<RawSale> = ctx.artifacts.raw_sales(TRANSFORM)?.to_vec();

        let cleaning = &ctx.config.cleaning;
        let engine = CleaningEngine::new(cleaning.markup_factor, cleaning.supplier_placeholder.clone());
        let cleaned = engine.clean(raw_products, raw_sales);

        let (enriched, enrichment) = EnrichmentEngine::new().enrich(&cleaned.sales, &cleaned.products)?;
        info!(
            "Transformed {} products and {} sales (total revenue {:.2})",
            cleaned.products.len(),
            enriched.len(),
            enrichment.total_revenue
        );

        let report = cleaned.report;
        let mut warnings = report.warnings;
        warnings.extend(enrichment.warnings);

        Ok(StageOutput::new()
            .metric("products_processed", report.products)
            .metric("sales_processed", enrichment.sales)
            .metric("cost_prices_filled", report.cost_prices_filled)
            .metric("category_means", &report.category_means)
            .metric("suppliers_filled", report.suppliers_filled)
            .metric("sale_prices_filled", report.sale_prices_filled)
            .metric("total_revenue", enrichment.total_revenue)
            .metric("avg_margin", enrichment.avg_margin)
            .warnings(warnings)
            .artifact(Artifact::Transformed {
                products: cleaned.products,
                sales: enriched,
            }))
    }
}

/// Writes the processed tables and checks that each one received rows.
pub struct Load;

#[async_trait]
impl Stage for Load {
    fn name(&self) -> &'static str {
        LOAD
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let products = ctx.artifacts.products(LOAD)?;
        let sales = ctx.artifacts.enriched_sales(LOAD)?;
        let report_rows: Vec<SalesReportRow> = sales.iter().map(SalesReportRow::from).collect();

        let writes = [
            (
                tables::PRODUCTS_PROCESSED,
                table_codec::products_frame(products, ctx.run_started)?,
            ),
            (
                tables::SALES_PROCESSED,
                table_codec::sales_frame(sales, ctx.run_started)?,
            ),
            (tables::SALES_REPORT, table_codec::report_frame(&report_rows)?),
        ];

        let mut output = StageOutput::new();
        for (table, df) in &writes {
            ctx.store.replace(table, df).await?;
            let count = ctx.store.count(table).await?;
            info!("Table {}: {} rows", table, count);
            if count == 0 {
                return Err(PipelineError::Validation {
                    reason: format!("table '{}' is empty after load", table),
                });
            }
            output = output.metric(table, count);
        }
        Ok(output)
    }
}

/// Computes the analytics report from the persisted `sales_report` table.
pub struct GenerateReport;

#[async_trait]
impl Stage for GenerateReport {
    fn name(&self) -> &'static str {
        GENERATE_REPORT
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let df = ctx.store.read(tables::SALES_REPORT).await?;
        let rows = table_codec::decode_report_rows(&df)?;
        if rows.is_empty() {
            warn!("Table {} has no rows; report is empty", tables::SALES_REPORT);
        }
        let report = reporter::build_report(&rows);

        Ok(StageOutput::new()
            .metric("rows", rows.len())
            .metric("categories", report.categories.len())
            .metric("channels", report.channels.len())
            .metric("leader_channel", &report.leader_channel)
            .metric(
                "top_product",
                report.top_product.as_ref().map(|p| p.name.as_str()),
            )
            .artifact(Artifact::Report(report)))
    }
}

/// Flags products with fewer sales than the configured threshold. Advisory.
pub struct DetectLowPerformance;

#[async_trait]
impl Stage for DetectLowPerformance {
    fn name(&self) -> &'static str {
        DETECT_LOW_PERFORMANCE
    }

    fn advisory(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let products = table_codec::decode_products(&ctx.store.read(tables::PRODUCTS_PROCESSED).await?)?;
        let sales = table_codec::decode_stored_sales(&ctx.store.read(tables::SALES_PROCESSED).await?)?;

        let anomaly = &ctx.config.anomaly;
        let flagged = AnomalyDetector::new(anomaly.threshold).detect(&products, &sales);

        let persisted = anomaly.persist && !flagged.is_empty();
        if persisted {
            let df = table_codec::low_performance_frame(&flagged, ctx.run_started)?;
            ctx.store.replace(tables::LOW_PERFORMANCE, &df).await?;
            info!(
                "Stored {} low-performance products in {}",
                flagged.len(),
                tables::LOW_PERFORMANCE
            );
        } else if anomaly.persist {
            // Report-only runs skip prepare_tables; drop flags from an earlier run.
            ctx.store.truncate(tables::LOW_PERFORMANCE).await?;
        }

        Ok(StageOutput::new()
            .metric("threshold", anomaly.threshold)
            .metric("products_analyzed", products.len())
            .metric("flagged", flagged.len())
            .metric("persisted", persisted)
            .artifact(Artifact::LowPerformance(flagged)))
    }
}
