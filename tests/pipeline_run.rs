use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use regex::Regex;
use sales_pipeline::PipelineError;
use sales_pipeline::config::PipelineConfig;
use sales_pipeline::models::DataQualityWarning;
use sales_pipeline::pipeline::stages::{
    DETECT_LOW_PERFORMANCE, EXTRACT_PRODUCTS, EXTRACT_SALES, GENERATE_REPORT, LOAD, TRANSFORM,
};
use sales_pipeline::pipeline::{PipelineRunner, RunStatus, StageStatus};
use sales_pipeline::processor::table_codec::{self, tables};
use sales_pipeline::source::MemorySource;
use sales_pipeline::storage::{MemoryStore, ParquetStore, TableStore};
use std::sync::Arc;

fn source(products: DataFrame, sales: DataFrame) -> Arc<MemorySource> {
    Arc::new(
        MemorySource::new()
            .with_table(tables::PRODUCTS, products)
            .with_table(tables::SALES, sales),
    )
}

/// Two products in one category, one of them without a cost; one sale without a price.
fn example_source() -> Arc<MemorySource> {
    let products = df!(
        "id" => ["P1", "P2"],
        "name" => ["Caneta", "Lápis"],
        "category" => ["A", "A"],
        "cost_price" => [Some("10.00"), None],
        "supplier" => [Some("Papelaria Central"), None],
        "status" => ["Ativo", "Ativo"]
    )
    .unwrap();
    let sales = df!(
        "id" => ["S1"],
        "product_id" => ["P1"],
        "quantity" => ["2"],
        "sale_price" => [None::<&str>],
        "sale_date" => ["2024-01-05"],
        "channel" => ["Online"]
    )
    .unwrap();
    source(products, sales)
}

fn catalog_source() -> Arc<MemorySource> {
    let products = df!(
        "id" => ["P1", "P2", "P3", "P4", "P5"],
        "name" => ["Notebook", "Mouse", "Cadeira", "Mesa", "Luminária"],
        "category" => ["Eletrônicos", "Eletrônicos", "Móveis", "Móveis", "Casa"],
        "cost_price" => [Some("10.10"), Some("20.30"), Some("100.00"), None, Some("abc")],
        "supplier" => [Some("TechDist"), None, Some("OfficeMax"), Some("OfficeMax"), None],
        "status" => ["Ativo", "Ativo", "Ativo", "Inativo", "Ativo"]
    )
    .unwrap();
    let sales = df!(
        "id" => ["S1", "S2", "S3", "S4", "S5", "S6"],
        "product_id" => ["P1", "P1", "P2", "P3", "P4", "P1"],
        "quantity" => ["1", "3", "2", "1", "2.0", "4"],
        "sale_price" => [Some("15.00"), Some("14.50"), Some("25.99"), Some("150.00"), None, Some("13.90")],
        "sale_date" => ["2024-01-05", "05/02/2024", "2024-02-09T10:15:00", "20240301", "2024/03/12", "31-03-2024"],
        "channel" => ["Online", "Loja Física", "Online", "Marketplace", "Online", "Online"]
    )
    .unwrap();
    source(products, sales)
}

#[tokio::test]
async fn test_end_to_end_example() {
    let store = Arc::new(MemoryStore::new());
    let runner =
        PipelineRunner::new(PipelineConfig::default(), example_source(), store.clone()).unwrap();

    let summary = runner.run().await.unwrap();
    assert_eq!(summary.status, RunStatus::Succeeded);
    assert!(summary.warnings.is_empty());
    assert!(summary.stages.iter().all(|s| s.is_succeeded()));

    let products =
        table_codec::decode_products(&store.read(tables::PRODUCTS_PROCESSED).await.unwrap())
            .unwrap();
    let p2 = products.iter().find(|p| p.id == "P2").unwrap();
    assert_eq!(p2.cost_price, Some(10.0));
    assert_eq!(p2.supplier.as_deref(), Some("Não Informado"));

    let sales =
        table_codec::decode_stored_sales(&store.read(tables::SALES_PROCESSED).await.unwrap())
            .unwrap();
    assert_eq!(sales.len(), 1);
    let s1 = &sales[0];
    assert_eq!(s1.sale_price, Some(13.0));
    assert_eq!(s1.revenue_total, Some(26.0));
    assert_eq!(s1.margin, Some(3.0));
    assert_eq!(s1.sale_month, "2024-01");
    assert_eq!(s1.sale_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());

    let flagged = summary.low_performance.as_ref().unwrap();
    let flagged: Vec<(&str, usize)> = flagged
        .iter()
        .map(|p| (p.product_id.as_str(), p.sale_count))
        .collect();
    assert_eq!(flagged, vec![("P2", 0), ("P1", 1)]);
    assert_eq!(store.count(tables::LOW_PERFORMANCE).await.unwrap(), 2);

    let report = summary.report.as_ref().unwrap();
    let top = report.top_product.as_ref().unwrap();
    assert_eq!(top.name, "Caneta");
    assert_eq!(top.total_quantity, 2);
    assert_eq!(report.leader_channel.as_deref(), Some("Online"));
    assert_eq!(report.overall.sale_count, 1);
    assert_eq!(report.overall.total_revenue, 26.0);
    assert_eq!(report.overall.avg_margin, Some(3.0));

    let load = summary.stage(LOAD).unwrap();
    assert_eq!(load.metrics[tables::SALES_REPORT], serde_json::json!(1));
}

#[tokio::test]
async fn test_category_without_known_cost_keeps_nulls() {
    let products = df!(
        "id" => ["P1", "P3"],
        "name" => ["Caneta", "Grampeador"],
        "category" => ["A", "B"],
        "cost_price" => [Some("10.00"), None],
        "supplier" => [Some("Acme"), Some("Acme")],
        "status" => ["Ativo", "Ativo"]
    )
    .unwrap();
    let sales = df!(
        "id" => ["S1", "S2"],
        "product_id" => ["P1", "P3"],
        "quantity" => ["1", "1"],
        "sale_price" => [Some("12.00"), None],
        "sale_date" => ["2024-01-05", "2024-01-06"],
        "channel" => ["Online", "Online"]
    )
    .unwrap();
    let store = Arc::new(MemoryStore::new());
    let runner =
        PipelineRunner::new(PipelineConfig::default(), source(products, sales), store.clone())
            .unwrap();

    let summary = runner.run().await.unwrap();
    assert_eq!(summary.status, RunStatus::Succeeded);
    assert!(summary.warnings.contains(&DataQualityWarning::UnresolvedCostPrice {
        category: "B".to_string(),
        product_ids: vec!["P3".to_string()],
    }));
    assert!(summary.warnings.contains(&DataQualityWarning::UnresolvedSalePrice {
        sale_id: "S2".to_string(),
        product_id: "P3".to_string(),
    }));
    assert_eq!(summary.stage(TRANSFORM).unwrap().warnings.len(), 2);

    let products =
        table_codec::decode_products(&store.read(tables::PRODUCTS_PROCESSED).await.unwrap())
            .unwrap();
    assert_eq!(products.iter().find(|p| p.id == "P3").unwrap().cost_price, None);

    let sales =
        table_codec::decode_stored_sales(&store.read(tables::SALES_PROCESSED).await.unwrap())
            .unwrap();
    let s2 = sales.iter().find(|s| s.sale_id == "S2").unwrap();
    assert_eq!(s2.sale_price, None);
    assert_eq!(s2.revenue_total, None);
    assert_eq!(s2.margin, None);
}

#[tokio::test]
async fn test_parquet_round_trip_matches_memory() {
    let dir = tempfile::tempdir().unwrap();
    let parquet = Arc::new(ParquetStore::new(dir.path()));
    let memory = Arc::new(MemoryStore::new());

    PipelineRunner::new(PipelineConfig::default(), catalog_source(), parquet.clone())
        .unwrap()
        .run()
        .await
        .unwrap();
    PipelineRunner::new(PipelineConfig::default(), catalog_source(), memory.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    let from_disk =
        table_codec::decode_stored_sales(&parquet.read(tables::SALES_PROCESSED).await.unwrap())
            .unwrap();
    let in_memory =
        table_codec::decode_stored_sales(&memory.read(tables::SALES_PROCESSED).await.unwrap())
            .unwrap();
    assert_eq!(from_disk, in_memory);

    let products =
        table_codec::decode_products(&parquet.read(tables::PRODUCTS_PROCESSED).await.unwrap())
            .unwrap();
    let mouse = products.iter().find(|p| p.id == "P2").unwrap();
    assert_eq!(mouse.cost_price, Some(20.3));
    // Móveis has one known cost, so the mean is that cost.
    assert_eq!(products.iter().find(|p| p.id == "P4").unwrap().cost_price, Some(100.0));

    let s5 = from_disk.iter().find(|s| s.sale_id == "S5").unwrap();
    assert_eq!(s5.sale_price, Some(130.0));
    assert_eq!(s5.revenue_total, Some(260.0));
    assert_eq!(s5.margin, Some(30.0));
    for sale in &from_disk {
        let expected = sale.sale_price.map(|p| (f64::from(sale.quantity) * p * 100.0).round() / 100.0);
        assert_eq!(sale.revenue_total, expected);
    }

    // A rerun overwrites instead of accumulating.
    PipelineRunner::new(PipelineConfig::default(), catalog_source(), parquet.clone())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(parquet.count(tables::SALES_PROCESSED).await.unwrap(), 6);
    assert_eq!(parquet.count(tables::PRODUCTS_PROCESSED).await.unwrap(), 5);
}

#[tokio::test]
async fn test_sale_month_follows_sale_date() {
    let store = Arc::new(MemoryStore::new());
    PipelineRunner::new(PipelineConfig::default(), catalog_source(), store.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    let pattern = Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").unwrap();
    let sales =
        table_codec::decode_stored_sales(&store.read(tables::SALES_PROCESSED).await.unwrap())
            .unwrap();
    for sale in &sales {
        assert!(pattern.is_match(&sale.sale_month), "{}", sale.sale_month);
        assert_eq!(
            sale.sale_month,
            format!("{:04}-{:02}", sale.sale_date.year(), sale.sale_date.month())
        );
    }
    let s2 = sales.iter().find(|s| s.sale_id == "S2").unwrap();
    assert_eq!(s2.sale_date, NaiveDate::from_ymd_opt(2024, 2, 5).unwrap());
    let s6 = sales.iter().find(|s| s.sale_id == "S6").unwrap();
    assert_eq!(s6.sale_month, "2024-03");
}

#[tokio::test]
async fn test_unresolvable_cost_is_not_zero() {
    let store = Arc::new(MemoryStore::new());
    let summary = PipelineRunner::new(PipelineConfig::default(), catalog_source(), store.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    // "abc" is coerced to null and Casa has no other product.
    let products =
        table_codec::decode_products(&store.read(tables::PRODUCTS_PROCESSED).await.unwrap())
            .unwrap();
    assert_eq!(products.iter().find(|p| p.id == "P5").unwrap().cost_price, None);
    assert!(summary.warnings.contains(&DataQualityWarning::UnresolvedCostPrice {
        category: "Casa".to_string(),
        product_ids: vec!["P5".to_string()],
    }));
}

#[tokio::test]
async fn test_empty_source_fails_run() {
    let products = df!(
        "id" => Vec::<&str>::new(),
        "name" => Vec::<&str>::new(),
        "category" => Vec::<&str>::new(),
        "cost_price" => Vec::<&str>::new(),
        "supplier" => Vec::<&str>::new(),
        "status" => Vec::<&str>::new()
    )
    .unwrap();
    let sales = df!(
        "id" => ["S1"],
        "product_id" => ["P1"],
        "quantity" => ["1"],
        "sale_price" => ["1.00"],
        "sale_date" => ["2024-01-05"],
        "channel" => ["Online"]
    )
    .unwrap();
    let runner = PipelineRunner::new(
        PipelineConfig::default(),
        source(products, sales),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();

    let failure = runner.run().await.unwrap_err();
    assert_eq!(failure.stage, EXTRACT_PRODUCTS);
    assert!(matches!(
        failure.source,
        PipelineError::EmptySource { ref table } if table == tables::PRODUCTS
    ));
    assert!(failure.summary.stage(EXTRACT_SALES).unwrap().is_succeeded());
    assert_eq!(
        failure.summary.stage(TRANSFORM).unwrap().status,
        StageStatus::Skipped
    );
}

#[tokio::test]
async fn test_missing_column_is_schema_error() {
    let products = df!(
        "id" => ["P1"],
        "name" => ["Caneta"],
        "category" => ["A"],
        "supplier" => ["Acme"],
        "status" => ["Ativo"]
    )
    .unwrap();
    let sales = df!(
        "id" => ["S1"],
        "product_id" => ["P1"],
        "quantity" => ["1"],
        "sale_price" => ["1.00"],
        "sale_date" => ["2024-01-05"],
        "channel" => ["Online"]
    )
    .unwrap();
    let failure = PipelineRunner::new(
        PipelineConfig::default(),
        source(products, sales),
        Arc::new(MemoryStore::new()),
    )
    .unwrap()
    .run()
    .await
    .unwrap_err();

    assert!(matches!(
        failure.source,
        PipelineError::Schema { ref column, .. } if column == "cost_price"
    ));
}

#[tokio::test]
async fn test_unparsable_date_fails_before_load() {
    let products = df!(
        "id" => ["P1"],
        "name" => ["Caneta"],
        "category" => ["A"],
        "cost_price" => ["1.00"],
        "supplier" => ["Acme"],
        "status" => ["Ativo"]
    )
    .unwrap();
    let sales = df!(
        "id" => ["S1"],
        "product_id" => ["P1"],
        "quantity" => ["1"],
        "sale_price" => ["2.00"],
        "sale_date" => ["sometime in spring"],
        "channel" => ["Online"]
    )
    .unwrap();
    let store = Arc::new(MemoryStore::new());
    let failure =
        PipelineRunner::new(PipelineConfig::default(), source(products, sales), store.clone())
            .unwrap()
            .run()
            .await
            .unwrap_err();

    assert_eq!(failure.stage, TRANSFORM);
    assert!(matches!(
        failure.source,
        PipelineError::DateParse { ref sale_id, .. } if sale_id == "S1"
    ));
    assert_eq!(store.count(tables::SALES_PROCESSED).await.unwrap(), 0);
}

#[tokio::test]
async fn test_non_numeric_quantity_is_type_conversion_error() {
    let products = df!(
        "id" => ["P1"],
        "name" => ["Caneta"],
        "category" => ["A"],
        "cost_price" => ["1.00"],
        "supplier" => ["Acme"],
        "status" => ["Ativo"]
    )
    .unwrap();
    let sales = df!(
        "id" => ["S1"],
        "product_id" => ["P1"],
        "quantity" => ["dois"],
        "sale_price" => ["2.00"],
        "sale_date" => ["2024-01-05"],
        "channel" => ["Online"]
    )
    .unwrap();
    let failure = PipelineRunner::new(
        PipelineConfig::default(),
        source(products, sales),
        Arc::new(MemoryStore::new()),
    )
    .unwrap()
    .run()
    .await
    .unwrap_err();

    assert_eq!(failure.stage, EXTRACT_SALES);
    assert!(matches!(failure.source, PipelineError::TypeConversion { .. }));
}

#[tokio::test]
async fn test_threshold_is_configurable() {
    let mut config = PipelineConfig::default();
    config.anomaly.threshold = 1;
    let summary = PipelineRunner::new(config, example_source(), Arc::new(MemoryStore::new()))
        .unwrap()
        .run()
        .await
        .unwrap();

    let flagged = summary.low_performance.unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].product_id, "P2");
    assert_eq!(flagged[0].total_quantity, 0);
}

#[tokio::test]
async fn test_revenue_uses_price_in_cents() {
    let products = df!(
        "id" => ["P1"],
        "name" => ["Caneta"],
        "category" => ["A"],
        "cost_price" => ["10.00"],
        "supplier" => ["Acme"],
        "status" => ["Ativo"]
    )
    .unwrap();
    let sales = df!(
        "id" => ["S1"],
        "product_id" => ["P1"],
        "quantity" => ["3"],
        "sale_price" => ["19.995"],
        "sale_date" => ["2024-01-05"],
        "channel" => ["Online"]
    )
    .unwrap();
    let store = Arc::new(MemoryStore::new());
    let summary =
        PipelineRunner::new(PipelineConfig::default(), source(products, sales), store.clone())
            .unwrap()
            .run()
            .await
            .unwrap();

    let sales =
        table_codec::decode_stored_sales(&store.read(tables::SALES_PROCESSED).await.unwrap())
            .unwrap();
    let s1 = &sales[0];
    assert_eq!(s1.sale_price, Some(20.0));
    assert_eq!(s1.revenue_total, Some(60.0));
    assert_eq!(
        s1.revenue_total,
        s1.sale_price.map(|p| f64::from(s1.quantity) * p)
    );
    assert_eq!(s1.margin, Some(10.0));
    assert_eq!(summary.report.unwrap().overall.total_revenue, 60.0);
}

#[tokio::test]
async fn test_blank_sale_date_is_date_parse_error() {
    let products = df!(
        "id" => ["P1"],
        "name" => ["Caneta"],
        "category" => ["A"],
        "cost_price" => ["1.00"],
        "supplier" => ["Acme"],
        "status" => ["Ativo"]
    )
    .unwrap();
    let sales = df!(
        "id" => ["S1", "S2"],
        "product_id" => ["P1", "P1"],
        "quantity" => ["1", "1"],
        "sale_price" => ["2.00", "2.00"],
        "sale_date" => [Some("2024-01-05"), None],
        "channel" => ["Online", "Online"]
    )
    .unwrap();
    let failure = PipelineRunner::new(
        PipelineConfig::default(),
        source(products, sales),
        Arc::new(MemoryStore::new()),
    )
    .unwrap()
    .run()
    .await
    .unwrap_err();

    assert_eq!(failure.stage, TRANSFORM);
    assert!(matches!(
        failure.source,
        PipelineError::DateParse { ref sale_id, ref value } if sale_id == "S2" && value.is_empty()
    ));
    assert!(failure.summary.stage(EXTRACT_SALES).unwrap().is_succeeded());
}

/// Store that loses every row written to `sales_report`.
struct EmptyReportTable {
    inner: MemoryStore,
}

#[async_trait]
impl TableStore for EmptyReportTable {
    async fn truncate(&self, table: &str) -> sales_pipeline::Result<()> {
        self.inner.truncate(table).await
    }

    async fn append(&self, table: &str, df: &DataFrame) -> sales_pipeline::Result<()> {
        self.inner.append(table, df).await
    }

    async fn read(&self, table: &str) -> sales_pipeline::Result<DataFrame> {
        self.inner.read(table).await
    }

    async fn count(&self, table: &str) -> sales_pipeline::Result<usize> {
        if table == tables::SALES_REPORT {
            return Ok(0);
        }
        self.inner.count(table).await
    }
}

#[tokio::test]
async fn test_empty_table_after_load_fails_validation() {
    let store = Arc::new(EmptyReportTable {
        inner: MemoryStore::new(),
    });
    let failure = PipelineRunner::new(PipelineConfig::default(), example_source(), store)
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert_eq!(failure.stage, LOAD);
    assert!(matches!(
        failure.source,
        PipelineError::Validation { ref reason } if reason.contains(tables::SALES_REPORT)
    ));
    let summary = failure.summary;
    assert_eq!(summary.status, RunStatus::Failed);
    assert!(matches!(
        summary.stage(LOAD).unwrap().status,
        StageStatus::Failed { ref kind, .. } if kind == "validation"
    ));
    for name in [GENERATE_REPORT, DETECT_LOW_PERFORMANCE] {
        assert_eq!(summary.stage(name).unwrap().status, StageStatus::Skipped);
    }
    assert!(summary.report.is_none());
}

/// Store whose `products_processed` cannot be read back.
struct UnreadableProducts {
    inner: MemoryStore,
}

#[async_trait]
impl TableStore for UnreadableProducts {
    async fn truncate(&self, table: &str) -> sales_pipeline::Result<()> {
        self.inner.truncate(table).await
    }

    async fn append(&self, table: &str, df: &DataFrame) -> sales_pipeline::Result<()> {
        self.inner.append(table, df).await
    }

    async fn read(&self, table: &str) -> sales_pipeline::Result<DataFrame> {
        if table == tables::PRODUCTS_PROCESSED {
            return Err(PipelineError::storage(table, "connection reset"));
        }
        self.inner.read(table).await
    }

    async fn count(&self, table: &str) -> sales_pipeline::Result<usize> {
        self.inner.count(table).await
    }
}

#[tokio::test]
async fn test_anomaly_failure_is_advisory() {
    let store = Arc::new(UnreadableProducts {
        inner: MemoryStore::new(),
    });
    let summary = PipelineRunner::new(PipelineConfig::default(), example_source(), store)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::SucceededWithErrors);
    assert!(summary.stage(GENERATE_REPORT).unwrap().is_succeeded());
    let anomaly = summary.stage(DETECT_LOW_PERFORMANCE).unwrap();
    assert!(anomaly.advisory);
    assert!(matches!(
        anomaly.status,
        StageStatus::Failed { ref kind, .. } if kind == "storage"
    ));
    assert!(summary.report.is_some());
    assert!(summary.low_performance.is_none());
}

#[tokio::test]
async fn test_report_only_reads_previous_run() {
    let store = Arc::new(MemoryStore::new());
    PipelineRunner::new(PipelineConfig::default(), example_source(), store.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    let summary = PipelineRunner::report_only(PipelineConfig::default(), store.clone())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(summary.stages.len(), 2);
    assert_eq!(summary.report.unwrap().overall.total_revenue, 26.0);

    let stored =
        table_codec::decode_low_performance(&store.read(tables::LOW_PERFORMANCE).await.unwrap())
            .unwrap();
    assert_eq!(stored.len(), 2);
}
