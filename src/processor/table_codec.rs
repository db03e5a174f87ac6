//! Conversion between polars frames and the typed row records.
//!
//! Source frames are decoded leniently as text (every column is cast to
//! `String` first) so the cleaning rules decide what a malformed value means.
//! Persisted frames follow the table schemas of the store: money columns are
//! rounded to cents, dates are `Date`, run timestamps are UTC `Datetime`.

use crate::error::{PipelineError, Result};
use crate::models::{
    EnrichedSale, LowPerformanceProduct, Product, RawProduct, RawSale, SalesReportRow, StoredSale,
};
use crate::processor::numeric::{parse_quantity, round_cents};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use polars::prelude::*;
use std::collections::HashSet;

pub mod tables {
    pub const PRODUCTS: &str = "products";
    pub const SALES: &str = "sales";
    pub const PRODUCTS_PROCESSED: &str = "products_processed";
    pub const SALES_PROCESSED: &str = "sales_processed";
    pub const SALES_REPORT: &str = "sales_report";
    pub const LOW_PERFORMANCE: &str = "low_performance_products";

    pub const PERSISTED: [&str; 4] = [PRODUCTS_PROCESSED, SALES_PROCESSED, SALES_REPORT, LOW_PERFORMANCE];
}

pub const PRODUCT_COLUMNS: [&str; 6] = ["id", "name", "category", "cost_price", "supplier", "status"];
pub const SALE_COLUMNS: [&str; 6] = ["id", "product_id", "quantity", "sale_price", "sale_date", "channel"];

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn require_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<()> {
    for column in columns {
        if df.column(column).is_err() {
            return Err(PipelineError::schema(table, column));
        }
    }
    Ok(())
}

/// Reads a column as trimmed text; empty strings become `None`.
pub fn text_column(df: &DataFrame, column: &str) -> Result<Vec<Option<String>>> {
    let casted = df.column(column)?.cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect();
    Ok(values)
}

fn f64_column(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>> {
    let casted = df.column(column)?.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

fn i64_column(df: &DataFrame, column: &str) -> Result<Vec<Option<i64>>> {
    let casted = df.column(column)?.cast(&DataType::Int64)?;
    Ok(casted.i64()?.into_iter().collect())
}

fn date_column(df: &DataFrame, column: &str) -> Result<Vec<Option<NaiveDate>>> {
    let casted = df.column(column)?.cast(&DataType::Int32)?;
    Ok(casted
        .i32()?
        .into_iter()
        .map(|days| days.and_then(|d| NaiveDate::from_num_days_from_ce_opt(d + UNIX_EPOCH_DAYS_FROM_CE)))
        .collect())
}

fn required(table: &str, column: &str, row: usize, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| PipelineError::MissingValue {
        table: table.to_string(),
        column: column.to_string(),
        row,
    })
}

fn required_value<T>(table: &str, column: &str, row: usize, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| PipelineError::MissingValue {
        table: table.to_string(),
        column: column.to_string(),
        row,
    })
}

fn quantity_from(table: &str, row: usize, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| PipelineError::TypeConversion {
        table: table.to_string(),
        column: "quantity".to_string(),
        row,
        value: value.to_string(),
        reason: "quantity must be a non-negative integer".to_string(),
    })
}

/// Decodes a source product frame. Product ids must be unique.
pub fn decode_raw_products(df: &DataFrame, table: &str) -> Result<Vec<RawProduct>> {
    require_columns(df, table, &PRODUCT_COLUMNS)?;
    let ids = text_column(df, "id")?;
    let names = text_column(df, "name")?;
    let categories = text_column(df, "category")?;
    let costs = text_column(df, "cost_price")?;
    let suppliers = text_column(df, "supplier")?;
    let statuses = text_column(df, "status")?;

    let mut seen = HashSet::new();
    let mut products = Vec::with_capacity(df.height());
    for (row, (((((id, name), category), cost_price), supplier), status)) in ids
        .into_iter()
        .zip(names)
        .zip(categories)
        .zip(costs)
        .zip(suppliers)
        .zip(statuses)
        .enumerate()
    {
        let id = required(table, "id", row, id)?;
        if !seen.insert(id.clone()) {
            return Err(PipelineError::DuplicateKey {
                table: table.to_string(),
                key: id,
            });
        }
        products.push(RawProduct {
            id,
            name: required(table, "name", row, name)?,
            category: required(table, "category", row, category)?,
            cost_price,
            supplier,
            status: required(table, "status", row, status)?,
        });
    }
    Ok(products)
}

/// Decodes a source sale frame. A non-numeric or negative quantity is fatal.
pub fn decode_raw_sales(df: &DataFrame, table: &str) -> Result<Vec<RawSale>> {
    require_columns(df, table, &SALE_COLUMNS)?;
    let ids = text_column(df, "id")?;
    let product_ids = text_column(df, "product_id")?;
    let quantities = text_column(df, "quantity")?;
    let prices = text_column(df, "sale_price")?;
    let dates = text_column(df, "sale_date")?;
    let channels = text_column(df, "channel")?;

    let mut sales = Vec::with_capacity(df.height());
    for (row, (((((id, product_id), quantity), sale_price), sale_date), channel)) in ids
        .into_iter()
        .zip(product_ids)
        .zip(quantities)
        .zip(prices)
        .zip(dates)
        .zip(channels)
        .enumerate()
    {
        let quantity_text = required(table, "quantity", row, quantity)?;
        let quantity =
            parse_quantity(&quantity_text).map_err(|reason| PipelineError::TypeConversion {
                table: table.to_string(),
                column: "quantity".to_string(),
                row,
                value: quantity_text.clone(),
                reason,
            })?;

        sales.push(RawSale {
            id: required(table, "id", row, id)?,
            product_id: required(table, "product_id", row, product_id)?,
            quantity,
            sale_price,
            // A blank date is left for the date parser to reject.
            sale_date: sale_date.unwrap_or_default(),
            channel: required(table, "channel", row, channel)?,
        });
    }
    Ok(sales)
}

fn money(values: impl Iterator<Item = Option<f64>>) -> Vec<Option<f64>> {
    values.map(|v| v.map(round_cents)).collect()
}

fn timestamp_column(name: &str, at: DateTime<Utc>, len: usize) -> Result<Column> {
    let series = Series::new(name.into(), vec![at.timestamp_millis(); len])
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    Ok(series.into())
}

fn date_series(name: &str, dates: impl Iterator<Item = NaiveDate>) -> Result<Column> {
    let days: Vec<i32> = dates
        .map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
        .collect();
    Ok(Series::new(name.into(), days).cast(&DataType::Date)?.into())
}

/// `products_processed` frame.
pub fn products_frame(products: &[Product], processed_at: DateTime<Utc>) -> Result<DataFrame> {
    let columns: Vec<Column> = vec![
        Series::new("id".into(), products.iter().map(|p| p.id.clone()).collect::<Vec<_>>()).into(),
        Series::new("name".into(), products.iter().map(|p| p.name.clone()).collect::<Vec<_>>()).into(),
        Series::new(
            "category".into(),
            products.iter().map(|p| p.category.clone()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new("cost_price".into(), money(products.iter().map(|p| p.cost_price))).into(),
        Series::new(
            "supplier".into(),
            products.iter().map(|p| p.supplier.clone()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "status".into(),
            products.iter().map(|p| p.status.clone()).collect::<Vec<_>>(),
        )
        .into(),
        timestamp_column("processed_at", processed_at, products.len())?,
    ];
    Ok(DataFrame::new(columns)?)
}

/// `sales_processed` frame. The product cost price is not part of it.
pub fn sales_frame(sales: &[EnrichedSale], processed_at: DateTime<Utc>) -> Result<DataFrame> {
    let columns: Vec<Column> = vec![
        Series::new("sale_id".into(), sales.iter().map(|s| s.sale_id.clone()).collect::<Vec<_>>()).into(),
        Series::new(
            "product_id".into(),
            sales.iter().map(|s| s.product_id.clone()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "quantity".into(),
            sales.iter().map(|s| i64::from(s.quantity)).collect::<Vec<_>>(),
        )
        .into(),
        Series::new("sale_price".into(), money(sales.iter().map(|s| s.sale_price))).into(),
        date_series("sale_date", sales.iter().map(|s| s.sale_date))?,
        Series::new("channel".into(), sales.iter().map(|s| s.channel.clone()).collect::<Vec<_>>()).into(),
        Series::new("revenue_total".into(), money(sales.iter().map(|s| s.revenue_total))).into(),
        Series::new("margin".into(), money(sales.iter().map(|s| s.margin))).into(),
        Series::new(
            "sale_month".into(),
            sales.iter().map(|s| s.sale_month.clone()).collect::<Vec<_>>(),
        )
        .into(),
        timestamp_column("processed_at", processed_at, sales.len())?,
    ];
    Ok(DataFrame::new(columns)?)
}

/// `sales_report` frame.
pub fn report_frame(rows: &[SalesReportRow]) -> Result<DataFrame> {
    let columns: Vec<Column> = vec![
        Series::new("sale_id".into(), rows.iter().map(|r| r.sale_id.clone()).collect::<Vec<_>>()).into(),
        Series::new(
            "product_name".into(),
            rows.iter().map(|r| r.product_name.clone()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "category".into(),
            rows.iter().map(|r| r.category.clone()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "quantity".into(),
            rows.iter().map(|r| i64::from(r.quantity)).collect::<Vec<_>>(),
        )
        .into(),
        Series::new("revenue_total".into(), money(rows.iter().map(|r| r.revenue_total))).into(),
        Series::new("margin".into(), money(rows.iter().map(|r| r.margin))).into(),
        Series::new("channel".into(), rows.iter().map(|r| r.channel.clone()).collect::<Vec<_>>()).into(),
        Series::new(
            "sale_month".into(),
            rows.iter().map(|r| r.sale_month.clone()).collect::<Vec<_>>(),
        )
        .into(),
    ];
    Ok(DataFrame::new(columns)?)
}

/// `low_performance_products` frame.
pub fn low_performance_frame(
    products: &[LowPerformanceProduct],
    analyzed_at: DateTime<Utc>,
) -> Result<DataFrame> {
    let columns: Vec<Column> = vec![
        Series::new(
            "product_id".into(),
            products.iter().map(|p| p.product_id.clone()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new("name".into(), products.iter().map(|p| p.name.clone()).collect::<Vec<_>>()).into(),
        Series::new(
            "category".into(),
            products.iter().map(|p| p.category.clone()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new("cost_price".into(), money(products.iter().map(|p| p.cost_price))).into(),
        Series::new(
            "status".into(),
            products.iter().map(|p| p.status.clone()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "sale_count".into(),
            products.iter().map(|p| p.sale_count as i64).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "total_quantity".into(),
            products.iter().map(|p| p.total_quantity as i64).collect::<Vec<_>>(),
        )
        .into(),
        timestamp_column("analyzed_at", analyzed_at, products.len())?,
    ];
    Ok(DataFrame::new(columns)?)
}

/// Decodes `products_processed`.
pub fn decode_products(df: &DataFrame) -> Result<Vec<Product>> {
    let table = tables::PRODUCTS_PROCESSED;
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    require_columns(df, table, &PRODUCT_COLUMNS)?;
    let ids = text_column(df, "id")?;
    let names = text_column(df, "name")?;
    let categories = text_column(df, "category")?;
    let costs = f64_column(df, "cost_price")?;
    let suppliers = text_column(df, "supplier")?;
    let statuses = text_column(df, "status")?;

    ids.into_iter()
        .zip(names)
        .zip(categories)
        .zip(costs)
        .zip(suppliers)
        .zip(statuses)
        .enumerate()
        .map(|(row, (((((id, name), category), cost_price), supplier), status))| {
            Ok(Product {
                id: required(table, "id", row, id)?,
                name: required(table, "name", row, name)?,
                category: required(table, "category", row, category)?,
                cost_price,
                supplier,
                status: required(table, "status", row, status)?,
            })
        })
        .collect()
}

/// Decodes `sales_processed`.
pub fn decode_stored_sales(df: &DataFrame) -> Result<Vec<StoredSale>> {
    let table = tables::SALES_PROCESSED;
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    require_columns(
        df,
        table,
        &[
            "sale_id",
            "product_id",
            "quantity",
            "sale_price",
            "sale_date",
            "channel",
            "revenue_total",
            "margin",
            "sale_month",
        ],
    )?;
    let sale_ids = text_column(df, "sale_id")?;
    let product_ids = text_column(df, "product_id")?;
    let quantities = i64_column(df, "quantity")?;
    let prices = f64_column(df, "sale_price")?;
    let dates = date_column(df, "sale_date")?;
    let channels = text_column(df, "channel")?;
    let revenues = f64_column(df, "revenue_total")?;
    let margins = f64_column(df, "margin")?;
    let months = text_column(df, "sale_month")?;

    let mut sales = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let quantity = required_value(table, "quantity", row, quantities[row])?;
        sales.push(StoredSale {
            sale_id: required(table, "sale_id", row, sale_ids[row].clone())?,
            product_id: required(table, "product_id", row, product_ids[row].clone())?,
            quantity: quantity_from(table, row, quantity)?,
            sale_price: prices[row],
            sale_date: required_value(table, "sale_date", row, dates[row])?,
            channel: required(table, "channel", row, channels[row].clone())?,
            revenue_total: revenues[row],
            margin: margins[row],
            sale_month: required(table, "sale_month", row, months[row].clone())?,
        });
    }
    Ok(sales)
}

/// Decodes `sales_report`.
pub fn decode_report_rows(df: &DataFrame) -> Result<Vec<SalesReportRow>> {
    let table = tables::SALES_REPORT;
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    require_columns(
        df,
        table,
        &[
            "sale_id",
            "product_name",
            "category",
            "quantity",
            "revenue_total",
            "margin",
            "channel",
            "sale_month",
        ],
    )?;
    let sale_ids = text_column(df, "sale_id")?;
    let names = text_column(df, "product_name")?;
    let categories = text_column(df, "category")?;
    let quantities = i64_column(df, "quantity")?;
    let revenues = f64_column(df, "revenue_total")?;
    let margins = f64_column(df, "margin")?;
    let channels = text_column(df, "channel")?;
    let months = text_column(df, "sale_month")?;

    let mut rows = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let quantity = required_value(table, "quantity", row, quantities[row])?;
        rows.push(SalesReportRow {
            sale_id: required(table, "sale_id", row, sale_ids[row].clone())?,
            product_name: names[row].clone(),
            category: categories[row].clone(),
            quantity: quantity_from(table, row, quantity)?,
            revenue_total: revenues[row],
            margin: margins[row],
            channel: required(table, "channel", row, channels[row].clone())?,
            sale_month: required(table, "sale_month", row, months[row].clone())?,
        });
    }
    Ok(rows)
}

/// Decodes `low_performance_products`.
pub fn decode_low_performance(df: &DataFrame) -> Result<Vec<LowPerformanceProduct>> {
    let table = tables::LOW_PERFORMANCE;
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    let ids = text_column(df, "product_id")?;
    let names = text_column(df, "name")?;
    let categories = text_column(df, "category")?;
    let costs = f64_column(df, "cost_price")?;
    let statuses = text_column(df, "status")?;
    let counts = i64_column(df, "sale_count")?;
    let quantities = i64_column(df, "total_quantity")?;

    let mut products = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        products.push(LowPerformanceProduct {
            product_id: required(table, "product_id", row, ids[row].clone())?,
            name: required(table, "name", row, names[row].clone())?,
            category: required(table, "category", row, categories[row].clone())?,
            cost_price: costs[row],
            status: required(table, "status", row, statuses[row].clone())?,
            sale_count: counts[row].unwrap_or(0).max(0) as usize,
            total_quantity: quantities[row].unwrap_or(0).max(0) as u64,
        });
    }
    Ok(products)
}
