use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Product row as read from the source, before any coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProduct {
    pub id: String,
    pub name: String,
    pub category: String,
    pub cost_price: Option<String>,
    pub supplier: Option<String>,
    pub status: String,
}

/// Sale row as read from the source. Quantity is already validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSale {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub sale_price: Option<String>,
    pub sale_date: String,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    pub cost_price: Option<f64>,
    pub supplier: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub sale_price: Option<f64>,
    pub sale_date: String,
    pub channel: String,
}

/// A sale joined to its product with derived financial fields.
///
/// `revenue_total` and `margin` are `None` only when the inputs they are
/// computed from are unresolved; those rows always carry a data-quality
/// warning in the run output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSale {
    pub sale_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub sale_price: Option<f64>,
    pub sale_date: NaiveDate,
    pub channel: String,
    pub revenue_total: Option<f64>,
    pub margin: Option<f64>,
    pub sale_month: String,
    pub product_name: Option<String>,
    pub category: Option<String>,
}

/// Row of the denormalized `sales_report` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesReportRow {
    pub sale_id: String,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub quantity: u32,
    pub revenue_total: Option<f64>,
    pub margin: Option<f64>,
    pub channel: String,
    pub sale_month: String,
}

impl From<&EnrichedSale> for SalesReportRow {
    fn from(sale: &EnrichedSale) -> Self {
        Self {
            sale_id: sale.sale_id.clone(),
            product_name: sale.product_name.clone(),
            category: sale.category.clone(),
            quantity: sale.quantity,
            revenue_total: sale.revenue_total,
            margin: sale.margin,
            channel: sale.channel.clone(),
            sale_month: sale.sale_month.clone(),
        }
    }
}

/// Persisted sale as read back from `sales_processed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSale {
    pub sale_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub sale_price: Option<f64>,
    pub sale_date: NaiveDate,
    pub channel: String,
    pub revenue_total: Option<f64>,
    pub margin: Option<f64>,
    pub sale_month: String,
}
