use crate::error::{PipelineError, Result};
use crate::models::{DataQualityWarning, EnrichedSale, Product, Sale};
use crate::processor::date_parser::{DateParser, year_month};
use crate::processor::numeric::mean;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichmentReport {
    pub sales: usize,
    pub total_revenue: f64,
    pub avg_margin: Option<f64>,
    pub warnings: Vec<DataQualityWarning>,
}

/// Joins cleaned sales to cleaned products and derives revenue, margin and month.
pub struct EnrichmentEngine {
    dates: DateParser,
}

impl EnrichmentEngine {
    pub fn new() -> Self {
        Self {
            dates: DateParser::new(),
        }
    }

    /// Enriches every sale. Fails on the first unparsable sale date.
    ///
    /// The product cost price is used for the margin and then dropped; it is
    /// not part of the output rows.
    pub fn enrich(
        &self,
        sales: &[Sale],
        products: &[Product],
    ) -> Result<(Vec<EnrichedSale>, EnrichmentReport)> {
        let by_id: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();
        let mut report = EnrichmentReport::default();

        let enriched = sales
            .iter()
            .map(|sale| {
                let product = by_id.get(sale.product_id.as_str()).copied();
                if product.is_none() {
                    report.warnings.push(DataQualityWarning::UnknownProduct {
                        sale_id: sale.id.clone(),
                        product_id: sale.product_id.clone(),
                    });
                }
                let cost_price = product.and_then(|p| p.cost_price);
                let sale_date = self.derive_date(sale)?;

                Ok(EnrichedSale {
                    sale_id: sale.id.clone(),
                    product_id: sale.product_id.clone(),
                    quantity: sale.quantity,
                    sale_price: sale.sale_price,
                    sale_date,
                    channel: sale.channel.clone(),
                    revenue_total: compute_revenue(sale.quantity, sale.sale_price),
                    margin: compute_margin(sale.sale_price, cost_price),
                    sale_month: year_month(sale_date),
                    product_name: product.map(|p| p.name.clone()),
                    category: product.map(|p| p.category.clone()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        report.sales = enriched.len();
        report.total_revenue = enriched.iter().filter_map(|s| s.revenue_total).sum();
        report.avg_margin = mean(enriched.iter().filter_map(|s| s.margin));

        for warning in &report.warnings {
            warn!("Data quality: {}", warning);
        }
        info!(
            "Enriched {} sales, total revenue {:.2}",
            report.sales, report.total_revenue
        );

        Ok((enriched, report))
    }

    fn derive_date(&self, sale: &Sale) -> Result<chrono::NaiveDate> {
        self.dates
            .parse(&sale.sale_date)
            .ok_or_else(|| PipelineError::DateParse {
                sale_id: sale.id.clone(),
                value: sale.sale_date.clone(),
            })
    }
}

impl Default for EnrichmentEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// `quantity * sale_price`, unrounded.
pub fn compute_revenue(quantity: u32, sale_price: Option<f64>) -> Option<f64> {
    sale_price.map(|price| f64::from(quantity) * price)
}

/// `sale_price - cost_price`, unrounded.
pub fn compute_margin(sale_price: Option<f64>, cost_price: Option<f64>) -> Option<f64> {
    Some(sale_price? - cost_price?)
}
