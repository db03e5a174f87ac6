use crate::models::{LowPerformanceProduct, Product, StoredSale};
use std::collections::HashMap;
use tracing::{info, warn};

pub const DEFAULT_LOW_PERFORMANCE_THRESHOLD: usize = 2;

/// Flags products whose matched sale count is below a threshold.
pub struct AnomalyDetector {
    threshold: usize,
}

impl AnomalyDetector {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Outer-joins every product to its sales and keeps those with
    /// `sale_count < threshold`, including products with no sales at all.
    ///
    /// Sorted by sale count, then product name, then id.
    pub fn detect(&self, products: &[Product], sales: &[StoredSale]) -> Vec<LowPerformanceProduct> {
        let mut per_product: HashMap<&str, (usize, u64)> = HashMap::new();
        for sale in sales {
            let entry = per_product.entry(sale.product_id.as_str()).or_default();
            entry.0 += 1;
            entry.1 += u64::from(sale.quantity);
        }

        let mut flagged: Vec<LowPerformanceProduct> = products
            .iter()
            .filter_map(|p| {
                let (sale_count, total_quantity) =
                    per_product.get(p.id.as_str()).copied().unwrap_or_default();
                (sale_count < self.threshold).then(|| LowPerformanceProduct {
                    product_id: p.id.clone(),
                    name: p.name.clone(),
                    category: p.category.clone(),
                    cost_price: p.cost_price,
                    status: p.status.clone(),
                    sale_count,
                    total_quantity,
                })
            })
            .collect();

        flagged.sort_by(|a, b| {
            a.sale_count
                .cmp(&b.sale_count)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.product_id.cmp(&b.product_id))
        });

        if flagged.is_empty() {
            info!("All products reach {} sales", self.threshold);
        } else {
            warn!(
                "{} product(s) below {} sales",
                flagged.len(),
                self.threshold
            );
            for p in &flagged {
                warn!("  {} ({}): {} sale(s)", p.name, p.category, p.sale_count);
            }
        }

        flagged
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_PERFORMANCE_THRESHOLD)
    }
}
