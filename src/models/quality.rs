use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-fatal data-quality finding surfaced in the run output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// No product in the category has a known cost price, so nothing can be imputed.
    UnresolvedCostPrice {
        category: String,
        product_ids: Vec<String>,
    },
    /// The sale has no price and its product's cost price is unknown.
    UnresolvedSalePrice { sale_id: String, product_id: String },
    /// The sale references a product id absent from the product table.
    UnknownProduct { sale_id: String, product_id: String },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::UnresolvedCostPrice {
                category,
                product_ids,
            } => write!(
                f,
                "category '{}' has no known cost price; left null for {}",
                category,
                product_ids.join(", ")
            ),
            DataQualityWarning::UnresolvedSalePrice {
                sale_id,
                product_id,
            } => write!(
                f,
                "sale '{}' has no price and product '{}' has no cost price",
                sale_id, product_id
            ),
            DataQualityWarning::UnknownProduct {
                sale_id,
                product_id,
            } => write!(
                f,
                "sale '{}' references unknown product '{}'",
                sale_id, product_id
            ),
        }
    }
}
