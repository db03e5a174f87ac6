use crate::models::{DataQualityWarning, Product, RawProduct, RawSale, Sale};
use crate::processor::numeric::{mean, parse_money, round_cents};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

pub const DEFAULT_MARKUP_FACTOR: f64 = 1.3;
pub const SUPPLIER_PLACEHOLDER: &str = "Não Informado";

/// Outcome of category-mean cost imputation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostImputation {
    pub filled: usize,
    /// Mean used for each category that had at least one product filled.
    pub category_means: BTreeMap<String, f64>,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalePriceImputation {
    pub filled: usize,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub products: usize,
    pub sales: usize,
    pub cost_prices_filled: usize,
    pub category_means: BTreeMap<String, f64>,
    pub suppliers_filled: usize,
    pub sale_prices_filled: usize,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Debug, Clone)]
pub struct CleanedTables {
    pub products: Vec<Product>,
    pub sales: Vec<Sale>,
    pub report: CleaningReport,
}

/// Repairs missing and malformed values in the product and sale tables.
pub struct CleaningEngine {
    markup_factor: f64,
    supplier_placeholder: String,
}

impl CleaningEngine {
    pub fn new(markup_factor: f64, supplier_placeholder: impl Into<String>) -> Self {
        Self {
            markup_factor,
            supplier_placeholder: supplier_placeholder.into(),
        }
    }

    pub fn markup_factor(&self) -> f64 {
        self.markup_factor
    }

    pub fn clean(&self, products: Vec<RawProduct>, sales: Vec<RawSale>) -> CleanedTables {
        let (products, cost) = impute_cost_price(coerce_products(products));
        for (category, mean) in &cost.category_means {
            info!(
                "Filled cost_price for category '{}' with mean {:.2}",
                category, mean
            );
        }

        let (products, suppliers_filled) = fill_supplier(products, &self.supplier_placeholder);
        if suppliers_filled > 0 {
            info!(
                "Filled {} suppliers with '{}'",
                suppliers_filled, self.supplier_placeholder
            );
        }

        let (sales, sale_price) =
            impute_sale_price(normalize_sale_price(sales), &products, self.markup_factor);
        if sale_price.filled > 0 {
            info!(
                "Filled {} sale prices with cost_price * {}",
                sale_price.filled, self.markup_factor
            );
        }

        let mut warnings = cost.warnings;
        warnings.extend(sale_price.warnings);
        for warning in &warnings {
            warn!("Data quality: {}", warning);
        }

        let report = CleaningReport {
            products: products.len(),
            sales: sales.len(),
            cost_prices_filled: cost.filled,
            category_means: cost.category_means,
            suppliers_filled,
            sale_prices_filled: sale_price.filled,
            warnings,
        };

        CleanedTables {
            products,
            sales,
            report,
        }
    }
}

impl Default for CleaningEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MARKUP_FACTOR, SUPPLIER_PLACEHOLDER)
    }
}

/// Coerces the textual cost price; malformed numbers become null.
pub fn coerce_products(raw: Vec<RawProduct>) -> Vec<Product> {
    raw.into_iter()
        .map(|p| Product {
            cost_price: p.cost_price.as_deref().and_then(parse_money),
            id: p.id,
            name: p.name,
            category: p.category,
            supplier: p.supplier,
            status: p.status,
        })
        .collect()
}

/// Fills null cost prices with the mean of known costs in the same category.
///
/// Categories without any known cost keep their nulls and produce one
/// `UnresolvedCostPrice` warning each.
pub fn impute_cost_price(products: Vec<Product>) -> (Vec<Product>, CostImputation) {
    let mut known: HashMap<&str, Vec<f64>> = HashMap::new();
    for p in &products {
        if let Some(cost) = p.cost_price {
            known.entry(p.category.as_str()).or_default().push(cost);
        }
    }
    let means: HashMap<String, f64> = known
        .into_iter()
        .filter_map(|(category, costs)| mean(costs).map(|m| (category.to_string(), round_cents(m))))
        .collect();

    let mut outcome = CostImputation::default();
    let mut unresolved: BTreeMap<String, Vec<String>> = BTreeMap::new();

    let products = products
        .into_iter()
        .map(|mut p| {
            if p.cost_price.is_none() {
                match means.get(&p.category) {
                    Some(&m) => {
                        p.cost_price = Some(m);
                        outcome.filled += 1;
                        outcome.category_means.insert(p.category.clone(), m);
                    }
                    None => unresolved
                        .entry(p.category.clone())
                        .or_default()
                        .push(p.id.clone()),
                }
            }
            p
        })
        .collect();

    outcome.warnings = unresolved
        .into_iter()
        .map(|(category, product_ids)| DataQualityWarning::UnresolvedCostPrice {
            category,
            product_ids,
        })
        .collect();

    (products, outcome)
}

/// Replaces null suppliers with `placeholder`, returning how many were filled.
pub fn fill_supplier(products: Vec<Product>, placeholder: &str) -> (Vec<Product>, usize) {
    let mut filled = 0;
    let products = products
        .into_iter()
        .map(|mut p| {
            if p.supplier.is_none() {
                p.supplier = Some(placeholder.to_string());
                filled += 1;
            }
            p
        })
        .collect();
    (products, filled)
}

/// Coerces the textual sale price to cents; malformed numbers become null.
pub fn normalize_sale_price(raw: Vec<RawSale>) -> Vec<Sale> {
    raw.into_iter()
        .map(|s| Sale {
            sale_price: s.sale_price.as_deref().and_then(parse_money).map(round_cents),
            id: s.id,
            product_id: s.product_id,
            quantity: s.quantity,
            sale_date: s.sale_date,
            channel: s.channel,
        })
        .collect()
}

/// Fills null sale prices with the product's cost price times `markup_factor`.
///
/// Expects products whose cost prices have already been imputed. A sale
/// whose product has no cost (or does not exist) keeps its null price.
pub fn impute_sale_price(
    sales: Vec<Sale>,
    products: &[Product],
    markup_factor: f64,
) -> (Vec<Sale>, SalePriceImputation) {
    let costs: HashMap<&str, Option<f64>> = products
        .iter()
        .map(|p| (p.id.as_str(), p.cost_price))
        .collect();

    let mut outcome = SalePriceImputation::default();
    let sales = sales
        .into_iter()
        .map(|mut s| {
            if s.sale_price.is_none() {
                match costs.get(s.product_id.as_str()).copied().flatten() {
                    Some(cost) => {
                        s.sale_price = Some(round_cents(cost * markup_factor));
                        outcome.filled += 1;
                    }
                    None => outcome
                        .warnings
                        .push(DataQualityWarning::UnresolvedSalePrice {
                            sale_id: s.id.clone(),
                            product_id: s.product_id.clone(),
                        }),
                }
            }
            s
        })
        .collect();

    (sales, outcome)
}
