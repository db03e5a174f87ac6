use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Option<String>,
    pub total_quantity: u64,
    pub total_revenue: f64,
    pub avg_revenue: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopProduct {
    pub name: String,
    pub total_quantity: u64,
    pub total_revenue: f64,
    pub sale_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel: String,
    pub sale_count: usize,
    pub total_quantity: u64,
    pub total_revenue: f64,
    pub avg_revenue: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMargin {
    pub category: Option<String>,
    pub avg_margin: Option<f64>,
    pub min_margin: Option<f64>,
    pub max_margin: Option<f64>,
    pub sale_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallSummary {
    pub sale_count: usize,
    pub total_quantity: u64,
    pub total_revenue: f64,
    pub avg_margin: Option<f64>,
}

/// Everything the reporting stage produces for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub categories: Vec<CategorySummary>,
    pub top_product: Option<TopProduct>,
    pub channels: Vec<ChannelSummary>,
    pub leader_channel: Option<String>,
    pub category_margins: Vec<CategoryMargin>,
    pub overall: OverallSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowPerformanceProduct {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub cost_price: Option<f64>,
    pub status: String,
    pub sale_count: usize,
    pub total_quantity: u64,
}
