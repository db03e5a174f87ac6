use crate::models::{
    AnalyticsReport, CategoryMargin, CategorySummary, ChannelSummary, OverallSummary,
    SalesReportRow, TopProduct,
};
use crate::processor::numeric::{mean, round_cents};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Running totals for one group of report rows.
#[derive(Default)]
struct GroupTotals<'a> {
    rows: usize,
    quantity: u64,
    revenues: Vec<f64>,
    margins: Vec<f64>,
    sale_ids: BTreeSet<&'a str>,
}

impl<'a> GroupTotals<'a> {
    fn add(&mut self, row: &'a SalesReportRow) {
        self.rows += 1;
        self.quantity += u64::from(row.quantity);
        self.revenues.extend(row.revenue_total);
        self.margins.extend(row.margin);
        self.sale_ids.insert(row.sale_id.as_str());
    }

    /// Sum of known revenues. Money columns are cents, so the sum is rounded back to cents.
    fn total_revenue(&self) -> f64 {
        round_cents(self.revenues.iter().sum())
    }

    fn avg_revenue(&self) -> Option<f64> {
        mean(self.revenues.iter().copied()).map(round_cents)
    }

    fn avg_margin(&self) -> Option<f64> {
        mean(self.margins.iter().copied()).map(round_cents)
    }

    fn min_margin(&self) -> Option<f64> {
        self.margins.iter().copied().min_by(f64::total_cmp).map(round_cents)
    }

    fn max_margin(&self) -> Option<f64> {
        self.margins.iter().copied().max_by(f64::total_cmp).map(round_cents)
    }
}

fn group_by<'a, K: Ord>(
    rows: &'a [SalesReportRow],
    key: impl Fn(&'a SalesReportRow) -> K,
) -> BTreeMap<K, GroupTotals<'a>> {
    let mut groups: BTreeMap<K, GroupTotals<'a>> = BTreeMap::new();
    for row in rows {
        groups.entry(key(row)).or_default().add(row);
    }
    groups
}

/// Descending by value with `None` last.
fn desc_nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Totals per category, highest revenue first. Ties keep category order.
pub fn category_summary(rows: &[SalesReportRow]) -> Vec<CategorySummary> {
    let mut summary: Vec<CategorySummary> = group_by(rows, |r| r.category.clone())
        .into_iter()
        .map(|(category, totals)| CategorySummary {
            category,
            total_quantity: totals.quantity,
            total_revenue: totals.total_revenue(),
            avg_revenue: totals.avg_revenue(),
        })
        .collect();
    summary.sort_by(|a, b| {
        b.total_revenue
            .total_cmp(&a.total_revenue)
            .then_with(|| a.category.cmp(&b.category))
    });
    summary
}

/// Product with the largest total quantity; on a tie the alphabetically first
/// name wins. Rows without a product name are not candidates.
pub fn top_product(rows: &[SalesReportRow]) -> Option<TopProduct> {
    group_by(rows, |r| r.product_name.as_deref())
        .into_iter()
        .filter_map(|(name, totals)| name.map(|name| (name, totals)))
        .min_by_key(|(name, totals)| (Reverse(totals.quantity), *name))
        .map(|(name, totals)| TopProduct {
            name: name.to_string(),
            total_quantity: totals.quantity,
            total_revenue: totals.total_revenue(),
            sale_count: totals.sale_ids.len(),
        })
}

/// Totals per sales channel, highest revenue first.
pub fn channel_summary(rows: &[SalesReportRow]) -> Vec<ChannelSummary> {
    let mut summary: Vec<ChannelSummary> = group_by(rows, |r| r.channel.as_str())
        .into_iter()
        .map(|(channel, totals)| ChannelSummary {
            channel: channel.to_string(),
            sale_count: totals.rows,
            total_quantity: totals.quantity,
            total_revenue: totals.total_revenue(),
            avg_revenue: totals.avg_revenue(),
        })
        .collect();
    summary.sort_by(|a, b| {
        b.total_revenue
            .total_cmp(&a.total_revenue)
            .then_with(|| a.channel.cmp(&b.channel))
    });
    summary
}

/// The channel with the highest total revenue, given a sorted channel summary.
pub fn leader_channel(channels: &[ChannelSummary]) -> Option<String> {
    channels.first().map(|c| c.channel.clone())
}

/// Margin statistics per category, highest mean margin first.
pub fn category_margins(rows: &[SalesReportRow]) -> Vec<CategoryMargin> {
    let mut margins: Vec<CategoryMargin> = group_by(rows, |r| r.category.clone())
        .into_iter()
        .map(|(category, totals)| CategoryMargin {
            category,
            avg_margin: totals.avg_margin(),
            min_margin: totals.min_margin(),
            max_margin: totals.max_margin(),
            sale_count: totals.rows,
        })
        .collect();
    margins.sort_by(|a, b| {
        desc_nulls_last(a.avg_margin, b.avg_margin).then_with(|| a.category.cmp(&b.category))
    });
    margins
}

pub fn overall_summary(rows: &[SalesReportRow]) -> OverallSummary {
    let mut totals = GroupTotals::default();
    for row in rows {
        totals.add(row);
    }
    OverallSummary {
        sale_count: totals.sale_ids.len(),
        total_quantity: totals.quantity,
        total_revenue: totals.total_revenue(),
        avg_margin: totals.avg_margin(),
    }
}

/// Builds every aggregate view from the persisted report rows.
pub fn build_report(rows: &[SalesReportRow]) -> AnalyticsReport {
    let channels = channel_summary(rows);
    let report = AnalyticsReport {
        categories: category_summary(rows),
        top_product: top_product(rows),
        leader_channel: leader_channel(&channels),
        channels,
        category_margins: category_margins(rows),
        overall: overall_summary(rows),
    };

    for c in &report.categories {
        info!(
            "Category {}: {} units, revenue {:.2}",
            c.category.as_deref().unwrap_or("<none>"),
            c.total_quantity,
            c.total_revenue
        );
    }
    if let Some(top) = &report.top_product {
        info!(
            "Top product: {} ({} units, revenue {:.2}, {} sales)",
            top.name, top.total_quantity, top.total_revenue, top.sale_count
        );
    }
    if let Some(leader) = &report.leader_channel {
        info!("Leader channel: {}", leader);
    }
    info!(
        "Overall: {} sales, {} items, revenue {:.2}",
        report.overall.sale_count, report.overall.total_quantity, report.overall.total_revenue
    );

    report
}
