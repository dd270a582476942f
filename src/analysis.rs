//! Purchase-history aggregation and prompt rendering.
//!
//! Everything here is a pure function of the purchase snapshot fetched by the
//! caller. Nothing is cached: every analysis request recomputes from scratch.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::models::{AnalysisSummary, ChartPoint, PurchaseDetail, TopItem};

/// Number of entries kept in the top-items ranking.
pub const TOP_ITEMS_LIMIT: usize = 5;

/// Language of the generated commentary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Arabic,
}

impl Language {
    /// `"en"` selects English; any other code falls back to Arabic.
    pub fn from_code(code: &str) -> Self {
        if code == "en" {
            Language::English
        } else {
            Language::Arabic
        }
    }

    /// Body of the stream when the client has nothing to analyse.
    pub fn no_history_message(self) -> &'static str {
        match self {
            Language::English => "No purchase history available for analysis.",
            Language::Arabic => "لا يوجد سجل مشتريات متاح للتحليل.",
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            Language::English => "Answer in English.",
            Language::Arabic => "Answer in Arabic. Layout the response properly in Markdown.",
        }
    }
}

/// Aggregated view of one client's purchases.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PurchaseAggregate {
    pub total_spent: f64,
    pub purchase_count: usize,
    /// Accumulated quantity per item name, in first-seen order.
    pub item_quantities: Vec<(String, i64)>,
    /// At most [`TOP_ITEMS_LIMIT`] entries, highest quantity first.
    pub top_items: Vec<(String, i64)>,
    /// One point per calendar date, ascending.
    pub spending_by_date: Vec<ChartPoint>,
}

impl PurchaseAggregate {
    pub fn is_empty(&self) -> bool {
        self.purchase_count == 0
    }

    pub fn into_summary(self, client_name: String) -> AnalysisSummary {
        AnalysisSummary {
            client_name,
            total_spent: self.total_spent,
            purchase_count: self.purchase_count,
            chart_data: self.spending_by_date,
            top_items: self
                .top_items
                .into_iter()
                .map(|(name, value)| TopItem { name, value })
                .collect(),
        }
    }
}

/// Aggregates a client's purchase history.
///
/// Lines whose item no longer resolves are skipped. An empty history yields the
/// zero aggregate without walking any lines.
pub fn aggregate(history: &[PurchaseDetail]) -> PurchaseAggregate {
    if history.is_empty() {
        return PurchaseAggregate::default();
    }

    let total_spent = history.iter().map(|d| d.purchase.total_amount).sum();
    let item_quantities = item_quantities(history);
    let top_items = top_items(&item_quantities, TOP_ITEMS_LIMIT);

    PurchaseAggregate {
        total_spent,
        purchase_count: history.len(),
        item_quantities,
        top_items,
        spending_by_date: spending_by_date(history),
    }
}

/// Sums line quantities per current item name, keeping first-seen order.
pub fn item_quantities(history: &[PurchaseDetail]) -> Vec<(String, i64)> {
    let mut order: Vec<(String, i64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in history.iter().flat_map(|d| d.lines.iter()) {
        let Some(name) = line.item_name.as_ref() else {
            continue;
        };
        match index.get(name) {
            Some(&pos) => order[pos].1 += i64::from(line.quantity),
            None => {
                index.insert(name.clone(), order.len());
                order.push((name.clone(), i64::from(line.quantity)));
            }
        }
    }

    order
}

/// Highest quantities first. Ties keep their first-seen order.
pub fn top_items(quantities: &[(String, i64)], limit: usize) -> Vec<(String, i64)> {
    let mut ranked = quantities.to_vec();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);
    ranked
}

/// Buckets purchase totals by the UTC calendar date of their creation.
pub fn spending_by_date(history: &[PurchaseDetail]) -> Vec<ChartPoint> {
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for detail in history {
        *buckets
            .entry(detail.purchase.created_at.date_naive())
            .or_insert(0.0) += detail.purchase.total_amount;
    }
    buckets
        .into_iter()
        .map(|(date, amount)| ChartPoint { date, amount })
        .collect()
}

/// Renders the prompt sent to the inference server.
pub fn build_prompt(client_name: &str, aggregate: &PurchaseAggregate, lang: Language) -> String {
    let top_items = aggregate
        .top_items
        .iter()
        .map(|(name, count)| format!("{} ({})", name, count))
        .collect::<Vec<_>>()
        .join(", ");

    // Non-finite amounts serialize as null, so this cannot fail in practice.
    let spending = serde_json::to_string(&aggregate.spending_by_date)
        .unwrap_or_else(|_| "[]".to_string());

    format!(
        "Analyze the following client purchase history and provide insights on their spending strategy and personality.\n\
         Client: {}\n\
         Total Spent: ${:.2}\n\
         Total Purchases: {}\n\
         Top Items Bought: {}\n\
         Spending Pattern (Date: Amount): {}\n\
         \n\
         Please provide a psychological profile of this customer and actionable recommendations for a business to increase sales with them.\n\
         {}\n",
        client_name,
        aggregate.total_spent,
        aggregate.purchase_count,
        top_items,
        spending,
        lang.instruction()
    )
}
