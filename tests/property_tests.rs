/// Property-based tests using proptest
/// Tests invariants of the purchase aggregation for arbitrary histories
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use suluk_api::analysis::{aggregate, TOP_ITEMS_LIMIT};
use suluk_api::models::{Purchase, PurchaseDetail, PurchaseLine};

const NAMES: [&str; 8] = [
    "Coffee", "Tea", "Bagel", "Muffin", "Repair", "Delivery", "Juice", "Cake",
];

fn history_strategy() -> impl Strategy<Value = Vec<PurchaseDetail>> {
    let line = (proptest::option::weighted(0.9, 0..NAMES.len()), 1i32..50);
    let purchase = (
        0.0f64..1000.0,
        1u32..=28,
        0u32..24,
        proptest::collection::vec(line, 0..6),
    );
    proptest::collection::vec(purchase, 0..30).prop_map(|purchases| {
        purchases
            .into_iter()
            .enumerate()
            .map(|(idx, (total, day, hour, lines))| PurchaseDetail {
                purchase: Purchase {
                    id: idx as i64 + 1,
                    client_id: 1,
                    total_amount: total,
                    created_at: Utc.with_ymd_and_hms(2024, 2, day, hour, 0, 0).unwrap(),
                },
                lines: lines
                    .into_iter()
                    .map(|(name, quantity)| PurchaseLine {
                        quantity,
                        item_name: name.map(|i| NAMES[i].to_string()),
                    })
                    .collect(),
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn total_is_sum_of_purchase_totals(history in history_strategy()) {
        let agg = aggregate(&history);
        let expected: f64 = history.iter().map(|d| d.purchase.total_amount).sum();
        prop_assert!((agg.total_spent - expected).abs() < 1e-6);
        prop_assert_eq!(agg.purchase_count, history.len());
    }

    #[test]
    fn chart_is_sorted_unique_and_sums_to_total(history in history_strategy()) {
        let agg = aggregate(&history);
        for pair in agg.spending_by_date.windows(2) {
            prop_assert!(pair[0].date < pair[1].date);
        }
        let mut dates: Vec<_> = history.iter().map(|d| d.purchase.created_at.date_naive()).collect();
        dates.sort();
        dates.dedup();
        prop_assert_eq!(dates.len(), agg.spending_by_date.len());

        for point in &agg.spending_by_date {
            let expected: f64 = history
                .iter()
                .filter(|d| d.purchase.created_at.date_naive() == point.date)
                .map(|d| d.purchase.total_amount)
                .sum();
            prop_assert!((point.amount - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn top_items_are_bounded_and_descending(history in history_strategy()) {
        let agg = aggregate(&history);
        prop_assert!(agg.top_items.len() <= TOP_ITEMS_LIMIT);
        prop_assert_eq!(
            agg.top_items.len(),
            agg.item_quantities.len().min(TOP_ITEMS_LIMIT)
        );
        for pair in agg.top_items.windows(2) {
            prop_assert!(pair[0].1 >= pair[1].1);
        }
        if let Some((_, lowest)) = agg.top_items.last() {
            for (name, quantity) in &agg.item_quantities {
                if !agg.top_items.iter().any(|(top, _)| top == name) {
                    prop_assert!(quantity <= lowest);
                }
            }
        }
    }

    #[test]
    fn quantities_ignore_dangling_items(history in history_strategy()) {
        let agg = aggregate(&history);
        let resolved: i64 = history
            .iter()
            .flat_map(|d| d.lines.iter())
            .filter(|l| l.item_name.is_some())
            .map(|l| i64::from(l.quantity))
            .sum();
        let counted: i64 = agg.item_quantities.iter().map(|(_, q)| q).sum();
        prop_assert_eq!(resolved, counted);
    }
}
