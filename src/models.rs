use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============ Database Models ============

/// A customer of the business.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Client {
    /// Unique identifier for the client.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Contact email, if known.
    pub email: Option<String>,
    /// Contact phone, if known.
    pub phone: Option<String>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

/// A catalog entry that can be sold.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier for the item.
    pub id: i64,
    /// Current catalog name. Aggregations key on this, not on the id.
    pub name: String,
    /// Open tag, conventionally "Product" or "Service".
    #[serde(rename = "type")]
    pub item_type: String,
    /// Current catalog price.
    pub price: f64,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

/// A purchase made by a client.
///
/// `total_amount` is computed from the line items once, when the purchase is
/// created, and is never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i64,
    pub client_id: i64,
    pub total_amount: f64,
    pub created_at: DateTime<Utc>,
}

/// Row returned when listing purchases, joined with the owning client's name.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PurchaseListRow {
    pub id: i64,
    pub client_id: i64,
    pub total_amount: f64,
    pub created_at: DateTime<Utc>,
    /// `None` when the referenced client no longer resolves.
    pub client_name: Option<String>,
}

/// A purchase line resolved against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseLine {
    pub quantity: i32,
    /// Current name of the referenced item, `None` for a dangling reference.
    pub item_name: Option<String>,
}

/// A purchase together with its resolved lines, as consumed by the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseDetail {
    pub purchase: Purchase,
    pub lines: Vec<PurchaseLine>,
}

// ============ Request Models ============

/// Payload for `POST /clients`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewClient {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Payload for `POST /items`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub price: f64,
}

/// One line of a `POST /purchases` payload.
///
/// `unit_price` is the price at the time of the transaction and is independent
/// of the item's current catalog price.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPurchaseLine {
    pub item_id: i64,
    pub quantity: i32,
    pub unit_price: f64,
}

/// Payload for `POST /purchases`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPurchase {
    pub client_id: i64,
    pub items: Vec<NewPurchaseLine>,
}

impl NewPurchase {
    /// Sum of `quantity * unit_price` over all lines.
    pub fn total_amount(&self) -> f64 {
        self.items
            .iter()
            .map(|line| f64::from(line.quantity) * line.unit_price)
            .sum()
    }
}

/// Query parameters for the analysis endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisQuery {
    pub lang: Option<String>,
    pub model: Option<String>,
}

// ============ Response Models ============

/// Entry of `GET /purchases`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRead {
    pub id: i64,
    pub client_id: i64,
    pub total_amount: f64,
    pub created_at: String,
    pub client_name: String,
}

impl From<PurchaseListRow> for PurchaseRead {
    fn from(row: PurchaseListRow) -> Self {
        Self {
            id: row.id,
            client_id: row.client_id,
            total_amount: row.total_amount,
            created_at: row.created_at.to_rfc3339(),
            client_name: row.client_name.unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// One point of the spending-by-date series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub amount: f64,
}

/// One entry of the top-items ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopItem {
    pub name: String,
    pub value: i64,
}

/// Body of `GET /analysis/{client_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub client_name: String,
    pub total_spent: f64,
    pub purchase_count: usize,
    pub chart_data: Vec<ChartPoint>,
    pub top_items: Vec<TopItem>,
}

/// Body of `GET /analysis/models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    pub models: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_amount_uses_snapshotted_prices() {
        let purchase = NewPurchase {
            client_id: 1,
            items: vec![
                NewPurchaseLine {
                    item_id: 1,
                    quantity: 2,
                    unit_price: 10.5,
                },
                NewPurchaseLine {
                    item_id: 2,
                    quantity: 3,
                    unit_price: 1.0,
                },
            ],
        };
        assert!((purchase.total_amount() - 24.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dangling_client_is_listed_as_unknown() {
        let row = PurchaseListRow {
            id: 7,
            client_id: 99,
            total_amount: 5.0,
            created_at: Utc::now(),
            client_name: None,
        };
        let read = PurchaseRead::from(row);
        assert_eq!(read.client_name, "Unknown");
    }

    #[test]
    fn item_type_serializes_as_type() {
        let item: NewItem =
            serde_json::from_str(r#"{"name":"Haircut","type":"Service","price":20}"#).unwrap();
        assert_eq!(item.item_type, "Service");
    }

    #[test]
    fn chart_point_date_is_iso_string() {
        let point = ChartPoint {
            date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            amount: 12.5,
        };
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["date"], "2024-03-09");
    }
}
