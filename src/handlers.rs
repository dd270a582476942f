use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use crate::ollama_client::OllamaClient;
use crate::store::Store;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Data access for clients, items and purchases.
    pub store: Arc<dyn Store>,
    /// Application configuration.
    pub config: Config,
    /// Client for the local inference server.
    pub ollama: OllamaClient,
}

/// GET /
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Purchase insights backend is running" }))
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "suluk-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

// ============ Clients ============

/// POST /clients
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewClient>,
) -> Result<Json<Client>, AppError> {
    let payload = normalize_client(payload)?;
    let client = state.store.insert_client(&payload).await?;
    tracing::info!("Created client {} ({})", client.id, client.name);
    Ok(Json(client))
}

/// GET /clients
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Client>>, AppError> {
    Ok(Json(state.store.list_clients().await?))
}

/// GET /clients/:id
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Client>, AppError> {
    state
        .store
        .get_client(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Client not found".to_string()))
}

/// Trims the fields and drops blank optional contacts.
fn normalize_client(payload: NewClient) -> Result<NewClient, AppError> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Client name is required".to_string()));
    }
    let clean = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    Ok(NewClient {
        name,
        email: clean(payload.email),
        phone: clean(payload.phone),
    })
}

// ============ Items ============

/// POST /items
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewItem>,
) -> Result<Json<Item>, AppError> {
    validate_item(&payload)?;
    let item = state.store.insert_item(&payload).await?;
    tracing::info!("Created item {} ({}, {})", item.id, item.name, item.item_type);
    Ok(Json(item))
}

/// GET /items
pub async fn list_items(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Item>>, AppError> {
    Ok(Json(state.store.list_items().await?))
}

/// GET /items/:id
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Item>, AppError> {
    state
        .store
        .get_item(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Item not found".to_string()))
}

fn validate_item(item: &NewItem) -> Result<(), AppError> {
    if item.name.trim().is_empty() {
        return Err(AppError::BadRequest("Item name is required".to_string()));
    }
    if item.item_type.trim().is_empty() {
        return Err(AppError::BadRequest("Item type is required".to_string()));
    }
    if !item.price.is_finite() || item.price < 0.0 {
        return Err(AppError::BadRequest(
            "Item price must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}

// ============ Purchases ============

/// POST /purchases
///
/// The total is computed here from the submitted lines and stored with the
/// purchase; it is not recomputed later even if catalog prices change.
pub async fn create_purchase(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewPurchase>,
) -> Result<Json<Purchase>, AppError> {
    validate_purchase_lines(&payload)?;

    if state.store.get_client(payload.client_id).await?.is_none() {
        return Err(AppError::NotFound("Client not found".to_string()));
    }
    for line in &payload.items {
        if state.store.get_item(line.item_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Item {} not found", line.item_id)));
        }
    }

    let total_amount = payload.total_amount();
    let purchase = state
        .store
        .insert_purchase(payload.client_id, total_amount, &payload.items)
        .await?;

    tracing::info!(
        "Created purchase {} for client {} ({} line(s), total {:.2})",
        purchase.id,
        purchase.client_id,
        payload.items.len(),
        purchase.total_amount
    );
    Ok(Json(purchase))
}

/// GET /purchases
pub async fn list_purchases(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PurchaseRead>>, AppError> {
    let rows = state.store.list_purchases().await?;
    Ok(Json(rows.into_iter().map(PurchaseRead::from).collect()))
}

fn validate_purchase_lines(payload: &NewPurchase) -> Result<(), AppError> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest(
            "A purchase needs at least one item".to_string(),
        ));
    }
    for line in &payload.items {
        if line.quantity <= 0 {
            return Err(AppError::BadRequest(format!(
                "Quantity for item {} must be positive",
                line.item_id
            )));
        }
        if !line.unit_price.is_finite() || line.unit_price < 0.0 {
            return Err(AppError::BadRequest(format!(
                "Unit price for item {} must be a non-negative number",
                line.item_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, unit_price: f64) -> NewPurchaseLine {
        NewPurchaseLine {
            item_id: 1,
            quantity,
            unit_price,
        }
    }

    #[test]
    fn purchase_lines_are_validated() {
        let ok = NewPurchase {
            client_id: 1,
            items: vec![line(1, 0.0)],
        };
        assert!(validate_purchase_lines(&ok).is_ok());

        for items in [
            vec![],
            vec![line(0, 1.0)],
            vec![line(-2, 1.0)],
            vec![line(1, -0.5)],
            vec![line(1, f64::NAN)],
        ] {
            let bad = NewPurchase {
                client_id: 1,
                items,
            };
            assert!(matches!(
                validate_purchase_lines(&bad),
                Err(AppError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn client_contacts_are_normalized() {
        let client = normalize_client(NewClient {
            name: "  Alice ".to_string(),
            email: Some(" ".to_string()),
            phone: Some(" 555-0100 ".to_string()),
        })
        .unwrap();
        assert_eq!(client.name, "Alice");
        assert_eq!(client.email, None);
        assert_eq!(client.phone.as_deref(), Some("555-0100"));

        assert!(normalize_client(NewClient {
            name: "   ".to_string(),
            email: None,
            phone: None,
        })
        .is_err());
    }

    #[test]
    fn item_price_must_be_non_negative() {
        let item = |price| NewItem {
            name: "Consulting".to_string(),
            item_type: "Service".to_string(),
            price,
        };
        assert!(validate_item(&item(0.0)).is_ok());
        assert!(validate_item(&item(-1.0)).is_err());
        assert!(validate_item(&item(f64::INFINITY)).is_err());
    }
}
