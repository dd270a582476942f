//! Shared fixtures: an in-memory store and application state builders.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};
use suluk_api::config::Config;
use suluk_api::errors::AppError;
use suluk_api::handlers::AppState;
use suluk_api::models::{
    Client, Item, NewClient, NewItem, NewPurchaseLine, Purchase, PurchaseDetail, PurchaseLine,
    PurchaseListRow,
};
use suluk_api::ollama_client::OllamaClient;
use suluk_api::routes::build_router;
use suluk_api::store::Store;

pub const TEST_TOKEN: &str = "test-token";

/// Row of the `purchase_items` table as the in-memory store keeps it.
#[derive(Debug, Clone)]
struct PurchaseItem {
    id: i64,
    purchase_id: i64,
    item_id: i64,
    quantity: i32,
    unit_price: f64,
}

#[derive(Default)]
struct Tables {
    clients: Vec<Client>,
    items: Vec<Item>,
    purchases: Vec<Purchase>,
    purchase_items: Vec<PurchaseItem>,
}

/// `Store` backed by vectors, for driving the router without PostgreSQL.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a purchase with an explicit timestamp and no referential checks.
    pub fn seed_purchase(
        &self,
        client_id: i64,
        created_at: DateTime<Utc>,
        lines: &[NewPurchaseLine],
    ) -> Purchase {
        let mut tables = self.tables.lock().unwrap();
        let total_amount = lines
            .iter()
            .map(|l| f64::from(l.quantity) * l.unit_price)
            .sum();
        let purchase = Purchase {
            id: tables.purchases.len() as i64 + 1,
            client_id,
            total_amount,
            created_at,
        };
        tables.purchases.push(purchase.clone());
        for line in lines {
            let id = tables.purchase_items.len() as i64 + 1;
            tables.purchase_items.push(PurchaseItem {
                id,
                purchase_id: purchase.id,
                item_id: line.item_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }
        purchase
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_client(&self, new: &NewClient) -> Result<Client, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let client = Client {
            id: tables.clients.len() as i64 + 1,
            name: new.name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            created_at: Utc::now(),
        };
        tables.clients.push(client.clone());
        Ok(client)
    }

    async fn list_clients(&self) -> Result<Vec<Client>, AppError> {
        Ok(self.tables.lock().unwrap().clients.clone())
    }

    async fn get_client(&self, id: i64) -> Result<Option<Client>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.clients.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_item(&self, new: &NewItem) -> Result<Item, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let item = Item {
            id: tables.items.len() as i64 + 1,
            name: new.name.clone(),
            item_type: new.item_type.clone(),
            price: new.price,
            created_at: Utc::now(),
        };
        tables.items.push(item.clone());
        Ok(item)
    }

    async fn list_items(&self) -> Result<Vec<Item>, AppError> {
        Ok(self.tables.lock().unwrap().items.clone())
    }

    async fn get_item(&self, id: i64) -> Result<Option<Item>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.items.iter().find(|i| i.id == id).cloned())
    }

    async fn insert_purchase(
        &self,
        client_id: i64,
        total_amount: f64,
        lines: &[NewPurchaseLine],
    ) -> Result<Purchase, AppError> {
        let mut purchase = self.seed_purchase(client_id, Utc::now(), lines);
        let mut tables = self.tables.lock().unwrap();
        if let Some(stored) = tables.purchases.iter_mut().find(|p| p.id == purchase.id) {
            stored.total_amount = total_amount;
        }
        purchase.total_amount = total_amount;
        Ok(purchase)
    }

    async fn list_purchases(&self) -> Result<Vec<PurchaseListRow>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .purchases
            .iter()
            .map(|p| PurchaseListRow {
                id: p.id,
                client_id: p.client_id,
                total_amount: p.total_amount,
                created_at: p.created_at,
                client_name: tables
                    .clients
                    .iter()
                    .find(|c| c.id == p.client_id)
                    .map(|c| c.name.clone()),
            })
            .collect())
    }

    async fn purchase_history(&self, client_id: i64) -> Result<Vec<PurchaseDetail>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .purchases
            .iter()
            .filter(|p| p.client_id == client_id)
            .map(|p| PurchaseDetail {
                purchase: p.clone(),
                lines: tables
                    .purchase_items
                    .iter()
                    .filter(|pi| pi.purchase_id == p.id)
                    .map(|pi| PurchaseLine {
                        quantity: pi.quantity,
                        item_name: tables
                            .items
                            .iter()
                            .find(|i| i.id == pi.item_id)
                            .map(|i| i.name.clone()),
                    })
                    .collect(),
            })
            .collect())
    }
}

pub fn test_config(ollama_base_url: &str) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 8080,
        api_token: TEST_TOKEN.to_string(),
        ollama_base_url: ollama_base_url.to_string(),
        ollama_default_model: "gpt-oss:20b".to_string(),
        ollama_timeout_secs: 5,
        ollama_models_timeout_secs: 1,
        cors_allowed_origins: Vec::new(),
    }
}

pub fn test_app(store: Arc<MemoryStore>, ollama_base_url: &str) -> Router {
    let config = test_config(ollama_base_url);
    let ollama = OllamaClient::new(
        config.ollama_base_url.clone(),
        config.ollama_default_model.clone(),
        Duration::from_secs(config.ollama_timeout_secs),
        Duration::from_secs(config.ollama_models_timeout_secs),
    )
    .expect("ollama client");
    let state = Arc::new(AppState {
        store,
        config,
        ollama,
    });
    build_router(state, false).expect("router")
}

/// Base URL of a port that refuses connections.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
