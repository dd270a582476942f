//! Data access for clients, catalog items and purchases.
//!
//! Handlers talk to the [`Store`] trait; [`PgStore`] is the PostgreSQL backend
//! used by the server binary.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::errors::{AppError, ResultExt};
use crate::models::{
    Client, Item, NewClient, NewItem, NewPurchaseLine, Purchase, PurchaseDetail, PurchaseLine,
    PurchaseListRow,
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_client(&self, new: &NewClient) -> Result<Client, AppError>;
    async fn list_clients(&self) -> Result<Vec<Client>, AppError>;
    async fn get_client(&self, id: i64) -> Result<Option<Client>, AppError>;

    async fn insert_item(&self, new: &NewItem) -> Result<Item, AppError>;
    async fn list_items(&self) -> Result<Vec<Item>, AppError>;
    async fn get_item(&self, id: i64) -> Result<Option<Item>, AppError>;

    /// Stores a purchase and its lines atomically.
    ///
    /// `total_amount` is taken as given; callers compute it from `lines`.
    async fn insert_purchase(
        &self,
        client_id: i64,
        total_amount: f64,
        lines: &[NewPurchaseLine],
    ) -> Result<Purchase, AppError>;
    async fn list_purchases(&self) -> Result<Vec<PurchaseListRow>, AppError>;

    /// All purchases of a client ordered by id, each with its lines resolved
    /// against the current catalog.
    async fn purchase_history(&self, client_id: i64) -> Result<Vec<PurchaseDetail>, AppError>;
}

/// PostgreSQL implementation of [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_client(&self, new: &NewClient) -> Result<Client, AppError> {
        sqlx::query_as::<_, Client>(
            "INSERT INTO clients (name, email, phone) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .fetch_one(&self.pool)
        .await
        .context("insert client")
    }

    async fn list_clients(&self) -> Result<Vec<Client>, AppError> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("list clients")
    }

    async fn get_client(&self, id: i64) -> Result<Option<Client>, AppError> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("get client {}", id))
    }

    async fn insert_item(&self, new: &NewItem) -> Result<Item, AppError> {
        sqlx::query_as::<_, Item>(
            "INSERT INTO items (name, item_type, price) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&new.name)
        .bind(&new.item_type)
        .bind(new.price)
        .fetch_one(&self.pool)
        .await
        .context("insert item")
    }

    async fn list_items(&self) -> Result<Vec<Item>, AppError> {
        sqlx::query_as::<_, Item>("SELECT * FROM items ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("list items")
    }

    async fn get_item(&self, id: i64) -> Result<Option<Item>, AppError> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("get item {}", id))
    }

    async fn insert_purchase(
        &self,
        client_id: i64,
        total_amount: f64,
        lines: &[NewPurchaseLine],
    ) -> Result<Purchase, AppError> {
        let mut tx = self.pool.begin().await.context("begin purchase")?;

        let purchase = sqlx::query_as::<_, Purchase>(
            "INSERT INTO purchases (client_id, total_amount) VALUES ($1, $2) RETURNING *",
        )
        .bind(client_id)
        .bind(total_amount)
        .fetch_one(&mut *tx)
        .await
        .context("insert purchase")?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO purchase_items (purchase_id, item_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(purchase.id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("insert line for item {}", line.item_id))?;
        }

        tx.commit().await.context("commit purchase")?;
        Ok(purchase)
    }

    async fn list_purchases(&self) -> Result<Vec<PurchaseListRow>, AppError> {
        sqlx::query_as::<_, PurchaseListRow>(
            r#"
            SELECT p.id, p.client_id, p.total_amount, p.created_at, c.name AS client_name
            FROM purchases p
            LEFT JOIN clients c ON c.id = p.client_id
            ORDER BY p.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("list purchases")
    }

    async fn purchase_history(&self, client_id: i64) -> Result<Vec<PurchaseDetail>, AppError> {
        let purchases = sqlx::query_as::<_, Purchase>(
            "SELECT * FROM purchases WHERE client_id = $1 ORDER BY id",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("purchases of client {}", client_id))?;

        if purchases.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = purchases.iter().map(|p| p.id).collect();
        let rows = sqlx::query_as::<_, (i64, i32, Option<String>)>(
            r#"
            SELECT pi.purchase_id, pi.quantity, i.name
            FROM purchase_items pi
            LEFT JOIN items i ON i.id = pi.item_id
            WHERE pi.purchase_id = ANY($1)
            ORDER BY pi.id
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("purchase lines of client {}", client_id))?;

        let mut lines_by_purchase: HashMap<i64, Vec<PurchaseLine>> = HashMap::new();
        for (purchase_id, quantity, item_name) in rows {
            lines_by_purchase
                .entry(purchase_id)
                .or_default()
                .push(PurchaseLine {
                    quantity,
                    item_name,
                });
        }

        Ok(purchases
            .into_iter()
            .map(|purchase| {
                let lines = lines_by_purchase.remove(&purchase.id).unwrap_or_default();
                PurchaseDetail { purchase, lines }
            })
            .collect())
    }
}
