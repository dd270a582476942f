use std::env;

use suluk_api::data::db::Database;
use suluk_api::data::store::{PgStore, Store};
use suluk_api::models::{NewClient, NewItem, NewPurchaseLine};

/// Integration smoke test for the PostgreSQL store.
/// Marked ignored to avoid running against a real database by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn purchase_history_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    db.ensure_schema().await?;
    let store = PgStore::new(db.pool.clone());

    let client = store
        .insert_client(&NewClient {
            name: "Smoke Test Client".to_string(),
            email: None,
            phone: None,
        })
        .await?;
    let item = store
        .insert_item(&NewItem {
            name: format!("Smoke Item {}", client.id),
            item_type: "Product".to_string(),
            price: 9.99,
        })
        .await?;

    let lines = [NewPurchaseLine {
        item_id: item.id,
        quantity: 2,
        unit_price: 7.5,
    }];
    let purchase = store.insert_purchase(client.id, 15.0, &lines).await?;
    assert_eq!(purchase.client_id, client.id);

    let history = store.purchase_history(client.id).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].lines.len(), 1);
    assert_eq!(history[0].lines[0].item_name.as_deref(), Some(item.name.as_str()));

    let listed = store.list_purchases().await?;
    assert!(listed
        .iter()
        .any(|row| row.id == purchase.id && row.client_name.as_deref() == Some("Smoke Test Client")));
    Ok(())
}
