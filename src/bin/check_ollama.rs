//! Utility to check that the configured inference server is reachable.

use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Queries the model catalog endpoint and prints the status and the start of
/// the body.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let base_url =
        env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));

    println!("Checking {}...", url);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    match client.get(&url).send().await {
        Ok(response) => {
            println!("Status: {}", response.status());
            let body = response.text().await?;
            let preview: String = body.chars().take(100).collect();
            println!("Response: {}...", preview);
        }
        Err(e) => println!("Error: {}", e),
    }

    Ok(())
}
