//! Basic request example.
//!
//! This example shows how to:
//! - Build a client from a configuration
//! - Send a named request with retries
//! - Decode a JSON response
//! - Cancel a request that would otherwise keep retrying
//!
//! Run with: cargo run --example basic_request

use httpbridge::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "httpbridge=debug".into()),
        )
        .init();

    println!("=== Basic Request Example ===\n");

    let client = HttpClient::new(
        ClientConfig::new()
            .with_base_url("https://httpbin.org")
            .with_timeout(Duration::from_secs(10)),
    )?;

    let cancel = CancellationToken::new();

    let opts = RequestOptions::new()
        .name("httpbin get")
        .query("hello", "world")
        .retries(3)
        .retry_wait(Duration::from_millis(200), Duration::from_secs(2));

    match client.request(&cancel, "/get", &opts).await {
        Ok(response) => {
            let body: serde_json::Value = response.json()?;
            println!("Status: {}", response.status);
            println!("Echoed args: {}", body["args"]);
        }
        Err(e) => println!("Request failed: {e}"),
    }

    println!("\n=== Cancelling an endless retry ===\n");

    let opts = RequestOptions::new()
        .name("always 503")
        .infinite_retry(true)
        .retry_wait(Duration::from_millis(200), Duration::from_secs(1));

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        canceller.cancel();
    });

    match client.request(&cancel, "/status/503", &opts).await {
        Ok(_) => println!("Unexpected success"),
        Err(e) => {
            println!("Stopped after {} failed attempts", e.errors().len());
            println!("Cancelled: {}", e.is_cancelled());
        }
    }

    Ok(())
}
