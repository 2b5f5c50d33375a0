//! Circuit breaker example demonstrating per-endpoint resilience.
//!
//! This example shows how to:
//! - Enable circuit breakers on a client
//! - Watch a failing endpoint trip its breaker while others keep working
//! - Recover through the half-open trial call
//! - Inspect breaker metrics
//!
//! Run with: cargo run --example with_circuit_breaker

use httpbridge::prelude::*;
use httpbridge::transport::{MockReply, MockTransport};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Circuit Breaker Example ===\n");

    let transport = Arc::new(
        MockTransport::new().with_route("http://inventory.local/stock", MockReply::status(503)),
    );

    let config = ClientConfig::new()
        .with_base_url("http://inventory.local")
        .with_circuit_breaker(true)
        .with_circuit_breaker_failures(3)
        .with_circuit_breaker_timeout(Duration::from_secs(2));

    let client = HttpClient::with_transport(config, transport.clone())?;
    let cancel = CancellationToken::new();

    println!("Sending requests to trigger the breaker for /stock...\n");

    for i in 1..=5 {
        match client.get(&cancel, "/stock").await {
            Ok(_) => println!("Request #{i}: success"),
            Err(e) if e.is_circuit_open() => println!("Request #{i}: rejected, {e}"),
            Err(e) => println!("Request #{i}: failed, {e}"),
        }
    }

    println!(
        "\nTransport saw {} calls to /stock",
        transport.calls_for("http://inventory.local/stock")
    );

    match client.get(&cancel, "/prices").await {
        Ok(resp) => println!("/prices is unaffected: status {}", resp.status),
        Err(e) => println!("/prices failed: {e}"),
    }

    println!("\nWaiting for the breaker to admit a trial call...");
    tokio::time::sleep(Duration::from_millis(2100)).await;

    transport.add_route("http://inventory.local/stock", MockReply::with_body(200, "42"));
    let resp = client.get(&cancel, "/stock").await?;
    println!("Trial call succeeded: {}", resp.text());

    for (endpoint, state) in client.breakers().states() {
        println!("{endpoint}: {}", state.name());
    }
    if let Some(breaker) = client.breakers().get("http://inventory.local/stock") {
        println!("Metrics: {:?}", breaker.metrics());
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
