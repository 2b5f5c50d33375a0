//! Fan-out example.
//!
//! This example shows how to:
//! - Send one request to several backends at once
//! - Read partial results and per-client failures
//! - Retry only the backends that failed
//!
//! Run with: cargo run --example fanout

use httpbridge::prelude::*;
use httpbridge::transport::{MockReply, MockTransport};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Fan-out Example ===\n");

    let transports: Vec<Arc<MockTransport>> = (0..3)
        .map(|i| {
            let reply = if i == 1 {
                MockReply::with_body(500, r#"{"error":"replica lagging"}"#)
            } else {
                MockReply::with_body(200, format!("replica-{i} ok"))
            };
            Arc::new(MockTransport::new().with_default_reply(reply))
        })
        .collect();

    let mut set = ClientSet::default();
    let mut next = transports.iter();
    set.add_with(
        (0..3).map(|i| ClientConfig::new().with_base_url(format!("http://replica-{i}.local"))),
        |config| {
            let transport = next
                .next()
                .cloned()
                .ok_or_else(|| HttpError::configuration("no transport left"))?;
            HttpClient::with_transport(config, transport)
        },
    )?;

    let cancel = CancellationToken::new();

    let fanout = set.post(&cancel, "/events", serde_json::json!({"kind": "deploy"})).await;
    for (index, response) in &fanout.responses {
        println!("client {index}: {}", response.text());
    }
    if let Some(err) = &fanout.error {
        println!("failures:\n{err}");
    }
    println!("broken clients: {:?}", set.broken());

    println!("\nReplica 1 recovers; retrying only the broken clients...");
    transports[1].set_default_reply(MockReply::with_body(200, "replica-1 ok"));

    if let Some(broken) = set.use_broken() {
        let fanout = broken.post(&cancel, "/events", serde_json::json!({"kind": "deploy"})).await;
        println!("retried {} client(s), complete: {}", fanout.responses.len(), fanout.is_complete());
    }
    println!("broken clients: {:?}", set.broken());

    println!("\n=== Example Complete ===");
    Ok(())
}
