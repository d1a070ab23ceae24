//! Basic Client Example
//!
//! Walks through every endpoint of the localization backend.
//!
//! Prerequisites:
//! - The localization backend running on 127.0.0.1:5000
//!
//! Run with:
//! ```sh
//! cargo run -p twitloc-sdk --example basic_client -- [SCREEN_NAME]
//! ```

use twitloc_core::format_count;
use twitloc_sdk::{Error, LocalizerClient};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let client = LocalizerClient::new("http://127.0.0.1:5000");
    let screen_name = std::env::args().nth(1).unwrap_or_else(|| "SRF".to_string());

    println!("=== twitloc SDK Basic Client Example ===\n");

    // Step 1: Metamodels
    println!("1. Listing metamodels...");
    let status = match client.metamodels().await {
        Ok(status) => status,
        Err(e) => {
            eprintln!("   Failed to reach the backend: {}", e);
            return Err(e);
        }
    };
    for (name, state) in status.iter() {
        println!("   {} -> {}", name, state.status);
    }

    // Step 2: Build the first offline metamodel, if any
    let offline = status
        .iter()
        .find(|(_, state)| !state.is_online())
        .map(|(name, _)| name.to_string());
    if let Some(name) = &offline {
        println!("\n2. Requesting build of {}...", name);
        match client.build_metamodel(name).await {
            Ok(()) => println!("   Build started"),
            Err(e) => println!("   Build refused: {}", e),
        }
    } else {
        println!("\n2. All metamodels are online, nothing to build");
    }

    // Step 3: Localize a user with the first online metamodel
    let online = status
        .iter()
        .find(|(_, state)| state.is_online())
        .map(|(name, _)| name.to_string());
    if let Some(name) = &online {
        println!("\n3. Localizing @{} with {}...", screen_name, name);
        client.localize(&screen_name, name).await?;
    } else {
        println!("\n3. No online metamodel, skipping localization");
    }

    // Step 4: Jobs
    println!("\n4. Localization jobs...");
    let buckets = client.localizations().await?;
    println!(
        "   complete: {}, pending: {}, failed: {}",
        buckets.complete.len(),
        buckets.pending.len(),
        buckets.failed.len()
    );

    // Step 5: Statistics
    println!("\n5. Dataset statistics...");
    let stats = client.statistics().await?;
    for (label, value) in stats.counters() {
        println!("   {}: {}", label, format_count(value));
    }

    println!("\n=== Example completed successfully ===");
    Ok(())
}
