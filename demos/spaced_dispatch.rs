//! Spaced dispatch demo
//!
//! Launches three lookups 250ms apart and prints the results in completion
//! order.

use paced_work::SpacedDispatcher;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let start = Instant::now();
    let mut dispatcher = SpacedDispatcher::default();
    for (name, cost_ms) in [("alpha", 400u64), ("beta", 50), ("gamma", 100)] {
        dispatcher = dispatcher.push(move || async move {
            info!(name, at_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX), "launched");
            tokio::time::sleep(Duration::from_millis(cost_ms)).await;
            Ok(format!("{} done after {}ms", name, cost_ms))
        });
    }

    let results = dispatcher.execute_ms(250).await?;
    for line in &results {
        println!("{}", line);
    }
    info!(elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX), "all operations settled");
    Ok(())
}
