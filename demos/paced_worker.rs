//! Paced worker demo
//!
//! Runs five items through a processor with `concurrency = 2` and
//! `work_ms = 1000`. Each unit takes 600ms, so every chunk is padded to one
//! second. Set `RUST_LOG=paced_work=debug` to see chunk dispatch logs.

use futures::StreamExt;
use paced_work::{PacedConfig, PacedWorkStream, TagCounter, Work};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let config = PacedConfig::new().with_concurrency(2).with_work_ms(1000);

    let processor = PacedWorkStream::new(config).with_work_fn(|item: u32, tags: &TagCounter| {
        let tags = tags.clone();
        Ok(Work::ready(async move {
            info!(item, "Begin");
            tokio::time::sleep(Duration::from_millis(600)).await;
            info!(item, "End");
            tags.count("workDone");
            Ok(item)
        }))
    });

    let mut events = processor.into_stream(futures::stream::iter(vec![11, 12, 21, 22, 31]));
    while let Some(event) = events.next().await {
        let event = event?;
        if let Some(counts) = event.tag_counts() {
            println!("{}", serde_json::to_string_pretty(counts)?);
        } else if let Some(item) = event.into_output() {
            info!(item, "forwarded");
        }
    }

    Ok(())
}
