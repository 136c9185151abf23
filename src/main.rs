use std::io::BufRead;

use anyhow::Result;
use worklens::{ClassificationEngine, EngineConfig};

/// Classify observations from stdin, one `"app: title"` line per sample.
/// Mostly useful for poking at the strategy chain by hand.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut engine = ClassificationEngine::from_env(EngineConfig::default())?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let label = engine.classify(&line).await;
        println!("{}\t{}", if label { "productive" } else { "unproductive" }, line);
    }

    Ok(())
}
