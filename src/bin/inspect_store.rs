use anyhow::{Context, Result};
use sales_pipeline::config::{DEFAULT_CONFIG_PATH, PipelineConfig};
use sales_pipeline::processor::table_codec::tables;
use sales_pipeline::storage::open_store;
use std::env;
use tracing_subscriber::EnvFilter;

/// Prints the row count of every persisted table, and optionally the head of one.
///
/// Usage: inspect_store [--config <path>] [--show <table>]
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let flag = |name: &str| {
        args.windows(2)
            .find(|pair| pair[0] == name)
            .map(|pair| pair[1].clone())
    };
    let config_path = flag("--config").unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = PipelineConfig::load(&config_path)
        .with_context(|| format!("Failed to load pipeline configuration: {}", config_path))?;
    let store = open_store(&config.store).await?;

    println!("Store: {:?}", config.store.kind);
    for table in tables::PERSISTED {
        let count = store
            .count(table)
            .await
            .with_context(|| format!("Failed to read table {}", table))?;
        println!("  {:<26} {:>8} rows", table, count);
    }

    if let Some(table) = flag("--show") {
        let df = store.read(&table).await?;
        println!("\n{}", df.head(Some(10)));
    }

    Ok(())
}
