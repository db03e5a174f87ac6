use anyhow::{Context, Result};
use sales_pipeline::config::{DEFAULT_CONFIG_PATH, PipelineConfig, StoreKind};
use sales_pipeline::pipeline::PipelineRunner;
use sales_pipeline::source::CsvSource;
use sales_pipeline::storage::open_store;
use std::env;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

struct Args {
    config_path: String,
    report_only: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().skip(1).collect();
    let config_path = args
        .windows(2)
        .find(|pair| pair[0] == "--config" || pair[0] == "-c")
        .map(|pair| pair[1].clone())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let report_only = args.iter().any(|arg| arg == "--report-only" || arg == "-r");
    Args {
        config_path,
        report_only,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let args = parse_args();
    let config = PipelineConfig::load(&args.config_path)
        .with_context(|| format!("Failed to load pipeline configuration: {}", args.config_path))?;

    if args.report_only {
        info!("🚀 Starting Sales Pipeline (report only, reading stored tables)");
        if config.store.kind == StoreKind::Memory {
            warn!("Report-only mode with the memory store has no tables to read");
        }
    } else {
        info!(
            "🚀 Starting Sales Pipeline (source: {})",
            config.source.dir.display()
        );
    }

    let store = open_store(&config.store)
        .await
        .context("Failed to initialize table store")?;

    let runner = if args.report_only {
        PipelineRunner::report_only(config.clone(), store)?
    } else {
        let source = Arc::new(CsvSource::from_config(&config.source));
        PipelineRunner::new(config.clone(), source, store)?
    };

    let attempts = config.schedule.retries + 1;
    let mut attempt = 1;
    loop {
        match runner.run().await {
            Ok(summary) => {
                println!("{}", summary.to_json()?);
                return Ok(());
            }
            Err(failure) => {
                error!("❌ Attempt {}/{} failed: {}", attempt, attempts, failure);
                eprintln!("{}", failure.summary.to_json()?);
                if attempt >= attempts {
                    return Err(failure.into());
                }
                let delay = config.schedule.retry_delay();
                warn!("Retrying in {} seconds", delay.as_secs());
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
