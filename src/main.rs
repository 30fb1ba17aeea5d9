use anyhow::Context;
use dora_metrics::{AppConfig, MetricsQuerier};
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real deployments set variables directly.
    dotenvy::dotenv().ok();

    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dora_metrics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let querier = MetricsQuerier::new(config)?;

    let report = match querier.run().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("metrics run failed: {e}");
            std::process::exit(1);
        }
    };

    let json = serde_json::to_string(&report)?;
    println!("{json}");

    // Inside GitHub Actions, expose the document to later workflow steps.
    if let Ok(env_file) = std::env::var("GITHUB_ENV") {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&env_file)
            .with_context(|| format!("failed to open GITHUB_ENV file {env_file}"))?;
        writeln!(file, "metrics={json}")?;
        tracing::info!("exported metrics to GITHUB_ENV");
    }

    Ok(())
}
