use anyhow::Result;
use bucketmerge::{
    config::{Args, MergeConfig},
    merge,
};
use clap::Parser;
use std::env;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    // RUST_LOG wins; otherwise LOG_LEVEL (default info)
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::default().add_directive(log_level.parse().unwrap_or(Level::INFO.into()))
    });
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    // ─── 2) resolve locations ────────────────────────────────────────
    let config = MergeConfig::from_args(Args::parse());
    info!(
        source = %format!("{}/{}", config.source.container, config.source.prefix),
        destination = %format!("{}/{}", config.destination.container, config.destination.prefix),
        "startup"
    );

    // ─── 3) list → group → merge ─────────────────────────────────────
    let summary = merge::run(&config).await?;
    for month in &summary.months {
        info!(
            month = %month.month,
            output = %month.output_key,
            objects = month.source_objects,
            rows = month.rows,
            bytes = month.bytes,
            "wrote merged file"
        );
    }

    info!("all done");
    Ok(())
}
