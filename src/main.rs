use std::sync::Arc;

use clap::Parser;
use graphite_bridge::cli::Args;
use graphite_bridge::{BridgeBuilder, ProcessCollector, Registry, TracingLogger};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = args.resolve_config()?;

    let registry = Arc::new(Registry::new());
    registry.register(Arc::new(ProcessCollector::new()));

    let bridge = Arc::new(
        BridgeBuilder::from_config(config)
            .gatherer(registry)
            .logger(Arc::new(TracingLogger))
            .build()?,
    );

    if args.once {
        let stats = bridge.push().await?;
        info!(
            families = stats.families,
            lines = stats.lines,
            bytes = stats.bytes,
            "push complete"
        );
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let cancel = cancel.clone();
        async move { bridge.run(cancel).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("received SIGINT, stopping push loop");
    cancel.cancel();
    runner.await?;

    Ok(())
}
