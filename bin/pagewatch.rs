use std::sync::Arc;

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use pagewatch::{PriceOracle, RefreshScheduler, Settings, TokenAggregator};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    // Load configuration
    let settings = Settings::new()
        .context("Failed to load config.yaml. Please ensure it exists and is valid")?;

    let cancellation_token = CancellationToken::new();

    // Single shared oracle: every EVM chain wanting the ETH quote in the
    // same cycle coalesces onto one cached fetch.
    let oracle = Arc::new(
        PriceOracle::from_settings(&settings.oracle)
            .context("Failed to initialize price oracle")?,
    );

    let aggregator = Arc::new(
        TokenAggregator::from_settings(&settings, oracle)
            .context("Failed to initialize chain readers")?,
    );

    info!("Aggregator initialized with {} chain(s)", aggregator.chain_count());

    // Initial refresh so the view is populated before the first interval
    // elapses. A failed first cycle is not fatal; the scheduler retries.
    match aggregator.refresh().await {
        Ok(view) => {
            info!(
                "Initial view: price {}, market cap {}",
                view.weighted_price_usd
                    .map_or_else(|| "n/a".to_string(), |p| format!("${p:.4}")),
                view.market_cap_usd
                    .map_or_else(|| "n/a".to_string(), |c| format!("${c:.0}")),
            );
        },
        Err(e) => {
            error!("Initial refresh failed: {:#}", e);
        },
    }

    // Spawn the periodic refresh scheduler
    let scheduler = RefreshScheduler::new(aggregator.clone(), settings.refresh.clone());

    let scheduler_token = cancellation_token.child_token();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.run(scheduler_token).await {
            error!("Refresh scheduler failed: {:#}", e);
        }
    });

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    // Set up graceful shutdown signal handler
    info!("Pagewatch running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    // Cancel the scheduler and wait for it to stop
    info!("Finishing all tasks...");

    cancellation_token.cancel();

    let _ = scheduler_handle.await;

    info!("Shutdown complete");
    Ok(())
}
