use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use auction_poller::config::Config;
use auction_poller::context::PollContext;
use auction_poller::poll::client::{HttpPollSource, PollSource};
use auction_poller::poll::types::ListingId;
use auction_poller::{app, metrics, visibility};

/// Visibility transitions are rare; a small buffer is plenty.
const VISIBILITY_CHANNEL_BUFFER: usize = 16;

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    if let Some(addr) = config.metrics_addr {
        metrics::init_metrics_server(addr)?;
        info!(%addr, "metrics exporter listening");
    }

    info!(
        base_url = %config.base_url,
        product_id = ?config.product_id,
        interval_ms = config.poll.interval.as_millis() as u64,
        "auction-poller starting"
    );

    let ctx = PollContext::new(config.labels.clone(), config.poll.clone());
    let source: Arc<dyn PollSource> =
        Arc::new(HttpPollSource::new(config.base_url.clone(), config.request_timeout)?);

    let (visibility_tx, visibility_rx) = mpsc::channel(VISIBILITY_CHANNEL_BUFFER);
    tokio::spawn(async move {
        if let Err(err) = visibility::read_stdin_visibility(visibility_tx).await {
            warn!(error = %err, "stopped reading visibility commands");
        }
    });

    match config.product_id {
        Some(id) => app::run_detail(ctx, source, ListingId(id), visibility_rx).await,
        None => app::run_list(ctx, source, config.lang, visibility_rx).await,
    }
}
