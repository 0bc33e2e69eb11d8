use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::context::PollContext;
use crate::poll::client::PollSource;
use crate::poll::poller::Poller;
use crate::poll::types::{DetailPollResponse, ListingId};
use crate::reconcile::detail::DetailCycle;
use crate::reconcile::list::ListCycle;
use crate::state::listing_cache::ListingCache;
use crate::view::Traced;
use crate::view::detail_page::DetailPage;
use crate::view::list_page::ListPage;
use crate::visibility::{Visibility, on_visibility};

/// The detail template shows the price in the header and next to the bid form.
const DETAIL_PRICE_DISPLAYS: usize = 2;
const DETAIL_BID_COUNT_DISPLAYS: usize = 1;

type ListPoller = Poller<ListCycle<Traced<ListPage>>>;
type DetailPoller = Poller<DetailCycle<Traced<DetailPage>>>;

/// "Page load": fetch the listing page as the server would render it and
/// build a poller whose baseline is that page.
async fn load_list_page(
    ctx: &PollContext,
    source: &Arc<dyn PollSource>,
    lang: &str,
    reload_tx: mpsc::UnboundedSender<Duration>,
) -> Result<ListPoller> {
    let initial = source
        .poll_listings()
        .await
        .context("failed to load listing page")?;
    if let Some(timestamp) = &initial.timestamp {
        ctx.clock.sync(timestamp);
    }

    let page = ListPage::rendered(&initial.products, ctx.labels.clone(), lang)
        .with_reload_signal(reload_tx);
    info!(listings = page.card_count(), "listing page loaded");

    let cycle = ListCycle::new(
        source.clone(),
        Traced::new("list", page),
        ListingCache::rendered(&initial.products),
        ctx.settings.reload_delay,
    );
    Ok(Poller::new(cycle, ctx))
}

pub async fn run_list(
    ctx: PollContext,
    source: Arc<dyn PollSource>,
    lang: String,
    visibility_rx: mpsc::Receiver<Visibility>,
) -> Result<()> {
    drive_list(&ctx, &source, &lang, visibility_rx, shutdown_signal()).await
}

async fn drive_list(
    ctx: &PollContext,
    source: &Arc<dyn PollSource>,
    lang: &str,
    mut visibility_rx: mpsc::Receiver<Visibility>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();
    let mut poller = load_list_page(ctx, source, lang, reload_tx.clone()).await?;
    let mut visible = true;
    poller.start();

    let reload = tokio::time::sleep(Duration::ZERO);
    let mut reload_pending = false;
    tokio::pin!(reload, shutdown);

    loop {
        tokio::select! {
            Some(visibility) = visibility_rx.recv() => {
                visible = visibility == Visibility::Visible;
                on_visibility(&mut poller, visibility);
            }
            Some(delay) = reload_rx.recv() => {
                if !reload_pending {
                    reload.as_mut().reset(Instant::now() + delay);
                    reload_pending = true;
                }
            }
            () = &mut reload, if reload_pending => {
                reload_pending = false;
                poller.stop();
                match load_list_page(ctx, source, lang, reload_tx.clone()).await {
                    Ok(reloaded) => poller = reloaded,
                    Err(err) => {
                        warn!(error = %format!("{err:#}"), "reload failed, retrying");
                        reload.as_mut().reset(Instant::now() + ctx.settings.reload_delay);
                        reload_pending = true;
                    }
                }
                if visible {
                    poller.start();
                }
            }
            () = &mut shutdown => break,
        }
    }

    poller.stop();
    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the handler can't be installed.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl-C, shutting down"),
        Err(err) => {
            warn!(error = %err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

/// Poller for one listing's detail page, baselined on `initial`.
fn detail_poller(
    ctx: &PollContext,
    source: Arc<dyn PollSource>,
    listing: ListingId,
    initial: &DetailPollResponse,
) -> DetailPoller {
    let limit = ctx.settings.history_limit;
    let page = DetailPage::rendered(
        ctx.labels.clone(),
        DETAIL_PRICE_DISPLAYS,
        DETAIL_BID_COUNT_DISPLAYS,
        initial,
        limit,
    );
    let cycle = DetailCycle::rendered(listing, source, Traced::new("detail", page), limit, initial);
    Poller::new(cycle, ctx)
}

pub async fn run_detail(
    ctx: PollContext,
    source: Arc<dyn PollSource>,
    listing: ListingId,
    mut visibility_rx: mpsc::Receiver<Visibility>,
) -> Result<()> {
    let initial = source
        .poll_listing(&listing)
        .await
        .with_context(|| format!("failed to load detail page for listing {listing}"))?;
    if let Some(timestamp) = &initial.timestamp {
        ctx.clock.sync(timestamp);
    }
    info!(listing_id = %listing, bids = initial.bids.len(), "detail page loaded");

    let mut poller = detail_poller(&ctx, source, listing, &initial);
    poller.start();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            Some(visibility) = visibility_rx.recv() => on_visibility(&mut poller, visibility),
            () = &mut shutdown => break,
        }
    }

    poller.stop();
    info!(
        server_time = %ctx.clock.now(),
        clock_offset_ms = ctx.clock.offset_ms(),
        "detail polling stopped"
    );
    Ok(())
}
