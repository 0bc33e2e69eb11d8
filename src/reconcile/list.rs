use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::metrics::prometheus::record_reload;
use crate::poll::client::{PollError, PollSource};
use crate::poll::poller::PollCycle;
use crate::poll::types::{ListPollResponse, ListingId, ListingSnapshot};
use crate::state::card::{ActionControl, CardState, ResultArea};
use crate::state::listing_cache::ListingCache;
use crate::view::ListView;
use crate::view::patch::ListPatch;

/// Patches for one card, and whether its status controls were rebuilt.
#[derive(Debug, Default, PartialEq)]
pub struct CardDiff {
    pub patches: Vec<ListPatch>,
    pub rebuilt: bool,
}

/// Project (last-known card, new snapshot) into the patches that bring the
/// card up to date. Fields equal to the baseline produce nothing.
pub fn diff_card(card: &CardState, new: &ListingSnapshot) -> CardDiff {
    let id = &new.id;
    let mut diff = CardDiff::default();

    if new.current_price != card.price {
        diff.patches.push(ListPatch::SetPrice {
            id: id.clone(),
            price: new.current_price,
        });
        diff.patches.push(ListPatch::HighlightPrice { id: id.clone() });
    }

    if new.bids_count != card.bids_count {
        diff.patches.push(ListPatch::SetBidCount {
            id: id.clone(),
            count: new.bids_count,
        });
    }

    // The rendered control can disagree with the cached status, so both
    // are checked.
    let action = ActionControl::for_status(new.status);
    diff.rebuilt = new.status != card.status || card.action != action;
    if diff.rebuilt {
        if new.status != card.status {
            diff.patches.push(ListPatch::SetStatus {
                id: id.clone(),
                status: new.status,
            });
        }
        diff.patches.push(ListPatch::ReplaceAction {
            id: id.clone(),
            action,
        });
    }

    // Checked on every poll, not only on status change, so late bidder
    // updates still land.
    let result = ResultArea::for_listing(
        new.status,
        new.highest_bidder_id.as_deref(),
        new.winner_name.as_deref(),
    );
    if diff.rebuilt || card.result != result {
        let bidder_changed =
            !diff.rebuilt && card.result.is_highest_bidder() && result.is_highest_bidder();
        diff.patches.push(ListPatch::ReplaceResult {
            id: id.clone(),
            result,
        });
        if bidder_changed {
            diff.patches.push(ListPatch::HighlightResult { id: id.clone() });
        }
    }

    if let Some(end_time) = &new.end_time {
        if card.end_time.as_ref() != Some(end_time) {
            diff.patches.push(ListPatch::SetEndTime {
                id: id.clone(),
                end_time: end_time.clone(),
            });
        }
    }

    diff
}

/// Overwrite the baseline so the next poll diffs against this snapshot.
fn store_baseline(card: &mut CardState, new: &ListingSnapshot) {
    card.price = new.current_price;
    card.bids_count = new.bids_count;
    card.status = new.status;
    card.winner = new.winner_name.clone();
    if let Some(end_time) = &new.end_time {
        card.end_time = Some(end_time.clone());
    }
    card.action = ActionControl::for_status(new.status);
    card.result = ResultArea::for_listing(
        new.status,
        new.highest_bidder_id.as_deref(),
        new.winner_name.as_deref(),
    );
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListReport {
    pub patches: usize,
    pub changed_cards: usize,
    /// Listings in the snapshot with no card on the page.
    pub missing: Vec<ListingId>,
}

/// Reconciles the listing page against `GET /api/products/poll/`.
pub struct ListCycle<V> {
    source: Arc<dyn PollSource>,
    view: V,
    cards: ListingCache,
    status_counts: BTreeMap<String, u64>,
    reload_delay: Duration,
}

impl<V: ListView> ListCycle<V> {
    pub fn new(source: Arc<dyn PollSource>, view: V, cards: ListingCache, reload_delay: Duration) -> Self {
        Self {
            source,
            view,
            cards,
            status_counts: BTreeMap::new(),
            reload_delay,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn cards(&self) -> &ListingCache {
        &self.cards
    }

    pub fn reconcile(&mut self, response: ListPollResponse) -> ListReport {
        let mut report = ListReport::default();
        let mut refresh_filters = false;

        for snapshot in &response.products {
            let Some(card) = self.cards.get_card_mut(&snapshot.id) else {
                report.missing.push(snapshot.id.clone());
                continue;
            };

            let diff = diff_card(card, snapshot);
            store_baseline(card, snapshot);

            if diff.patches.is_empty() {
                continue;
            }
            report.changed_cards += 1;
            refresh_filters |= diff.rebuilt;
            for patch in &diff.patches {
                self.view.apply(patch);
            }
            report.patches += diff.patches.len();
        }

        if refresh_filters {
            self.emit(&mut report, ListPatch::RefreshFilters);
        }

        if !report.missing.is_empty() {
            warn!(
                missing = report.missing.len(),
                first = %report.missing[0],
                "listings missing from page, scheduling full reload"
            );
            record_reload();
            let delay = self.reload_delay;
            self.emit(&mut report, ListPatch::ScheduleReload { delay });
        }

        for (status, count) in response.status_counts {
            if self.status_counts.get(&status) == Some(&count) {
                continue;
            }
            self.status_counts.insert(status.clone(), count);
            self.emit(&mut report, ListPatch::SetStatusCount { status, count });
        }

        debug!(
            listings = response.products.len(),
            changed = report.changed_cards,
            patches = report.patches,
            "list reconciled"
        );
        report
    }

    fn emit(&mut self, report: &mut ListReport, patch: ListPatch) {
        self.view.apply(&patch);
        report.patches += 1;
    }
}

#[async_trait]
impl<V: ListView + Sync + 'static> PollCycle for ListCycle<V> {
    type Response = ListPollResponse;

    fn name(&self) -> &'static str {
        "list"
    }

    async fn fetch(&self) -> Result<ListPollResponse, PollError> {
        self.source.poll_listings().await
    }

    fn apply(&mut self, response: ListPollResponse) {
        self.reconcile(response);
    }
}
