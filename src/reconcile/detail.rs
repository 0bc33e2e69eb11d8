use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::poll::client::{PollError, PollSource};
use crate::poll::poller::PollCycle;
use crate::poll::types::{BidId, DetailPollResponse, ListingId};
use crate::view::DetailView;
use crate::view::format::floor_price;
use crate::view::patch::{BidRow, DetailPatch};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DetailReport {
    pub patches: usize,
    pub new_bids: usize,
}

/// Reconciles one listing's detail page against
/// `GET /api/products/{id}/poll/`.
pub struct DetailCycle<V> {
    listing: ListingId,
    source: Arc<dyn PollSource>,
    view: V,
    history_limit: usize,
    last_price: Option<i64>,
    last_bids_count: Option<u64>,
    last_bidder: Option<Option<String>>,
    /// Replaced, not merged, on every applied poll.
    seen_bids: HashSet<BidId>,
}

impl<V: DetailView> DetailCycle<V> {
    /// Cycle with no baseline; the first poll fills everything in.
    pub fn new(listing: ListingId, source: Arc<dyn PollSource>, view: V, history_limit: usize) -> Self {
        Self {
            listing,
            source,
            view,
            history_limit,
            last_price: None,
            last_bids_count: None,
            last_bidder: None,
            seen_bids: HashSet::new(),
        }
    }

    /// Cycle whose baseline is the response the page was rendered from.
    pub fn rendered(
        listing: ListingId,
        source: Arc<dyn PollSource>,
        view: V,
        history_limit: usize,
        response: &DetailPollResponse,
    ) -> Self {
        let mut cycle = Self::new(listing, source, view, history_limit);
        cycle.last_price = Some(floor_price(response.product.current_price));
        cycle.last_bids_count = Some(response.product.bids_count.unwrap_or(0));
        cycle.last_bidder = Some(highest_bidder(response));
        cycle.seen_bids = response.bids.iter().map(|bid| bid.id.clone()).collect();
        cycle
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn seen_bids(&self) -> &HashSet<BidId> {
        &self.seen_bids
    }

    pub fn reconcile(&mut self, response: DetailPollResponse) -> DetailReport {
        let mut report = DetailReport::default();

        let price = floor_price(response.product.current_price);
        if self.last_price != Some(price) {
            self.last_price = Some(price);
            self.emit(&mut report, DetailPatch::SetPrice {
                price: response.product.current_price,
            });
        }

        let count = response.product.bids_count.unwrap_or(0);
        if self.last_bids_count != Some(count) {
            self.last_bids_count = Some(count);
            self.emit(&mut report, DetailPatch::SetBidCount { count });
        }

        let bidder = highest_bidder(&response);
        if self.last_bidder.as_ref() != Some(&bidder) {
            self.last_bidder = Some(bidder.clone());
            self.emit(&mut report, DetailPatch::SetHighestBidder { bidder });
        }

        // Incoming order is most recent first. Inserting oldest first at
        // the top leaves the newest row on top.
        let mut fresh = HashSet::new();
        let new_rows: Vec<BidRow> = response
            .bids
            .iter()
            .filter(|bid| !self.seen_bids.contains(&bid.id) && fresh.insert(bid.id.clone()))
            .map(BidRow::from_record)
            .collect();

        report.new_bids = new_rows.len();
        if !new_rows.is_empty() {
            for row in new_rows.into_iter().rev() {
                self.emit(&mut report, DetailPatch::InsertBidRow(row));
            }
            let keep = self.history_limit;
            self.emit(&mut report, DetailPatch::TrimHistory { keep });
        }

        self.seen_bids = response.bids.into_iter().map(|bid| bid.id).collect();

        debug!(
            listing_id = %self.listing,
            new_bids = report.new_bids,
            patches = report.patches,
            "detail reconciled"
        );
        report
    }

    fn emit(&mut self, report: &mut DetailReport, patch: DetailPatch) {
        self.view.apply(&patch);
        report.patches += 1;
    }
}

fn highest_bidder(response: &DetailPollResponse) -> Option<String> {
    response
        .highest_bidder
        .as_ref()
        .and_then(|bidder| bidder.id.clone())
        .filter(|id| !id.is_empty())
}

#[async_trait]
impl<V: DetailView + Sync + 'static> PollCycle for DetailCycle<V> {
    type Response = DetailPollResponse;

    fn name(&self) -> &'static str {
        "detail"
    }

    async fn fetch(&self) -> Result<DetailPollResponse, PollError> {
        self.source.poll_listing(&self.listing).await
    }

    fn apply(&mut self, response: DetailPollResponse) {
        self.reconcile(response);
    }
}
