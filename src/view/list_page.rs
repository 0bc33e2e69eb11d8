use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::ListView;
use super::format::{format_price, replace_count};
use super::patch::ListPatch;
use crate::config::Labels;
use crate::poll::types::{ListingId, ListingSnapshot, ListingStatus};
use crate::state::card::{ActionControl, CardState, ResultArea};

/// What one listing card shows.
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub price_text: String,
    pub bids_text: String,
    pub status: ListingStatus,
    pub action: ActionControl,
    pub action_text: String,
    pub action_href: Option<String>,
    pub result: ResultArea,
    pub result_text: String,
    pub end_time: Option<String>,
    /// Highlight animations started on the price.
    pub price_flashes: u32,
    /// Highlight animations started on the result area.
    pub result_flashes: u32,
    /// Patches applied to this card.
    pub mutations: u32,
}

/// In-memory projection of the listing page.
pub struct ListPage {
    labels: Labels,
    lang: String,
    cards: BTreeMap<ListingId, CardView>,
    status_counts: BTreeMap<String, String>,
    filter_refreshes: u32,
    reload: Option<Duration>,
    reload_tx: Option<mpsc::UnboundedSender<Duration>>,
}

impl ListPage {
    /// The page as the server renders it for these listings.
    pub fn rendered(snapshots: &[ListingSnapshot], labels: Labels, lang: impl Into<String>) -> Self {
        let mut page = Self {
            labels,
            lang: lang.into(),
            cards: BTreeMap::new(),
            status_counts: BTreeMap::new(),
            filter_refreshes: 0,
            reload: None,
            reload_tx: None,
        };

        for snapshot in snapshots {
            let card = CardState::rendered(snapshot);
            let view = CardView {
                price_text: format_price(card.price),
                bids_text: format!("{}{}", card.bids_count, page.labels.bids_suffix),
                status: card.status,
                action: card.action,
                action_text: action_text(&page.labels, card.action),
                action_href: action_href(&page.lang, card.action, &snapshot.id),
                result_text: result_text(&page.labels, &card.result),
                result: card.result,
                end_time: card.end_time,
                price_flashes: 0,
                result_flashes: 0,
                mutations: 0,
            };
            page.cards.insert(snapshot.id.clone(), view);
        }
        page
    }

    /// Forward scheduled reloads to whoever owns the page lifecycle.
    pub fn with_reload_signal(mut self, tx: mpsc::UnboundedSender<Duration>) -> Self {
        self.reload_tx = Some(tx);
        self
    }

    pub fn card(&self, id: &ListingId) -> Option<&CardView> {
        self.cards.get(id)
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    /// Text of the `count-{status}` element, e.g. `(3)`.
    pub fn status_count(&self, status: &str) -> Option<&str> {
        self.status_counts.get(status).map(String::as_str)
    }

    pub fn filter_refreshes(&self) -> u32 {
        self.filter_refreshes
    }

    pub fn reload_scheduled(&self) -> Option<Duration> {
        self.reload
    }

    fn apply_to_card(&mut self, id: &ListingId, patch: &ListPatch) {
        let Self {
            labels, lang, cards, ..
        } = self;
        let Some(card) = cards.get_mut(id) else {
            debug!(listing_id = %id, kind = patch.kind(), "patch for card not on page");
            return;
        };
        card.mutations += 1;

        match patch {
            ListPatch::SetPrice { price, .. } => card.price_text = format_price(*price),
            ListPatch::HighlightPrice { .. } => card.price_flashes += 1,
            ListPatch::SetBidCount { count, .. } => {
                card.bids_text = replace_count(&card.bids_text, *count, &labels.bids_suffix);
            }
            ListPatch::SetStatus { status, .. } => card.status = *status,
            ListPatch::ReplaceAction { action, .. } => {
                card.action = *action;
                card.action_text = action_text(labels, *action);
                card.action_href = action_href(lang, *action, id);
            }
            ListPatch::ReplaceResult { result, .. } => {
                card.result = result.clone();
                card.result_text = result_text(labels, result);
            }
            ListPatch::HighlightResult { .. } => card.result_flashes += 1,
            ListPatch::SetEndTime { end_time, .. } => card.end_time = Some(end_time.clone()),
            ListPatch::RefreshFilters
            | ListPatch::SetStatusCount { .. }
            | ListPatch::ScheduleReload { .. } => {}
        }
    }
}

fn action_text(labels: &Labels, action: ActionControl) -> String {
    match action {
        ActionControl::Bid => labels.bid.clone(),
        ActionControl::NotStarted => labels.not_started.clone(),
        ActionControl::Ended => labels.ended.clone(),
    }
}

fn action_href(lang: &str, action: ActionControl, id: &ListingId) -> Option<String> {
    (action == ActionControl::Bid).then(|| format!("/{lang}/products/{id}/"))
}

fn result_text(labels: &Labels, result: &ResultArea) -> String {
    match result {
        ResultArea::Empty => String::new(),
        ResultArea::HighestBidder(id) => format!("{}: {}", labels.highest_bid, id),
        ResultArea::WaitingForBid => labels.waiting_bid.clone(),
        ResultArea::Winner(name) => format!("{}: {}", labels.winner, name),
        ResultArea::NoBids => labels.no_bids.clone(),
    }
}

impl ListView for ListPage {
    fn apply(&mut self, patch: &ListPatch) {
        if let Some(id) = patch.listing() {
            self.apply_to_card(id, patch);
            return;
        }

        match patch {
            ListPatch::RefreshFilters => self.filter_refreshes += 1,
            ListPatch::SetStatusCount { status, count } => {
                self.status_counts.insert(status.clone(), format!("({count})"));
            }
            ListPatch::ScheduleReload { delay } => {
                // One reload is enough; the page is about to be replaced.
                if self.reload.is_some() {
                    return;
                }
                self.reload = Some(*delay);
                if let Some(tx) = &self.reload_tx {
                    if tx.send(*delay).is_err() {
                        warn!("reload signal dropped, page owner is gone");
                    }
                }
            }
            _ => {}
        }
    }
}
