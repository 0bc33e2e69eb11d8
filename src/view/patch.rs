use rust_decimal::Decimal;
use std::time::Duration;

use super::format::{format_bid_time, format_price};
use crate::poll::types::{BidId, BidRecord, ListingId, ListingStatus};
use crate::state::card::{ActionControl, ResultArea};

/// Minimal update to the list page, produced by diffing two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum ListPatch {
    SetPrice { id: ListingId, price: Decimal },
    HighlightPrice { id: ListingId },
    /// The view keeps the unit suffix already shown next to the count.
    SetBidCount { id: ListingId, count: u64 },
    SetStatus { id: ListingId, status: ListingStatus },
    ReplaceAction { id: ListingId, action: ActionControl },
    ReplaceResult { id: ListingId, result: ResultArea },
    HighlightResult { id: ListingId },
    /// Picked up by the countdown on its own cycle.
    SetEndTime { id: ListingId, end_time: String },
    RefreshFilters,
    SetStatusCount { status: String, count: u64 },
    ScheduleReload { delay: Duration },
}

impl ListPatch {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetPrice { .. } => "set_price",
            Self::HighlightPrice { .. } => "highlight_price",
            Self::SetBidCount { .. } => "set_bid_count",
            Self::SetStatus { .. } => "set_status",
            Self::ReplaceAction { .. } => "replace_action",
            Self::ReplaceResult { .. } => "replace_result",
            Self::HighlightResult { .. } => "highlight_result",
            Self::SetEndTime { .. } => "set_end_time",
            Self::RefreshFilters => "refresh_filters",
            Self::SetStatusCount { .. } => "set_status_count",
            Self::ScheduleReload { .. } => "schedule_reload",
        }
    }

    /// Listing the patch targets; `None` for page-wide patches.
    pub fn listing(&self) -> Option<&ListingId> {
        match self {
            Self::SetPrice { id, .. }
            | Self::HighlightPrice { id }
            | Self::SetBidCount { id, .. }
            | Self::SetStatus { id, .. }
            | Self::ReplaceAction { id, .. }
            | Self::ReplaceResult { id, .. }
            | Self::HighlightResult { id }
            | Self::SetEndTime { id, .. } => Some(id),
            Self::RefreshFilters | Self::SetStatusCount { .. } | Self::ScheduleReload { .. } => {
                None
            }
        }
    }
}

/// A bid history row, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidRow {
    pub bid_id: BidId,
    pub bidder: String,
    pub amount: String,
    pub placed_at: String,
}

impl BidRow {
    /// Bidder name falls back to the bidder id.
    pub fn from_record(bid: &BidRecord) -> Self {
        let bidder = bid
            .bidder_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| bid.bidder_id.clone());

        Self {
            bid_id: bid.id.clone(),
            bidder,
            amount: format_price(bid.amount),
            placed_at: bid
                .bid_timestamp
                .as_deref()
                .map(format_bid_time)
                .unwrap_or_default(),
        }
    }
}

/// Minimal update to the detail page.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailPatch {
    /// Applies to every price display whose number differs.
    SetPrice { price: Decimal },
    SetBidCount { count: u64 },
    /// `None` renders the placeholder.
    SetHighestBidder { bidder: Option<String> },
    /// Inserted at the top of the history with a highlight.
    InsertBidRow(BidRow),
    TrimHistory { keep: usize },
}

impl DetailPatch {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetPrice { .. } => "set_price",
            Self::SetBidCount { .. } => "set_bid_count",
            Self::SetHighestBidder { .. } => "set_highest_bidder",
            Self::InsertBidRow(_) => "insert_bid_row",
            Self::TrimHistory { .. } => "trim_history",
        }
    }
}
