use rust_decimal::Decimal;

use crate::poll::types::{ListingSnapshot, ListingStatus};

/// Action control rendered at the bottom of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionControl {
    /// Link to the detail page.
    Bid,
    /// Disabled placeholder before the auction opens.
    NotStarted,
    /// Disabled placeholder once the auction is over.
    Ended,
}

impl ActionControl {
    pub fn for_status(status: ListingStatus) -> Self {
        match status {
            ListingStatus::Open => Self::Bid,
            ListingStatus::Upcoming => Self::NotStarted,
            _ => Self::Ended,
        }
    }
}

/// Content of the winner / highest-bidder area of a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultArea {
    Empty,
    HighestBidder(String),
    WaitingForBid,
    Winner(String),
    NoBids,
}

impl ResultArea {
    pub fn for_listing(
        status: ListingStatus,
        highest_bidder: Option<&str>,
        winner: Option<&str>,
    ) -> Self {
        match status {
            ListingStatus::Open => match highest_bidder.filter(|id| !id.is_empty()) {
                Some(id) => Self::HighestBidder(id.to_string()),
                None => Self::WaitingForBid,
            },
            status if status.is_finished() => match winner.filter(|name| !name.is_empty()) {
                Some(name) => Self::Winner(name.to_string()),
                None => Self::NoBids,
            },
            _ => Self::Empty,
        }
    }

    pub fn is_highest_bidder(&self) -> bool {
        matches!(self, Self::HighestBidder(_))
    }
}

/// Last-known state of one listing card: the diff baseline for the next
/// poll plus what the card currently shows.
#[derive(Debug, Clone, PartialEq)]
pub struct CardState {
    pub price: Decimal,
    pub bids_count: u64,
    pub status: ListingStatus,
    pub winner: Option<String>,
    pub end_time: Option<String>,
    pub action: ActionControl,
    pub result: ResultArea,
}

impl CardState {
    /// A card as the server would have rendered it for this snapshot.
    pub fn rendered(snapshot: &ListingSnapshot) -> Self {
        Self {
            price: snapshot.current_price,
            bids_count: snapshot.bids_count,
            status: snapshot.status,
            winner: snapshot.winner_name.clone(),
            end_time: snapshot.end_time.clone(),
            action: ActionControl::for_status(snapshot.status),
            result: ResultArea::for_listing(
                snapshot.status,
                snapshot.highest_bidder_id.as_deref(),
                snapshot.winner_name.as_deref(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_statuses_pick_winner_or_no_bids() {
        for status in [ListingStatus::Closed, ListingStatus::Ended, ListingStatus::Unsold] {
            assert_eq!(
                ResultArea::for_listing(status, Some("E1"), Some("Chen")),
                ResultArea::Winner("Chen".into())
            );
            assert_eq!(ResultArea::for_listing(status, Some("E1"), None), ResultArea::NoBids);
            assert_eq!(ResultArea::for_listing(status, None, Some("")), ResultArea::NoBids);
            assert_eq!(ActionControl::for_status(status), ActionControl::Ended);
        }
    }

    #[test]
    fn open_picks_highest_bidder_or_waiting() {
        let open = ListingStatus::Open;
        assert_eq!(
            ResultArea::for_listing(open, Some("E1"), None),
            ResultArea::HighestBidder("E1".into())
        );
        assert_eq!(ResultArea::for_listing(open, None, Some("Chen")), ResultArea::WaitingForBid);
        assert_eq!(ActionControl::for_status(open), ActionControl::Bid);
        assert_eq!(
            ResultArea::for_listing(ListingStatus::Upcoming, Some("E1"), None),
            ResultArea::Empty
        );
    }
}
