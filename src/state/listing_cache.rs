use std::collections::HashMap;

use crate::poll::types::{ListingId, ListingSnapshot};
use crate::state::card::CardState;

/// Per-listing card baselines for the list page, keyed by listing id.
/// Only listings present when the page was rendered have an entry.
#[derive(Clone, Debug)]
pub struct ListingCache {
    cards: HashMap<ListingId, CardState>,
}

impl ListingCache {
    /// Cache seeded with the cards of an initially rendered page.
    pub fn rendered<'a>(snapshots: impl IntoIterator<Item = &'a ListingSnapshot>) -> Self {
        let cards = snapshots
            .into_iter()
            .map(|snapshot| (snapshot.id.clone(), CardState::rendered(snapshot)))
            .collect();
        Self { cards }
    }

    pub fn get_card(&self, id: &ListingId) -> Option<&CardState> {
        self.cards.get(id)
    }

    pub fn get_card_mut(&mut self, id: &ListingId) -> Option<&mut CardState> {
        self.cards.get_mut(id)
    }
}
