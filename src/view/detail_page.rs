use std::collections::VecDeque;

use super::DetailView;
use super::format::{floor_price, format_price, numeric_text, replace_count};
use super::patch::{BidRow, DetailPatch};
use crate::config::Labels;
use crate::poll::types::DetailPollResponse;

pub const BIDDER_PLACEHOLDER: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceDisplay {
    pub text: String,
    pub flashes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub row: BidRow,
    /// Row was inserted by polling and got the new-bid highlight.
    pub highlighted: bool,
}

/// In-memory projection of a listing's detail page. The page may carry
/// several redundant price and bid-count displays.
pub struct DetailPage {
    labels: Labels,
    price_displays: Vec<PriceDisplay>,
    bids_displays: Vec<String>,
    highest_bidder: String,
    history: VecDeque<HistoryRow>,
}

impl DetailPage {
    pub fn new(labels: Labels, price_displays: usize, bids_displays: usize) -> Self {
        let bids_text = format!("0{}", labels.bids_suffix);
        Self {
            price_displays: vec![
                PriceDisplay {
                    text: format_price(Default::default()),
                    flashes: 0,
                };
                price_displays
            ],
            bids_displays: vec![bids_text; bids_displays],
            highest_bidder: BIDDER_PLACEHOLDER.to_string(),
            history: VecDeque::new(),
            labels,
        }
    }

    /// The page as the server renders it for this response, showing at
    /// most `history_limit` bids.
    pub fn rendered(
        labels: Labels,
        price_displays: usize,
        bids_displays: usize,
        response: &DetailPollResponse,
        history_limit: usize,
    ) -> Self {
        let mut page = Self::new(labels, price_displays, bids_displays);
        for display in &mut page.price_displays {
            display.text = format_price(response.product.current_price);
        }
        let count = response.product.bids_count.unwrap_or(0);
        for text in &mut page.bids_displays {
            *text = format!("{count}{}", page.labels.bids_suffix);
        }
        if let Some(id) = response.highest_bidder.as_ref().and_then(|b| b.id.clone()) {
            page.highest_bidder = id;
        }
        page.history = response
            .bids
            .iter()
            .take(history_limit)
            .map(|bid| HistoryRow {
                row: BidRow::from_record(bid),
                highlighted: false,
            })
            .collect();
        page
    }

    pub fn price_displays(&self) -> &[PriceDisplay] {
        &self.price_displays
    }

    pub fn bids_displays(&self) -> &[String] {
        &self.bids_displays
    }

    pub fn highest_bidder(&self) -> &str {
        &self.highest_bidder
    }

    /// Top of the list first.
    pub fn history(&self) -> impl Iterator<Item = &HistoryRow> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl DetailView for DetailPage {
    fn apply(&mut self, patch: &DetailPatch) {
        match patch {
            DetailPatch::SetPrice { price } => {
                let floored = floor_price(*price);
                for display in &mut self.price_displays {
                    if numeric_text(&display.text) != Some(floored) {
                        display.text = format_price(*price);
                        display.flashes += 1;
                    }
                }
            }
            DetailPatch::SetBidCount { count } => {
                for text in &mut self.bids_displays {
                    *text = replace_count(text, *count, &self.labels.bids_suffix);
                }
            }
            DetailPatch::SetHighestBidder { bidder } => {
                self.highest_bidder = bidder
                    .clone()
                    .unwrap_or_else(|| BIDDER_PLACEHOLDER.to_string());
            }
            DetailPatch::InsertBidRow(row) => {
                self.history.push_front(HistoryRow {
                    row: row.clone(),
                    highlighted: true,
                });
            }
            DetailPatch::TrimHistory { keep } => self.history.truncate(*keep),
        }
    }
}
