use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::de::{self, Error as _};
use serde::{Deserialize, Deserializer};

use super::poller::PollResponse;

/// Listing identifier. The server sends numbers for some backends and
/// strings for others; both normalize to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListingId(pub String);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListingId {
    fn from(id: &str) -> Self {
        ListingId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ListingId {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        deserialize_id(de).map(ListingId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BidId(pub String);

impl From<&str> for BidId {
    fn from(id: &str) -> Self {
        BidId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for BidId {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        deserialize_id(de).map(BidId)
    }
}

fn deserialize_id<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
        Float(f64),
    }

    match RawId::deserialize(de)? {
        RawId::Text(text) => Ok(text),
        RawId::Number(n) => Ok(n.to_string()),
        RawId::Float(f) => integral(f)
            .map(|n| n.to_string())
            .ok_or_else(|| D::Error::custom(format!("non-integral id {f}"))),
    }
}

/// Spreadsheet-backed servers send counts as floats (`3.0`) and blank
/// cells as `""`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(u64),
    Float(f64),
    Text(String),
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn count_from_raw<E: de::Error>(raw: RawNumber) -> Result<Option<u64>, E> {
    let from_float = |f: f64| {
        integral(f)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| E::custom(format!("invalid count {f}")))
    };
    match raw {
        RawNumber::Int(n) => Ok(Some(n)),
        RawNumber::Float(f) => from_float(f).map(Some),
        RawNumber::Text(text) if text.trim().is_empty() => Ok(None),
        RawNumber::Text(text) => {
            let text = text.trim();
            match text.parse::<u64>() {
                Ok(n) => Ok(Some(n)),
                Err(_) => text
                    .parse::<f64>()
                    .map_err(|_| E::custom(format!("invalid count {text:?}")))
                    .and_then(from_float)
                    .map(Some),
            }
        }
    }
}

fn deserialize_count<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    Ok(deserialize_opt_count(de)?.unwrap_or(0))
}

fn deserialize_opt_count<'de, D: Deserializer<'de>>(de: D) -> Result<Option<u64>, D::Error> {
    match Option::<RawNumber>::deserialize(de)? {
        Some(raw) => count_from_raw(raw),
        None => Ok(None),
    }
}

/// Prices as numbers or numeric strings; a blank cell reads as zero.
fn deserialize_price<'de, D: Deserializer<'de>>(de: D) -> Result<Decimal, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPrice {
        Exact(Decimal),
        Text(String),
    }

    match Option::<RawPrice>::deserialize(de)? {
        Some(RawPrice::Exact(price)) => Ok(price),
        Some(RawPrice::Text(text)) if text.trim().is_empty() => Ok(Decimal::ZERO),
        Some(RawPrice::Text(text)) => Err(D::Error::custom(format!("invalid price {text:?}"))),
        None => Ok(Decimal::ZERO),
    }
}

/// Blank strings read as absent.
fn deserialize_opt_text<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(de)?.filter(|text| !text.trim().is_empty()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ListingStatus {
    Upcoming,
    Open,
    Closed,
    Ended,
    Unsold,
}

impl ListingStatus {
    /// Closed, Ended and Unsold all render a winner / no-bids block.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Closed | Self::Ended | Self::Unsold)
    }
}

/// One listing as reported by the list endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListingSnapshot {
    pub id: ListingId,
    #[serde(deserialize_with = "deserialize_price")]
    pub current_price: Decimal,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub bids_count: u64,
    pub status: ListingStatus,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub highest_bidder_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_text")]
    pub winner_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_text")]
    pub end_time: Option<String>,
}

/// `GET /api/products/poll/`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListPollResponse {
    pub success: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub products: Vec<ListingSnapshot>,
    #[serde(default)]
    pub status_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetailListing {
    #[serde(deserialize_with = "deserialize_price")]
    pub current_price: Decimal,
    #[serde(default, deserialize_with = "deserialize_opt_count")]
    pub bids_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HighestBidder {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BidRecord {
    pub id: BidId,
    #[serde(deserialize_with = "deserialize_id")]
    pub bidder_id: String,
    #[serde(default)]
    pub bidder_name: Option<String>,
    #[serde(deserialize_with = "deserialize_price")]
    pub amount: Decimal,
    #[serde(default, alias = "timestamp")]
    pub bid_timestamp: Option<String>,
}

/// `GET /api/products/{id}/poll/`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetailPollResponse {
    pub success: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub product: DetailListing,
    #[serde(default)]
    pub highest_bidder: Option<HighestBidder>,
    #[serde(default)]
    pub bids: Vec<BidRecord>,
}

fn deserialize_opt_id<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "deserialize_id")] String);

    Ok(Option::<Wrapped>::deserialize(de)?
        .map(|Wrapped(id)| id)
        .filter(|id| !id.trim().is_empty()))
}

impl PollResponse for ListPollResponse {
    fn succeeded(&self) -> bool {
        self.success
    }

    fn server_timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

impl PollResponse for DetailPollResponse {
    fn succeeded(&self) -> bool {
        self.success
    }

    fn server_timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    #[test]
    fn list_response_accepts_numeric_ids_and_nulls() {
        let raw = r#"{
            "success": true,
            "timestamp": "2026-10-19T08:00:00Z",
            "products": [
                {"id": 7, "current_price": 1500, "bids_count": 3, "status": "Open",
                 "highest_bidder_id": "E1234", "winner_name": null, "end_time": "2026-10-19 18:00"},
                {"id": "8", "current_price": 99.5, "status": "Unsold"}
            ],
            "status_counts": {"Open": 1, "Closed": 1, "Upcoming": 0}
        }"#;

        let response: ListPollResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.products.len(), 2);

        let first = &response.products[0];
        assert_eq!(first.id, ListingId::from("7"));
        assert_eq!(first.current_price, dec("1500"));
        assert_eq!(first.highest_bidder_id.as_deref(), Some("E1234"));
        assert_eq!(first.winner_name, None);

        let second = &response.products[1];
        assert_eq!(second.id, ListingId::from("8"));
        assert_eq!(second.bids_count, 0);
        assert!(second.status.is_finished());
        assert_eq!(second.end_time, None);
        assert_eq!(response.status_counts["Open"], 1);
    }

    #[test]
    fn unknown_status_fails_decode() {
        let raw = r#"{"success": true, "products": [
            {"id": 1, "current_price": 1, "status": "Paused"}
        ]}"#;
        assert!(serde_json::from_str::<ListPollResponse>(raw).is_err());
    }

    #[test]
    fn detail_response_with_numeric_bidder_ids() {
        let raw = r#"{
            "success": true,
            "product": {"current_price": "2100.75", "bids_count": 4},
            "highest_bidder": {"id": 10042, "amount": 2100},
            "bids": [
                {"id": 31, "bidder_id": 10042, "bidder_name": "Lin", "amount": 2100,
                 "bid_timestamp": "2026-10-19T08:00:01Z"}
            ]
        }"#;

        let response: DetailPollResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.timestamp, None);
        assert_eq!(response.product.current_price, dec("2100.75"));
        assert_eq!(
            response.highest_bidder.and_then(|bidder| bidder.id).as_deref(),
            Some("10042")
        );
        assert_eq!(response.bids[0].id, BidId::from("31"));
        assert_eq!(response.bids[0].bidder_id, "10042");
    }

    #[test]
    fn spreadsheet_floats_and_blank_cells_decode() {
        let raw = r#"{"success": true, "products": [
            {"id": 1, "current_price": 1500.0, "bids_count": 3.0, "status": "Open"},
            {"id": 2.0, "current_price": "", "bids_count": "", "status": "Upcoming",
             "highest_bidder_id": "", "winner_name": "", "end_time": ""},
            {"id": "3", "current_price": "250", "bids_count": "4", "status": "Closed",
             "highest_bidder_id": 10042.0, "winner_name": "Lin"}
        ]}"#;

        let response: ListPollResponse = serde_json::from_str(raw).unwrap();
        let [first, second, third] = &response.products[..] else {
            panic!("expected three listings");
        };

        assert_eq!(first.current_price, dec("1500"));
        assert_eq!(first.bids_count, 3);

        assert_eq!(second.id, ListingId::from("2"));
        assert_eq!(second.current_price, Decimal::ZERO);
        assert_eq!(second.bids_count, 0);
        assert_eq!(second.highest_bidder_id, None);
        assert_eq!(second.winner_name, None);
        assert_eq!(second.end_time, None);

        assert_eq!(third.bids_count, 4);
        assert_eq!(third.highest_bidder_id.as_deref(), Some("10042"));
    }

    #[test]
    fn fractional_counts_are_rejected() {
        let raw = r#"{"success": true, "products": [
            {"id": 1, "current_price": 10, "bids_count": 2.5, "status": "Open"}
        ]}"#;
        assert!(serde_json::from_str::<ListPollResponse>(raw).is_err());
    }

    #[test]
    fn detail_counts_accept_floats_and_blanks() {
        let raw = r#"{"success": true, "product": {"current_price": 900.0, "bids_count": 2.0},
            "bids": [{"id": 5.0, "bidder_id": "E1", "amount": 900.0}]}"#;
        let response: DetailPollResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.product.bids_count, Some(2));
        assert_eq!(response.bids[0].id, BidId::from("5"));

        let blank = r#"{"success": true, "product": {"current_price": 900, "bids_count": ""}}"#;
        let response: DetailPollResponse = serde_json::from_str(blank).unwrap();
        assert_eq!(response.product.bids_count, None);
    }
}
