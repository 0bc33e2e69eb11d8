pub mod card;
pub mod clock;
pub mod listing_cache;
