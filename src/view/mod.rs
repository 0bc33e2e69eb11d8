pub mod detail_page;
pub mod format;
pub mod list_page;
pub mod patch;

use tracing::{debug, info};

use crate::metrics::prometheus::record_patch;
use patch::{DetailPatch, ListPatch};

/// Receives list-page patches. The reconciler never reads back from it.
pub trait ListView: Send {
    fn apply(&mut self, patch: &ListPatch);
}

/// Receives detail-page patches.
pub trait DetailView: Send {
    fn apply(&mut self, patch: &DetailPatch);
}

/// Collecting patches is the simplest view there is.
impl ListView for Vec<ListPatch> {
    fn apply(&mut self, patch: &ListPatch) {
        self.push(patch.clone());
    }
}

impl DetailView for Vec<DetailPatch> {
    fn apply(&mut self, patch: &DetailPatch) {
        self.push(patch.clone());
    }
}

/// Logs and counts every patch before handing it to the wrapped view.
pub struct Traced<V> {
    page: &'static str,
    inner: V,
}

impl<V> Traced<V> {
    pub fn new(page: &'static str, inner: V) -> Self {
        Self { page, inner }
    }
}

impl<V: ListView> ListView for Traced<V> {
    fn apply(&mut self, patch: &ListPatch) {
        record_patch(self.page, patch.kind());
        match patch {
            ListPatch::SetEndTime { id, end_time } => {
                info!(listing_id = %id, %end_time, "end time extended");
            }
            ListPatch::SetStatus { id, status } => {
                info!(listing_id = %id, ?status, "status changed");
            }
            ListPatch::ScheduleReload { delay } => {
                info!(delay_ms = delay.as_millis() as u64, "full reload scheduled");
            }
            other => debug!(patch = ?other, "list patch"),
        }
        self.inner.apply(patch);
    }
}

impl<V: DetailView> DetailView for Traced<V> {
    fn apply(&mut self, patch: &DetailPatch) {
        record_patch(self.page, patch.kind());
        match patch {
            DetailPatch::InsertBidRow(row) => {
                info!(bid_id = %row.bid_id.0, bidder = %row.bidder, amount = %row.amount, "new bid");
            }
            other => debug!(patch = ?other, "detail patch"),
        }
        self.inner.apply(patch);
    }
}
