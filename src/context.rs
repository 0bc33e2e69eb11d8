use std::sync::Arc;

use crate::config::{Labels, PollSettings};
use crate::state::clock::ServerClock;

/// Everything the pollers and views share, built once by whoever composes
/// them and passed in at construction.
#[derive(Debug, Clone)]
pub struct PollContext {
    /// Also read by the countdown renderer.
    pub clock: Arc<ServerClock>,
    pub labels: Labels,
    pub settings: PollSettings,
}

impl PollContext {
    pub fn new(labels: Labels, settings: PollSettings) -> Self {
        Self {
            clock: Arc::new(ServerClock::new()),
            labels,
            settings,
        }
    }
}
