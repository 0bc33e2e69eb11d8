//! Polling reconcilers that keep an auction listing page and an auction
//! detail page in step with server snapshots.

pub mod app;
pub mod config;
pub mod context;
pub mod metrics;
pub mod poll;
pub mod reconcile;
pub mod state;
pub mod view;
pub mod visibility;
