pub mod backoff;
pub mod client;
pub mod poller;
pub mod task;
pub mod types;
