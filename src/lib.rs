pub mod config;
pub mod error;
pub mod handlers;
pub mod http_client;
pub mod normalize;
pub mod pacing;
pub mod stats_fetch;
pub mod store;
