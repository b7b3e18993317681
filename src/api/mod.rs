pub mod auth;
pub mod client;
pub mod error;
pub mod itm;
pub mod models;

pub use auth::TokenSource;
pub use client::DnsAppsService;
pub use error::ApiError;
pub use itm::ItmClient;
pub use models::{DnsApp, DnsAppFilter, DnsAppOpts};
