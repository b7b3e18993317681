//! Citrix ITM DNS app provider: an API client for the ITM configuration
//! API, the `citrixitm_dns_app` resource built on top of it, and a small
//! reconciler that drives the resource from a YAML file.

pub mod api;
pub mod config;
pub mod provider;
pub mod reconcile;

#[cfg(test)]
mod tests;
