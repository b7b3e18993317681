use super::error::ApiError;
use super::models::*;
use async_trait::async_trait;

#[async_trait]
pub trait DnsAppsService: Send + Sync {
    async fn create(&self, opts: &DnsAppOpts, publish: bool) -> Result<DnsApp, ApiError>;
    async fn update(&self, id: u64, opts: &DnsAppOpts, publish: bool)
        -> Result<DnsApp, ApiError>;
    async fn get(&self, id: u64) -> Result<DnsApp, ApiError>;
    async fn delete(&self, id: u64) -> Result<(), ApiError>;
    async fn list(&self, filters: &[DnsAppFilter]) -> Result<Vec<DnsApp>, ApiError>;
}
