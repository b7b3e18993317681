//! Provider registration: the provider block, its resource types and the
//! glue from provider settings to a configured API client.

pub mod dns_app;
pub mod schema;

pub use dns_app::{DnsAppArgs, DnsAppResource, DnsAppState};

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::{itm::DEFAULT_BASE_URL, DnsAppsService, ItmClient};
use crate::config::{ProviderConfig, ProviderSettings};
use schema::{Attribute, Schema};

pub const ENV_CLIENT_ID: &str = "ITM_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "ITM_CLIENT_SECRET";
pub const ENV_BASE_URL: &str = "ITM_BASE_URL";

pub struct Provider {
    schema: Schema,
    resources: BTreeMap<&'static str, Schema>,
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider {
    pub fn new() -> Self {
        let schema = Schema::new()
            .with_attribute(
                "client_id",
                Attribute::required_string().with_env_default(ENV_CLIENT_ID, None),
            )
            .with_attribute(
                "client_secret",
                Attribute::required_string().with_env_default(ENV_CLIENT_SECRET, None),
            )
            .with_attribute(
                "base_url",
                Attribute::required_string().with_env_default(ENV_BASE_URL, Some(DEFAULT_BASE_URL)),
            );

        let mut resources = BTreeMap::new();
        resources.insert(dns_app::RESOURCE_TYPE, dns_app::schema());

        Self { schema, resources }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Checks the provider and every resource schema for conflicting
    /// attribute settings.
    pub fn validate(&self) -> Result<()> {
        self.schema.validate().context("provider schema")?;
        for (name, schema) in &self.resources {
            schema
                .validate()
                .with_context(|| format!("resource {}", name))?;
        }
        Ok(())
    }

    pub fn configure(&self, settings: &ProviderSettings) -> Result<Arc<ItmClient>> {
        let config = ProviderConfig::from_settings(&self.schema, settings)?;
        Ok(Arc::new(config.client()?))
    }

    pub fn dns_app_resource(&self, service: Arc<dyn DnsAppsService>) -> DnsAppResource {
        DnsAppResource::new(service)
    }
}
