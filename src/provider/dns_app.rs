use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::schema::{Attribute, DefaultValue, Schema};
use crate::api::models::DEFAULT_FALLBACK_TTL;
use crate::api::{DnsApp, DnsAppOpts, DnsAppsService};

pub const RESOURCE_TYPE: &str = "citrixitm_dns_app";

const RESOURCE_NAME: &str = "Citrix ITM DNS app";

/// User-editable fields of a DNS app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsAppArgs {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fallback_cname: String,
    #[serde(default = "default_fallback_ttl")]
    pub fallback_ttl: u32,
    pub app_data: String,
}

impl Default for DnsAppArgs {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            fallback_cname: String::new(),
            fallback_ttl: DEFAULT_FALLBACK_TTL,
            app_data: String::new(),
        }
    }
}

impl DnsAppArgs {
    pub fn opts(&self) -> DnsAppOpts {
        DnsAppOpts::new(
            self.name.as_str(),
            self.description.as_str(),
            self.fallback_cname.as_str(),
            self.fallback_ttl,
            self.app_data.as_str(),
        )
    }

    /// `(attribute, value)` pairs in the order the change check walks them.
    fn attributes(&self) -> [(&'static str, String); 5] {
        [
            ("name", self.name.clone()),
            ("description", self.description.clone()),
            ("fallback_cname", self.fallback_cname.clone()),
            ("fallback_ttl", self.fallback_ttl.to_string()),
            ("app_data", self.app_data.clone()),
        ]
    }
}

/// Recorded state of one DNS app resource. An empty `id` means the app is
/// absent and has to be created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsAppState {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub args: DnsAppArgs,
    #[serde(default)]
    pub cname: String,
    #[serde(default)]
    pub version: u32,
}

impl DnsAppState {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn is_present(&self) -> bool {
        !self.id.is_empty()
    }

    fn app_id(&self) -> Result<u64> {
        self.id
            .parse()
            .with_context(|| format!("Error converting app id ({}) to an integer", self.id))
    }

    fn refresh_from(&mut self, app: DnsApp) {
        self.args = DnsAppArgs {
            name: app.name,
            description: app.description,
            fallback_cname: app.fallback_cname,
            fallback_ttl: app.fallback_ttl,
            app_data: app.app_data,
        };
        self.cname = app.app_cname;
        self.version = app.version;
    }
}

pub fn schema() -> Schema {
    Schema::new()
        .with_attribute(
            "app_data",
            Attribute::required_string().with_diff_suppress(suppress_whitespace_diff),
        )
        .with_attribute(
            "description",
            Attribute::optional_string().with_diff_suppress(suppress_whitespace_diff),
        )
        .with_attribute("fallback_cname", Attribute::required_string())
        .with_attribute(
            "fallback_ttl",
            Attribute::optional_int().with_default(DefaultValue::Int(DEFAULT_FALLBACK_TTL as i64)),
        )
        .with_attribute("name", Attribute::required_string())
        .with_attribute("cname", Attribute::computed_string())
        .with_attribute("version", Attribute::computed_int())
        .importable()
}

/// Values that only differ in surrounding whitespace are the same.
pub fn suppress_whitespace_diff(old: &str, new: &str) -> bool {
    old.trim() == new.trim()
}

/// Lifecycle hooks for `citrixitm_dns_app`.
pub struct DnsAppResource {
    service: Arc<dyn DnsAppsService>,
    schema: Schema,
}

impl DnsAppResource {
    pub fn new(service: Arc<dyn DnsAppsService>) -> Self {
        Self {
            service,
            schema: schema(),
        }
    }

    /// Names of the attributes whose desired value differs from the
    /// recorded one.
    pub fn diff(&self, recorded: &DnsAppArgs, desired: &DnsAppArgs) -> Vec<&'static str> {
        recorded
            .attributes()
            .iter()
            .zip(desired.attributes().iter())
            .filter(|((name, old), (_, new))| self.schema.differs(name, old, new))
            .map(|((name, _), _)| *name)
            .collect()
    }

    /// Creates the app and records its id in `state` before the read-back,
    /// so a failed read still leaves the new app tracked.
    pub async fn create(&self, state: &mut DnsAppState, desired: &DnsAppArgs) -> Result<()> {
        info!("Creating {}", RESOURCE_NAME);
        let opts = desired.opts();
        debug!("{} create options: {:?}", RESOURCE_NAME, opts);

        let app = self
            .service
            .create(&opts, true)
            .await
            .with_context(|| format!("Failed to create {} \"{}\"", RESOURCE_NAME, desired.name))?;

        *state = DnsAppState {
            id: app.id.to_string(),
            args: desired.clone(),
            ..Default::default()
        };
        info!("Created {} with ID {}", RESOURCE_NAME, state.id);

        self.read(state).await
    }

    /// Refreshes `state` from the API. A disabled or missing app clears the
    /// identity instead of failing.
    pub async fn read(&self, state: &mut DnsAppState) -> Result<()> {
        info!("Reading {} with ID {}", RESOURCE_NAME, state.id);
        let id = state.app_id()?;

        let app = match self.service.get(id).await {
            Ok(app) => app,
            Err(e) if e.status() == Some(404) => {
                warn!("{} with ID {} not found", RESOURCE_NAME, state.id);
                state.id.clear();
                return Ok(());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {} with ID {}", RESOURCE_NAME, id))
            }
        };

        if !app.enabled {
            warn!(
                "The {} with ID {} is disabled, it was likely deleted outside of this tool and will be recreated",
                RESOURCE_NAME, state.id
            );
            state.id.clear();
            return Ok(());
        }

        state.refresh_from(app);
        info!("Read {} with ID {}", RESOURCE_NAME, state.id);
        Ok(())
    }

    /// Sends a full update when any editable attribute changed, then
    /// refreshes `state` either way.
    pub async fn update(&self, state: &mut DnsAppState, desired: &DnsAppArgs) -> Result<()> {
        let id = state.app_id()?;
        let changes = self.diff(&state.args, desired);

        if changes.is_empty() {
            debug!("{} with ID {} is up to date", RESOURCE_NAME, id);
        } else {
            info!(
                "Updating {} with ID {} ({})",
                RESOURCE_NAME,
                id,
                changes.join(", ")
            );
            let opts = desired.opts();
            debug!("{} update options: {:?}", RESOURCE_NAME, opts);

            self.service
                .update(id, &opts, true)
                .await
                .with_context(|| format!("Failed to update {} with ID {}", RESOURCE_NAME, id))?;
            state.args = desired.clone();
            info!("Updated {} with ID {}", RESOURCE_NAME, id);
        }

        self.read(state).await
    }

    /// The API only flips `enabled` to false; the id stays valid.
    pub async fn delete(&self, state: &DnsAppState) -> Result<()> {
        info!("Deleting {} with ID {}", RESOURCE_NAME, state.id);
        let id = state.app_id()?;

        self.service
            .delete(id)
            .await
            .with_context(|| format!("Failed to delete {} with ID {}", RESOURCE_NAME, id))?;

        info!("Deleted {} with ID {}", RESOURCE_NAME, id);
        Ok(())
    }

    pub async fn import(&self, id: &str) -> Result<DnsAppState> {
        info!("Importing {} with ID {}", RESOURCE_NAME, id);
        let mut state = DnsAppState::with_id(id.trim());
        self.read(&mut state).await?;

        if !state.is_present() {
            bail!("Cannot import non-existent {} with ID {}", RESOURCE_NAME, id);
        }
        Ok(state)
    }
}

fn default_fallback_ttl() -> u32 {
    DEFAULT_FALLBACK_TTL
}
