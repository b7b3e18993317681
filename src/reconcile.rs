use anyhow::{bail, Context, Result};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::api::{DnsApp, DnsAppFilter, DnsAppsService};
use crate::config::{Config, DnsAppConfig};
use crate::provider::{DnsAppArgs, DnsAppResource, DnsAppState, Provider};

const STATE_FORMAT_VERSION: u32 = 1;

/// Persisted identities, keyed by the resource key from the config file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub dns_apps: BTreeMap<String, DnsAppState>,
}

impl StateFile {
    /// A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                version: STATE_FORMAT_VERSION,
                ..Default::default()
            });
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write state file: {}", path.display()))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub imported: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

impl fmt::Display for ApplySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} imported, {} updated, {} unchanged, {} deleted",
            self.created, self.imported, self.updated, self.unchanged, self.deleted
        )
    }
}

/// Drives the DNS app lifecycle for every entry in the config file.
pub struct Reconciler {
    config: Config,
    service: Arc<dyn DnsAppsService>,
    resource: DnsAppResource,
}

impl Reconciler {
    pub fn new(config: Config, service: Arc<dyn DnsAppsService>) -> Self {
        let resource = Provider::new().dns_app_resource(service.clone());
        Self {
            config,
            service,
            resource,
        }
    }

    pub fn from_file(config_file: &str) -> Result<Self> {
        let config = Config::load(config_file)?;
        let provider = Provider::new();
        provider.validate()?;
        let client = provider.configure(&config.provider)?;
        Ok(Self::new(config, client))
    }

    /// Brings every configured DNS app in line with the config file and
    /// deletes apps that are only left in the state file. Progress is saved
    /// even when a step fails.
    pub async fn apply(&self) -> Result<ApplySummary> {
        let state_path = self.config.state_file.as_path();
        let mut previous = StateFile::load(state_path)?.dns_apps;
        let mut next = BTreeMap::new();
        let mut summary = ApplySummary::default();

        let outcome = self.apply_into(&mut previous, &mut next, &mut summary).await;

        // Whatever was not handled stays tracked.
        next.extend(previous);
        StateFile {
            version: STATE_FORMAT_VERSION,
            dns_apps: next,
        }
        .save(state_path)?;

        outcome.map(|_| summary)
    }

    async fn apply_into(
        &self,
        previous: &mut BTreeMap<String, DnsAppState>,
        next: &mut BTreeMap<String, DnsAppState>,
        summary: &mut ApplySummary,
    ) -> Result<()> {
        for (key, app_config) in &self.config.dns_apps {
            let desired = app_config.args()?;
            let mut state = previous.remove(key).unwrap_or_default();

            let outcome = self
                .apply_entry(key, app_config, &desired, &mut state, summary)
                .await;

            // A half-finished step can still hold a freshly created id.
            if state.is_present() {
                next.insert(key.clone(), state);
            } else if outcome.is_ok() {
                warn!("{}: DNS app vanished right after it was written", key);
            }
            outcome?;
        }

        let orphaned: Vec<String> = previous.keys().cloned().collect();
        for key in orphaned {
            if let Some(state) = previous.get(&key) {
                if state.is_present() {
                    info!("{}: no longer configured, deleting", key);
                    self.resource.delete(state).await?;
                    summary.deleted += 1;
                }
            }
            previous.remove(&key);
        }

        Ok(())
    }

    async fn apply_entry(
        &self,
        key: &str,
        app_config: &DnsAppConfig,
        desired: &DnsAppArgs,
        state: &mut DnsAppState,
        summary: &mut ApplySummary,
    ) -> Result<()> {
        if state.is_present() {
            self.resource.read(state).await?;
        } else if let Some(id) = &app_config.import_id {
            *state = self.resource.import(id).await?;
            summary.imported += 1;
        }

        if !state.is_present() {
            info!("{}: creating DNS app \"{}\"", key, desired.name);
            self.resource.create(state, desired).await?;
            summary.created += 1;
        } else if self.resource.diff(&state.args, desired).is_empty() {
            debug!("{}: up to date", key);
            summary.unchanged += 1;
        } else {
            self.resource.update(state, desired).await?;
            summary.updated += 1;
        }
        Ok(())
    }

    /// Disables every enabled app whose name starts with `prefix`.
    pub async fn sweep(&self, prefix: &str) -> Result<usize> {
        sweep(self.service.as_ref(), prefix).await
    }

    pub async fn run(&self) -> Result<()> {
        if self.config.reconcile_interval == 0 {
            let summary = self.apply().await?;
            info!("Apply complete: {}", summary);
            return Ok(());
        }

        let interval = pass_interval(self.config.reconcile_interval);
        loop {
            match self.apply().await {
                Ok(summary) => info!("Apply complete: {}", summary),
                Err(e) => error!("Error reconciling DNS apps: {:#}", e),
            }
            sleep(interval).await;
        }
    }
}

pub(crate) fn pass_interval(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

pub async fn sweep(service: &dyn DnsAppsService, prefix: &str) -> Result<usize> {
    if prefix.is_empty() {
        bail!("Refusing to sweep DNS apps without a name prefix");
    }
    let owned_prefix = prefix.to_string();
    let mut filters: Vec<DnsAppFilter> = Vec::new();
    filters.push(Box::new(|app: &DnsApp| app.enabled));
    filters.push(Box::new(move |app: &DnsApp| app.name.starts_with(&owned_prefix)));
    let apps = service
        .list(&filters)
        .await
        .context("Failed to list DNS apps")?;
    info!("Found {} DNS apps to sweep", apps.len());

    for app in &apps {
        info!("Destroying DNS app {}", app.name);
        service
            .delete(app.id)
            .await
            .with_context(|| format!("Failed to delete DNS app {} ({})", app.name, app.id))?;
    }
    Ok(apps.len())
}
