pub mod models;

pub use models::{Config, DnsAppConfig, ProviderSettings};

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};
use url::Url;
use validator::Validate;

use crate::api::{ItmClient, TokenSource};
use crate::provider::dns_app::DnsAppArgs;
use crate::provider::schema::Schema;

/// Resolved credentials and endpoint for the ITM API.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: Url,
}

impl ProviderConfig {
    pub fn new(client_id: &str, client_secret: &str, base_url: &str) -> Result<Self> {
        let base_url = normalize_base_url(base_url)
            .with_context(|| format!("Invalid base URL: {}", base_url))?;
        info!("New client base URL: {}", base_url);

        Ok(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            base_url,
        })
    }

    /// Fills gaps in `settings` from the process environment.
    pub fn from_settings(schema: &Schema, settings: &ProviderSettings) -> Result<Self> {
        Self::from_settings_with(schema, settings, |key| std::env::var(key).ok())
    }

    /// Explicit settings win, then the attribute's environment variable,
    /// then its fallback value.
    pub fn from_settings_with<F>(
        schema: &Schema,
        settings: &ProviderSettings,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |name: &str, configured: &Option<String>| -> Result<String> {
            configured
                .clone()
                .filter(|value| !value.is_empty())
                .or_else(|| schema.env_default(name, &lookup))
                .ok_or_else(|| anyhow!("Provider setting \"{}\" is required", name))
        };

        let client_id = resolve("client_id", &settings.client_id)?;
        let client_secret = resolve("client_secret", &settings.client_secret)?;
        let base_url = resolve("base_url", &settings.base_url)?;

        Self::new(&client_id, &client_secret, &base_url)
    }

    /// Builds an API client that authenticates with the client-credentials
    /// grant against `<base_url>oauth/token`.
    pub fn client(&self) -> Result<ItmClient> {
        let tokens = TokenSource::new(&self.client_id, &self.client_secret, &self.base_url)
            .context("Failed to configure OAuth2 token source")?;
        debug!("Token URL: {}", tokens.token_url());
        ItmClient::new(self.base_url.clone(), tokens).context("Failed to build HTTP client")
    }
}

/// Parses `raw` and makes sure its path ends with exactly one `/`.
pub fn normalize_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw)?;
    let path = format!("{}/", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

impl Config {
    pub fn load(config_file: impl AsRef<Path>) -> Result<Self> {
        let config_file = config_file.as_ref();
        let mut file = File::open(config_file)
            .with_context(|| format!("Failed to open config file: {}", config_file.display()))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .with_context(|| format!("Failed to read config file: {}", config_file.display()))?;

        let mut config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", config_file.display()))?;

        let base_dir = config_file.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_app_data(base_dir)?;
        config.validate().context("Invalid configuration")?;

        // A relative state file lives next to the config file.
        if config.state_file.is_relative() {
            config.state_file = base_dir.join(&config.state_file);
        }

        Ok(config)
    }

    fn resolve_app_data(&mut self, base_dir: &Path) -> Result<()> {
        for (key, app) in self.dns_apps.iter_mut() {
            let app_data_file = app.app_data_file.take();
            match (app.app_data.is_some(), app_data_file) {
                (true, Some(_)) => {
                    bail!("DNS app \"{}\": app_data and app_data_file are mutually exclusive", key)
                }
                (false, Some(path)) => {
                    let path: PathBuf = base_dir.join(path);
                    let source = std::fs::read_to_string(&path).with_context(|| {
                        format!("Failed to read app data for \"{}\": {}", key, path.display())
                    })?;
                    app.app_data = Some(source);
                }
                (true, None) => {}
                (false, None) => bail!("DNS app \"{}\": app_data is required", key),
            }
        }
        Ok(())
    }
}

impl DnsAppConfig {
    pub fn args(&self) -> Result<DnsAppArgs> {
        let app_data = self
            .app_data
            .clone()
            .ok_or_else(|| anyhow!("DNS app \"{}\" has no app data", self.name))?;

        Ok(DnsAppArgs {
            name: self.name.clone(),
            description: self.description.clone(),
            fallback_cname: self.fallback_cname.clone(),
            fallback_ttl: self.fallback_ttl,
            app_data,
        })
    }
}
