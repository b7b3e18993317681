use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_FALLBACK_TTL: u32 = 20;

const DNS_APP_PROTOCOL: &str = "dns";
const DNS_APP_TYPE: &str = "V1_JS";

/// A DNS app as returned by the API.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsApp {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    // The API never removes an app; a missing flag means it is gone.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fallback_cname: String,
    #[serde(rename = "ttl", default = "default_fallback_ttl")]
    pub fallback_ttl: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub app_data: String,
    #[serde(rename = "cname", default, deserialize_with = "null_as_default")]
    pub app_cname: String,
    #[serde(default)]
    pub version: u32,
}

/// Request body for creating or updating a DNS app. Only user-editable
/// fields are carried; `id`, `cname`, `version` and `enabled` belong to
/// the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsAppOpts {
    pub app_data: String,
    pub description: String,
    pub fallback_cname: String,
    #[serde(rename = "ttl")]
    pub fallback_ttl: u32,
    pub name: String,
    pub protocol: &'static str,
    #[serde(rename = "type")]
    pub r#type: &'static str,
}

impl DnsAppOpts {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        fallback_cname: impl Into<String>,
        fallback_ttl: u32,
        app_data: impl Into<String>,
    ) -> Self {
        Self {
            app_data: app_data.into(),
            description: description.into(),
            fallback_cname: fallback_cname.into(),
            fallback_ttl,
            name: name.into(),
            protocol: DNS_APP_PROTOCOL,
            r#type: DNS_APP_TYPE,
        }
    }
}

/// Predicate applied by `list`; an app is kept only if every filter passes.
pub type DnsAppFilter = Box<dyn Fn(&DnsApp) -> bool + Send + Sync>;

fn default_fallback_ttl() -> u32 {
    DEFAULT_FALLBACK_TTL
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
