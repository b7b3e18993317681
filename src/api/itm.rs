use super::{auth::TokenSource, client::DnsAppsService, error::ApiError, models::*};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://portal.cedexis.com/api/";
pub const USER_AGENT_STRING: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("CARGO_PKG_REPOSITORY"),
    ")"
);

const DNS_APPS_PATH: &str = "v2/config/applications/dns.json";

pub struct ItmClient {
    client: reqwest::Client,
    base_url: Url,
    tokens: TokenSource,
}

#[async_trait]
impl DnsAppsService for ItmClient {
    async fn create(&self, opts: &DnsAppOpts, publish: bool) -> Result<DnsApp, ApiError> {
        let (status, text) = self
            .send(Method::POST, DNS_APPS_PATH, Some(opts), Some(publish))
            .await?;
        expect_status(StatusCode::CREATED, status)?;
        decode(&text)
    }

    async fn update(
        &self,
        id: u64,
        opts: &DnsAppOpts,
        publish: bool,
    ) -> Result<DnsApp, ApiError> {
        let (status, text) = self
            .send(Method::PUT, &dns_app_path(id), Some(opts), Some(publish))
            .await?;
        expect_status(StatusCode::OK, status)?;
        decode(&text)
    }

    async fn get(&self, id: u64) -> Result<DnsApp, ApiError> {
        let (status, text) = self.send(Method::GET, &dns_app_path(id), None, None).await?;
        expect_status(StatusCode::OK, status)?;
        decode(&text)
    }

    async fn delete(&self, id: u64) -> Result<(), ApiError> {
        let (status, _) = self
            .send(Method::DELETE, &dns_app_path(id), None, None)
            .await?;
        expect_status(StatusCode::NO_CONTENT, status)
    }

    async fn list(&self, filters: &[DnsAppFilter]) -> Result<Vec<DnsApp>, ApiError> {
        let (status, text) = self.send(Method::GET, DNS_APPS_PATH, None, None).await?;
        expect_status(StatusCode::OK, status)?;
        let all: Vec<DnsApp> = decode(&text)?;

        Ok(all
            .into_iter()
            .filter(|app| filters.iter().all(|keep| keep(app)))
            .collect())
    }
}

impl ItmClient {
    /// `base_url` is used as-is; callers normalize it to end with `/`.
    pub fn new(base_url: Url, tokens: TokenSource) -> Result<Self, ApiError> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url,
            tokens,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn user_agent(&self) -> &'static str {
        USER_AGENT_STRING
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&DnsAppOpts>,
        publish: Option<bool>,
    ) -> Result<(StatusCode, String), ApiError> {
        let mut url = self.base_url.join(path)?;
        if let Some(publish) = publish {
            url.query_pairs_mut()
                .append_pair("publish", &publish.to_string());
        }

        let token = self.tokens.access_token().await?;
        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .headers(self.build_headers())
            .bearer_auth(token);

        if let Some(opts) = body {
            let payload = serde_json::to_vec(opts).map_err(ApiError::Encode)?;
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(payload);
        }

        let response = request.send().await.map_err(|e| {
            warn!("Error issuing {} request to {}: {}", method, url, e);
            ApiError::Request(e)
        })?;

        let status = response.status();
        let text = response.text().await?;
        debug!("{} {} -> {}", method, url, status);
        Ok((status, text))
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
        headers
    }
}

fn dns_app_path(id: u64) -> String {
    format!("{}/{}", DNS_APPS_PATH, id)
}

fn expect_status(expected: StatusCode, got: StatusCode) -> Result<(), ApiError> {
    if expected == got {
        Ok(())
    } else {
        Err(ApiError::UnexpectedStatus {
            expected: expected.as_u16(),
            got: got.as_u16(),
        })
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    serde_json::from_str(text).map_err(ApiError::Decode)
}
