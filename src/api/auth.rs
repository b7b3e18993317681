use std::time::{Duration, Instant};

use log::debug;
use oauth2::basic::BasicClient;
use oauth2::{ClientId, ClientSecret, EndpointNotSet, EndpointSet, TokenResponse, TokenUrl};
use tokio::sync::Mutex;
use url::Url;

use super::error::ApiError;

const TOKEN_PATH: &str = "oauth/token";

// Refresh a little before the server-side expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

type CredentialsClient =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

struct CachedToken {
    secret: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() + EXPIRY_MARGIN < expires_at,
            None => true,
        }
    }
}

/// Client-credentials token source. Tokens are cached until shortly before
/// they expire; the mutex serializes refreshes between concurrent callers.
pub struct TokenSource {
    oauth: CredentialsClient,
    http: reqwest::Client,
    token_url: Url,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    /// `base_url` must already end with `/`; the token endpoint is resolved
    /// relative to it.
    pub fn new(client_id: &str, client_secret: &str, base_url: &Url) -> Result<Self, ApiError> {
        let token_url = base_url.join(TOKEN_PATH)?;
        let oauth = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_token_uri(TokenUrl::from_url(token_url.clone()));

        // The token exchange must not follow redirects.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            oauth,
            http,
            token_url,
            cached: Mutex::new(None),
        })
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    pub async fn access_token(&self) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh()) {
            return Ok(token.secret.clone());
        }

        debug!("Requesting access token from {}", self.token_url);
        let response = self
            .oauth
            .exchange_client_credentials()
            .request_async(&self.http)
            .await
            .map_err(|e| ApiError::Token(Box::new(e)))?;

        let token = CachedToken {
            secret: response.access_token().secret().clone(),
            expires_at: response.expires_in().map(|ttl| Instant::now() + ttl),
        };
        let secret = token.secret.clone();
        *cached = Some(token);
        Ok(secret)
    }
}
