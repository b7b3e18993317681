use oauth2::basic::BasicRequestTokenError;
use oauth2::HttpClientError;
use thiserror::Error;

pub type TokenRequestError = BasicRequestTokenError<HttpClientError<reqwest::Error>>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unexpected HTTP status: expected {expected}, got {got}")]
    UnexpectedStatus { expected: u16, got: u16 },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to obtain access token: {0}")]
    Token(#[source] Box<TokenRequestError>),

    #[error("failed to decode API response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Status code returned by the API, if the failure was a status mismatch.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::UnexpectedStatus { got, .. } => Some(*got),
            _ => None,
        }
    }
}
