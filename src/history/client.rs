use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

use crate::auth::AccessToken;
use crate::history::error::FetchError;
use crate::history::normalize::normalize_response;
use crate::history::types::{Page, RecentlyPlayedResponse, SpotifyErrorResponse};

pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Port for fetching one page of listening history.
///
/// Implementations live in this module (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HistoryClient: Send + Sync {
    /// Fetch up to `page_size` plays strictly older than `before` (epoch ms), newest first.
    async fn fetch_page(
        &self,
        credential: &AccessToken,
        page_size: u32,
        before: Option<i64>,
    ) -> Result<Page, FetchError>;
}

/// Spotify Web API client for the recently-played endpoint
pub struct SpotifyHistoryClient {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl SpotifyHistoryClient {
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
        }
    }

    pub fn recently_played_url(
        &self,
        page_size: u32,
        before: Option<i64>,
    ) -> Result<Url, url::ParseError> {
        let mut url = self.base_url.join("me/player/recently-played")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &page_size.to_string());
            if let Some(before) = before {
                query.append_pair("before", &before.to_string());
            }
        }
        Ok(url)
    }
}

impl Default for SpotifyHistoryClient {
    fn default() -> Self {
        // The constant is a valid absolute URL
        let base_url = Url::parse(DEFAULT_API_BASE_URL).unwrap();
        Self::new(base_url, DEFAULT_TIMEOUT)
    }
}

#[async_trait::async_trait]
impl HistoryClient for SpotifyHistoryClient {
    async fn fetch_page(
        &self,
        credential: &AccessToken,
        page_size: u32,
        before: Option<i64>,
    ) -> Result<Page, FetchError> {
        let url = self
            .recently_played_url(page_size, before)
            .map_err(|error| FetchError::malformed(format!("invalid API base URL: {error}")))?;

        log::debug!("Fetching recently played: limit={page_size} before={before:?}");

        let response = self
            .client
            .get(url)
            .bearer_auth(credential.secret())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(FetchError::NetworkError)?;

        let status = response.status();
        let body = response.text().await.map_err(FetchError::NetworkError)?;

        let page = classify_response(status, &body)?;
        log::info!(
            "Fetched {} recently played tracks (before={:?})",
            page.raw_count,
            before
        );
        Ok(page)
    }
}

/// Turn a raw HTTP status and body into a page or a classified error.
pub fn classify_response(status: StatusCode, body: &str) -> Result<Page, FetchError> {
    if !status.is_success() {
        let message = serde_json::from_str::<SpotifyErrorResponse>(body)
            .ok()
            .and_then(|response| response.error.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });

        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized { message });
        }
        return Err(FetchError::RemoteError {
            status: status.as_u16(),
            message,
        });
    }

    let response: RecentlyPlayedResponse = serde_json::from_str(body)
        .map_err(|error| FetchError::malformed(format!("failed to parse body: {error}")))?;

    if let Some(error) = response.error {
        let status = error.status.unwrap_or(status.as_u16());
        let message = error.message.unwrap_or_else(|| "Unknown error".to_string());
        if status == StatusCode::UNAUTHORIZED.as_u16() {
            return Err(FetchError::Unauthorized { message });
        }
        return Err(FetchError::RemoteError { status, message });
    }

    normalize_response(response)
}
