use std::collections::VecDeque;

use chrono::{DateTime, SecondsFormat};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::auth::AccessToken;
use crate::history::client::HistoryClient;
use crate::history::error::FetchError;
use crate::history::normalize::normalize_item;
use crate::history::types::{Page, PlayHistoryItem, PlayRecord};

pub fn token() -> AccessToken {
    AccessToken::new("test-token").unwrap()
}

/// Raw recently-played item as Spotify would send it.
pub fn raw_item_json(track_id: &str, name: &str, played_at: &str) -> serde_json::Value {
    serde_json::json!({
        "played_at": played_at,
        "track": {
            "id": track_id,
            "name": name,
            "artists": [{ "name": format!("Artist of {}", track_id) }],
            "external_urls": { "spotify": format!("https://open.spotify.com/track/{}", track_id) },
            "album": {
                "images": [
                    {
                        "url": format!("https://i.scdn.co/image/{}-640", track_id),
                        "height": 640,
                        "width": 640
                    },
                    {
                        "url": format!("https://i.scdn.co/image/{}-300", track_id),
                        "height": 300,
                        "width": 300
                    },
                    {
                        "url": format!("https://i.scdn.co/image/{}-64", track_id),
                        "height": 64,
                        "width": 64
                    }
                ]
            }
        }
    })
}

pub fn raw_item(track_id: &str, name: &str, played_at_ms: i64) -> PlayHistoryItem {
    let played_at = DateTime::from_timestamp_millis(played_at_ms)
        .unwrap()
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    serde_json::from_value(raw_item_json(track_id, name, &played_at)).unwrap()
}

pub fn record(track_id: &str, played_at_ms: i64) -> PlayRecord {
    normalize_item(raw_item(track_id, &format!("Song {}", track_id), played_at_ms)).unwrap()
}

/// A page of `count` plays, newest first, starting just below `newest_ms`.
pub fn page_of(count: usize, newest_ms: i64) -> Page {
    let records: Vec<_> = (0..count)
        .map(|i| record(&format!("t{}", newest_ms - i as i64), newest_ms - i as i64 * 1_000))
        .collect();
    Page {
        raw_count: records.len(),
        records,
    }
}

/// Client whose responses are released one at a time, so tests can observe in-flight state.
pub struct GatedClient {
    responses: Mutex<VecDeque<Result<Page, FetchError>>>,
    pub calls: Mutex<Vec<Option<i64>>>,
    gate: Notify,
}

impl GatedClient {
    pub fn new(responses: Vec<Result<Page, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            gate: Notify::new(),
        }
    }

    /// Let one waiting fetch complete.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Yield until at least `count` fetches have been issued.
    pub async fn wait_for_calls(&self, count: usize) {
        while self.call_count() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait::async_trait]
impl HistoryClient for GatedClient {
    async fn fetch_page(
        &self,
        _credential: &AccessToken,
        _page_size: u32,
        before: Option<i64>,
    ) -> Result<Page, FetchError> {
        // Responses are handed out in call order, whenever each call completes
        let response = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Page::default()));
        self.calls.lock().push(before);
        self.gate.notified().await;
        response
    }
}
