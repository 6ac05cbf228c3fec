use serde::{Deserialize, Serialize};

/// Number of plays requested per page.
pub const PAGE_SIZE: u32 = 20;

/// Artist name used when Spotify does not list any artist for a track.
pub const UNKNOWN_ARTIST: &str = "Unknown";

/// A single playback event, ready to be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayRecord {
    /// `{track_id}-{played_at_epoch_ms}`, so the same track played twice yields two records.
    pub id: String,
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub played_at_epoch_ms: i64,
    pub played_at_display: String,
    pub detail_url: String,
    /// Empty when the album has no artwork.
    pub thumbnail_url: String,
}

/// One bounded batch of plays returned by a single fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<PlayRecord>,
    /// Number of items Spotify returned, used to decide whether another page exists.
    pub raw_count: usize,
}

impl Page {
    /// Oldest timestamp in the page, if it holds any record.
    pub fn oldest_played_at(&self) -> Option<i64> {
        self.records.iter().map(|r| r.played_at_epoch_ms).min()
    }
}

/* ---------- Wire format ---------- */

/// Response body of `GET /me/player/recently-played`.
///
/// Notes
/// - `items` is newest-first.
/// - Spotify may embed an `error` object instead of (or next to) the items.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentlyPlayedResponse {
    pub items: Option<Vec<PlayHistoryItem>>,
    #[serde(default)]
    pub error: Option<SpotifyErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayHistoryItem {
    /// ISO-8601 timestamp, e.g. `2024-05-01T12:34:56.789Z`.
    pub played_at: String,
    pub track: SpotifyTrack,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub external_urls: SpotifyExternalUrls,
    pub album: SpotifyAlbum,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyExternalUrls {
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyAlbum {
    /// Largest first, smallest last.
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

/// Structured error object returned by the Web API.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyErrorBody {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Envelope used by non-2xx responses: `{"error": {"status": 401, "message": "..."}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyErrorResponse {
    pub error: SpotifyErrorBody,
}
