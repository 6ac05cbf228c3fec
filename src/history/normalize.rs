use chrono::{DateTime, Local};

use crate::history::error::FetchError;
use crate::history::types::{
    Page, PlayHistoryItem, PlayRecord, RecentlyPlayedResponse, UNKNOWN_ARTIST,
};

/// Translate a successful recently-played body into a page of records.
///
/// Fails as a whole if any item is missing a required field.
pub fn normalize_response(response: RecentlyPlayedResponse) -> Result<Page, FetchError> {
    let items = response
        .items
        .ok_or_else(|| FetchError::malformed("response has no `items` field"))?;
    let raw_count = items.len();

    let records = items
        .into_iter()
        .map(normalize_item)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page { records, raw_count })
}

pub fn normalize_item(item: PlayHistoryItem) -> Result<PlayRecord, FetchError> {
    let track = item.track;
    let track_id = track
        .id
        .ok_or_else(|| FetchError::malformed(format!("track `{}` has no id", track.name)))?;
    let detail_url = track.external_urls.spotify.ok_or_else(|| {
        FetchError::malformed(format!("track `{}` has no Spotify link", track_id))
    })?;
    let played_at_epoch_ms = parse_played_at(&item.played_at)?;

    let artist_name = track
        .artists
        .into_iter()
        .next()
        .map(|artist| artist.name)
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    // Spotify lists images largest first
    let thumbnail_url = track
        .album
        .images
        .last()
        .map(|image| image.url.clone())
        .unwrap_or_default();

    Ok(PlayRecord {
        id: format!("{}-{}", track_id, played_at_epoch_ms),
        track_id,
        track_name: track.name,
        artist_name,
        played_at_epoch_ms,
        played_at_display: format_played_at(played_at_epoch_ms),
        detail_url,
        thumbnail_url,
    })
}

/// Parse an ISO-8601 `played_at` value into milliseconds since the epoch.
pub fn parse_played_at(played_at: &str) -> Result<i64, FetchError> {
    DateTime::parse_from_rfc3339(played_at)
        .map(|timestamp| timestamp.timestamp_millis())
        .map_err(|error| {
            FetchError::malformed(format!("invalid played_at `{}`: {}", played_at, error))
        })
}

/// Render a timestamp in the local time zone, e.g. `5/1/2024, 2:34:56 PM`.
pub fn format_played_at(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|timestamp| {
            timestamp
                .with_timezone(&Local)
                .format("%-m/%-d/%Y, %-I:%M:%S %p")
                .to_string()
        })
        .unwrap_or_default()
}
