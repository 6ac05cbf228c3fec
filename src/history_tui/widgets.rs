use std::time::Duration;

use ratatui::{prelude::*, widgets::ListItem};
use spotify_history::history::PlayRecord;

/// Format how long ago a track was played, e.g. `5m ago` or `2h 3m ago`
pub fn format_age(now_ms: i64, played_at_ms: i64) -> String {
    let seconds = (now_ms - played_at_ms).max(0) as u64 / 1000;
    if seconds < 60 {
        return "just now".to_string();
    }

    // Minutes are enough precision for the last day, hours after that
    let rounded = if seconds < 24 * 3600 {
        seconds / 60 * 60
    } else {
        seconds / 3600 * 3600
    };
    format!(
        "{} ago",
        humantime::format_duration(Duration::from_secs(rounded))
    )
}

/// Render a history item
pub fn render_record_item(record: &PlayRecord, is_selected: bool, now_ms: i64) -> ListItem<'_> {
    let prefix = if is_selected { "> " } else { "  " };
    let style = if is_selected {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };

    let title = Line::from(vec![
        Span::styled(prefix, style),
        Span::styled(record.track_name.as_str(), style),
    ]);

    let details = Line::from(vec![
        Span::raw("   "),
        Span::styled(
            record.artist_name.as_str(),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            format!(
                "  ·  {} ({})",
                record.played_at_display,
                format_age(now_ms, record.played_at_epoch_ms)
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    ListItem::new(vec![title, details])
}
