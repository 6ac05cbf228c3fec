use crate::history_tui::app::{App, AppMode};
use crate::history_tui::widgets;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, Paragraph, Wrap},
};

/// Each record takes a title line and a details line.
const LINES_PER_ITEM: u16 = 2;

pub fn render(frame: &mut Frame, app: &App) {
    render_history(frame, app);
    if app.mode == AppMode::Error {
        render_error(frame, app);
    }
}

fn render_history(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // History list
            Constraint::Length(3), // Selected track link
            Constraint::Length(1), // Help text
        ])
        .split(area);

    // Header
    let header_text = match app.status_message.as_deref() {
        Some(status) => format!("Recently Played ({} tracks) - {}", app.view.records.len(), status),
        None => format!("Recently Played ({} tracks)", app.view.records.len()),
    };
    let header = Block::default()
        .borders(Borders::ALL)
        .title(header_text)
        .title_style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(header, chunks[0]);

    // History list
    if app.view.is_loading_initial {
        let loading = Paragraph::new("Loading...")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL))
            .style(Style::default().fg(Color::Green));
        frame.render_widget(loading, chunks[1]);
    } else if app.view.records.is_empty() {
        let empty = Paragraph::new("No tracks played in the last month were found.")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, chunks[1]);
    } else {
        render_list(frame, app, chunks[1]);
    }

    // Selected track link
    let link = app
        .view
        .records
        .get(app.selection.index)
        .map(|record| record.detail_url.as_str())
        .unwrap_or("");
    let link_para = Paragraph::new(link).block(Block::bordered().title("Open in Spotify"));
    frame.render_widget(link_para, chunks[2]);

    // Help text
    let help = Paragraph::new("[r: Refresh] [↑↓/jk: Navigate] [PgUp/PgDn] [q: Quit]")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[3]);
}

fn render_list(frame: &mut Frame, app: &App, area: Rect) {
    let visible = (area.height.saturating_sub(2) / LINES_PER_ITEM).max(1) as usize;
    // Reserve the last row for the loading indicator while a page is coming in
    let visible_records = if app.view.is_loading_more {
        visible.saturating_sub(1).max(1)
    } else {
        visible
    };
    let offset = (app.selection.index + 1).saturating_sub(visible_records);
    let now_ms = chrono::Utc::now().timestamp_millis();

    let mut items: Vec<_> = app
        .view
        .records
        .iter()
        .enumerate()
        .skip(offset)
        .take(visible_records)
        .map(|(idx, record)| {
            widgets::render_record_item(record, idx == app.selection.index, now_ms)
        })
        .collect();

    if app.view.is_loading_more {
        items.push(ratatui::widgets::ListItem::new(Line::styled(
            "   Loading more...",
            Style::default().fg(Color::Green),
        )));
    } else if !app.view.has_more && offset + visible_records >= app.view.records.len() {
        items.push(ratatui::widgets::ListItem::new(Line::styled(
            "   End of history",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let list = List::new(items).block(Block::default().borders(Borders::ALL));
    frame.render_widget(list, area);
}

fn render_error(frame: &mut Frame, app: &App) {
    let area = centered_rect(60, 30, frame.area());

    let mut text = app
        .error
        .as_ref()
        .map(|notice| notice.message.clone())
        .unwrap_or_else(|| "Unknown error".to_string());
    if app.error.as_ref().is_some_and(|notice| notice.requires_login()) {
        text.push_str("\n\nRun `spotify-history login` to get a new access token.");
    }
    text.push_str("\n\n[Enter/Esc: Dismiss]");

    let error_para = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Error")
                .title_style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        )
        .style(Style::default().fg(Color::Red))
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, area);
    frame.render_widget(error_para, area);
}

/// A rectangle of `percent_x` by `percent_y` centered in `area`
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
