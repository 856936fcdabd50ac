use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use geochat_core::Phase;
use crate::app::App;
use crate::render::message_lines;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let error_height = app
        .session
        .error()
        .map(|error| wrapped_rows(&error_paragraph(error), area.width.saturating_sub(2)).max(1) + 2)
        .unwrap_or(0);

    // Main layout: header, chat, error banner, input, footer
    let [header_area, chat_area, error_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(0),
        Constraint::Length(error_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if error_height > 0 {
        render_error(app, frame, error_area);
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

/// Rows the paragraph takes once ratatui word-wraps it at `width` columns
fn wrapped_rows(paragraph: &Paragraph, width: u16) -> u16 {
    paragraph.line_count(width.max(1)).min(u16::MAX as usize) as u16
}

fn error_paragraph(error: &str) -> Paragraph<'static> {
    Paragraph::new(error.to_string())
        .style(Style::default().fg(Color::LightRed))
        .wrap(Wrap { trim: true })
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let location = match (app.session.location(), app.session.phase()) {
        (Some(location), _) => Span::styled(format!("⌖ {}", location), Style::default().fg(Color::Green)),
        (None, Phase::Error) => Span::styled("location unavailable", Style::default().fg(Color::Red)),
        (None, _) => Span::styled("locating…", Style::default().fg(Color::DarkGray)),
    };

    let title = Line::from(vec![
        Span::styled(" GeoChat AI ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let subtitle = Line::from(vec![
        Span::styled(" Your AI-powered local guide  ", Style::default().fg(Color::Gray)),
        location,
    ]);

    let header = Paragraph::new(Text::from(vec![title, subtitle]));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} ", app.model));

    let mut lines: Vec<Line> = Vec::new();

    if app.session.messages().is_empty() && !app.session.is_loading() {
        let hint = if app.session.location().is_some() {
            "Ask about places, restaurants, or points of interest around you."
        } else {
            "Waiting for your location..."
        };
        lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))));
    }

    for message in app.session.messages() {
        lines.extend(message_lines(message));
    }

    if app.session.is_loading() {
        lines.push(Line::from(Span::styled(
            "GeoChat:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    // Count rows before the block is attached so borders are not included
    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    app.update_scroll(wrapped_rows(&chat, app.chat_width));

    let chat = chat.block(chat_block).scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_error(app: &App, frame: &mut Frame, area: Rect) {
    let Some(error) = app.session.error() else {
        return;
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(Span::styled(" Error ", Style::default().fg(Color::Red).bold()));

    let banner = error_paragraph(error).block(block);

    frame.render_widget(banner, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let enabled = app.input_enabled();
    let border_color = if enabled { Color::Yellow } else { Color::DarkGray };

    let mut title = vec![Span::raw(" Message ")];
    if app.composer.is_listening() {
        title.push(Span::styled("● Listening ", Style::default().fg(Color::Red).bold()));
    }

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Line::from(title));

    let draft = app.composer.draft();
    if draft.is_empty() {
        let placeholder = if app.session.location().is_none() {
            "Please enable location to chat"
        } else {
            "Where can I find the best coffee?"
        };
        let input = Paragraph::new(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
            .block(input_block);
        frame.render_widget(input, area);
        if enabled {
            frame.set_cursor_position((area.x + 1, area.y + 1));
        }
        return;
    }

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.composer.cursor();

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = draft.chars().skip(scroll_offset).take(inner_width).collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(if enabled { Color::Cyan } else { Color::DarkGray }))
        .block(input_block);

    frame.render_widget(input, area);

    if enabled {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(Color::Gray);

    if let Some(notice) = &app.notice {
        let footer = Paragraph::new(Span::styled(format!(" {}", notice), Style::default().fg(Color::Yellow)));
        frame.render_widget(footer, area);
        return;
    }

    let mut hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" ↑↓/PgUp/PgDn/^End ", key_style),
        Span::styled(" scroll ", label_style),
    ];
    if app.has_dictation() {
        let label = if app.composer.is_listening() { " stop dictation " } else { " dictate " };
        hints.push(Span::styled(" Ctrl+R ", key_style));
        hints.push(Span::styled(label, label_style));
    }
    hints.push(Span::styled(" Esc ", key_style));
    hints.push(Span::styled(" quit ", label_style));

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}
