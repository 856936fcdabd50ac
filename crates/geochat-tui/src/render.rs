//! Turn stored messages into styled terminal lines

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use geochat_core::markdown::{self, Block, Inline};
use geochat_core::{GroundingChunk, Message, Role};

const MAP_ICON: &str = "⌖";
const WEB_ICON: &str = "◉";

fn inline_spans(inlines: Vec<Inline>) -> Vec<Span<'static>> {
    inlines
        .into_iter()
        .map(|inline| match inline {
            Inline::Text(text) => Span::raw(text),
            Inline::Strong(text) => Span::styled(text, Style::default().add_modifier(Modifier::BOLD)),
        })
        .collect()
}

fn markdown_lines(text: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for block in markdown::parse(text) {
        match block {
            Block::Paragraph(inlines) => lines.push(Line::from(inline_spans(inlines))),
            Block::List(items) => {
                for item in items {
                    let mut spans = vec![Span::styled("  • ", Style::default().fg(Color::DarkGray))];
                    spans.extend(inline_spans(item));
                    lines.push(Line::from(spans));
                }
            }
        }
    }
    lines
}

/// One citation: icon and title, then the link on its own line
fn source_lines(chunk: &GroundingChunk) -> Vec<Line<'static>> {
    let (icon, color) = if chunk.is_maps() {
        (MAP_ICON, Color::Green)
    } else {
        (WEB_ICON, Color::Blue)
    };

    let label = chunk.title().or(chunk.uri()).unwrap_or_default().to_string();
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("  {} ", icon), Style::default().fg(color)),
        Span::styled(label, Style::default().fg(Color::Gray)),
    ])];

    if let Some(uri) = chunk.uri() {
        lines.push(Line::from(Span::styled(
            format!("    {}", uri),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::UNDERLINED),
        )));
    }

    for snippet in chunk.review_snippets() {
        if let Some(text) = snippet.text.as_deref().filter(|t| !t.trim().is_empty()) {
            lines.push(Line::from(Span::styled(
                format!("    “{}”", text.trim()),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
    }

    lines
}

/// Lines for a single message: author label, body, sources, blank separator
pub fn message_lines(message: &Message) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    match message.role {
        Role::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            // Verbatim, no markdown
            for line in message.text.split('\n') {
                lines.push(Line::from(line.to_string()));
            }
        }
        Role::Model => {
            lines.push(Line::from(Span::styled(
                "GeoChat:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.extend(markdown_lines(&message.text));
        }
    }

    let citable: Vec<&GroundingChunk> = message.chunks().iter().filter(|c| c.is_citable()).collect();
    if !citable.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "  SOURCES",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
        )));
        for chunk in citable {
            lines.extend(source_lines(chunk));
        }
    }

    lines.push(Line::default());
    lines
}
