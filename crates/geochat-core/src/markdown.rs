//! The small markdown subset used in model answers
//!
//! Only two constructs are recognized: bullet lists (`* ` or `- ` at the
//! start of a line) and `**bold**` spans. Everything else is plain text.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    List(Vec<Vec<Inline>>),
}

/// Split a line into plain and `**bold**` spans. An unmatched `**` is kept
/// as literal text.
pub fn parse_inline(text: &str) -> Vec<Inline> {
    let mut spans: Vec<Inline> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            // Consume the second *
            chars.next();

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close {
                if !current_text.is_empty() {
                    spans.push(Inline::Text(std::mem::take(&mut current_text)));
                }
                if !bold_text.is_empty() {
                    spans.push(Inline::Strong(bold_text));
                }
            } else {
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Inline::Text(current_text));
    }

    spans
}

fn list_item(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    trimmed
        .strip_prefix("* ")
        .or_else(|| trimmed.strip_prefix("- "))
}

/// Group lines into paragraphs and bullet lists
pub fn parse(text: &str) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut items: Vec<Vec<Inline>> = Vec::new();

    for line in text.lines() {
        if let Some(item) = list_item(line) {
            items.push(parse_inline(item));
            continue;
        }

        if !items.is_empty() {
            blocks.push(Block::List(std::mem::take(&mut items)));
        }
        if !line.trim().is_empty() {
            blocks.push(Block::Paragraph(parse_inline(line)));
        }
    }

    if !items.is_empty() {
        blocks.push(Block::List(items));
    }

    if blocks.is_empty() {
        blocks.push(Block::Paragraph(vec![Inline::Text(text.to_string())]));
    }

    blocks
}
