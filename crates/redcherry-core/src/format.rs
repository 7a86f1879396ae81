//! Display formatting for assistant replies and plain-text transcripts.

use crate::message::Message;

const BULLET_MARKER: char = '-';

/// One rendered line of an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayLine {
    /// Marker stripped, surrounding whitespace trimmed.
    Bullet(String),
    /// Original line, untouched. Blank lines come through as `Plain("")`.
    Plain(String),
}

/// Whitespace trim that also drops a byte-order mark, as browsers do.
pub(crate) fn trim_text(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

/// Split a reply on line breaks and pick out `-` bullet lines.
pub fn format_response(text: &str) -> Vec<DisplayLine> {
    text.split('\n')
        .map(|line| {
            match trim_text(line).strip_prefix(BULLET_MARKER) {
                Some(rest) => DisplayLine::Bullet(trim_text(rest).to_string()),
                None => DisplayLine::Plain(line.to_string()),
            }
        })
        .collect()
}

/// Render the log as a `Human:` / `Assistant:` transcript.
pub fn format_conversation(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|msg| {
            if msg.is_user() {
                format!("Human: {}", msg.text)
            } else {
                format!("Assistant: {}", msg.text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
