//! Preprocessing events and their rendering.

use crate::tokens::write_tokens;
use colored::Colorize;
use ppstep_engine::Token;
use std::fmt::Write;

/// The kind tag of an event, used for breakpoint and prompt decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Call,
    Expanded,
    Rescanned,
    Lexed,
}

impl EventKind {
    /// The prompt trigger word for this event.
    pub fn trigger(self) -> &'static str {
        match self {
            EventKind::Call => "called",
            EventKind::Expanded => "expanded",
            EventKind::Rescanned => "rescanned",
            EventKind::Lexed => "lexed",
        }
    }
}

/// One observed preprocessing event.
///
/// `start..end` spans index into the [`HistoryEntry::tokens`] snapshot the
/// event was recorded with.
#[derive(Debug, Clone)]
pub enum Event {
    /// A macro invocation was recognized.
    Call {
        tokens: Vec<Token>,
        start: usize,
        end: usize,
    },
    /// `initial` was replaced by the result now sitting in `start..end`.
    Expanded {
        initial: Vec<Token>,
        start: usize,
        end: usize,
    },
    /// `initial` (caused by `cause`) was rescanned and replaced.
    Rescanned {
        cause: Vec<Token>,
        initial: Vec<Token>,
        start: usize,
        end: usize,
    },
    /// One newly lexed token was appended to the emitted prefix.
    Lexed,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Call { .. } => EventKind::Call,
            Event::Expanded { .. } => EventKind::Expanded,
            Event::Rescanned { .. } => EventKind::Rescanned,
            Event::Lexed => EventKind::Lexed,
        }
    }

    pub fn span(&self) -> Option<(usize, usize)> {
        match self {
            Event::Call { start, end, .. }
            | Event::Expanded { start, end, .. }
            | Event::Rescanned { start, end, .. } => Some((*start, *end)),
            Event::Lexed => None,
        }
    }

    /// The sequence this event describes; the slice `tokens[start..end]` of
    /// the history entry equals it under sanitation equality.
    pub fn representative(&self) -> Option<&[Token]> {
        match self {
            Event::Call { tokens, .. } => Some(tokens),
            Event::Expanded { initial, .. } | Event::Rescanned { initial, .. } => Some(initial),
            Event::Lexed => None,
        }
    }

    fn highlight(&self, text: &str) -> String {
        match self {
            Event::Call { .. } => text.on_white().black().to_string(),
            Event::Expanded { .. } => text.on_yellow().black().to_string(),
            Event::Rescanned { .. } => text.on_blue().white().to_string(),
            Event::Lexed => text.bold().to_string(),
        }
    }

    /// Render the stream snapshot with this event's span highlighted.
    pub fn print(&self, tokens: &[Token]) -> String {
        let mut out = String::new();
        match self.span() {
            None => {
                out.push_str(&write_tokens(tokens).bold().to_string());
            }
            Some((start, end)) => {
                let start = start.min(tokens.len());
                let end = end.clamp(start, tokens.len());
                if start > 0 {
                    let _ = write!(out, "{} ", write_tokens(&tokens[..start]).bold());
                }
                if start == end {
                    out.push_str(&self.highlight(" "));
                } else {
                    out.push_str(&self.highlight(&write_tokens(&tokens[start..end])));
                }
                if end < tokens.len() {
                    let _ = write!(out, " {}", write_tokens(&tokens[end..]).bold());
                }
            }
        }
        out
    }

    /// Explain the event in words, for the `what` command.
    pub fn explain(&self, newest_tokens: &[Token]) -> String {
        match self {
            Event::Call { tokens, .. } => {
                format!("called macro {}", write_tokens(tokens).on_white().black())
            }
            Event::Expanded { initial, .. } => {
                format!("expanded macro {}", write_tokens(initial).on_white().black())
            }
            Event::Rescanned { cause, initial, .. } => format!(
                "rescanned macro {}\ncaused by {}",
                write_tokens(initial).on_yellow().black(),
                write_tokens(cause).on_white().black()
            ),
            Event::Lexed => match newest_tokens.last() {
                Some(token) => format!("lexed token {}", token.text().bold()),
                None => "lexed token".to_string(),
            },
        }
    }
}

/// A snapshot of the full logical stream at the moment of an event.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub tokens: Vec<Token>,
    pub event: Event,
}
