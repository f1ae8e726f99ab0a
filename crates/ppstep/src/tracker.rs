//! The expansion tracker.
//!
//! The engine reports expansions as opaque token sequences; it never hands
//! out absolute positions. The tracker therefore maintains its own model of
//! the current logical line as a stack of *frames*, each holding the latest
//! known version of the surrounding token sequence plus a lower bound for
//! pattern searches. Because expansion proceeds strictly left to right, an
//! expansion result always lies at or after its call site, so a bounded
//! leftmost search inside the most recently reported frame locates where
//! each result belongs. When the engine's accounting diverges from ours
//! (conditional suppression, lex catch-up mid-expansion), frames are popped
//! greedily and, in the worst case, the model is rebased on the reported
//! result alone — well-formed history is always preferred over aborting.
//!
//! Committed output lives in `lexed_prefix`, which grows monotonically and
//! never mutates. While frames are pending, lexed tokens are buffered; once
//! the buffer equals the unsettled tail of the newest history entry, the
//! engine has caught up with the model and the stream settles.

use crate::event::{Event, EventKind, HistoryEntry};
use crate::tokens::find_subseq;
use ppstep_engine::Token;

/// An in-flight expansion frame.
#[derive(Debug)]
pub struct Frame {
    tokens: Vec<Token>,
    /// Lower bound for pattern searches; equal to `tokens.len()` when the
    /// frame is inert and only consumable by lex catch-up.
    search_from: usize,
}

impl Frame {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    fn find(&self, pattern: &[Token]) -> Option<(usize, usize)> {
        if pattern.is_empty() {
            return None;
        }
        find_subseq(&self.tokens, pattern, self.search_from)
    }
}

/// What a tracker operation observed, for the stepper and recorder.
#[derive(Debug, Clone)]
pub struct Step {
    pub kind: EventKind,
    /// First token of the event's representative sequence; its text is the
    /// breakpoint key.
    pub head: Token,
}

/// Tracker state: the settled prefix, the pending frames, the append-only
/// history and the catch-up buffer.
#[derive(Debug, Default)]
pub struct Tracker {
    lexed_prefix: Vec<Token>,
    frames: Vec<Frame>,
    history: Vec<HistoryEntry>,
    lex_buffer: Vec<Token>,
}

impl Tracker {
    pub fn new() -> Tracker {
        Tracker::default()
    }

    pub fn newest_history(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn lexed_prefix(&self) -> &[Token] {
        &self.lexed_prefix
    }

    /// One output token was emitted.
    ///
    /// With no pending frames the token is committed immediately and logged.
    /// Otherwise the engine is re-emitting tokens the expansion entries
    /// already describe, so the token is only buffered; when the buffer
    /// equals the unsettled tail of the newest history entry, the emission
    /// has caught up with the model and the stream settles. No history entry
    /// is produced for the catch-up case.
    pub fn on_lexed(&mut self, token: Token) -> Option<Step> {
        if self.frames.is_empty() {
            let mut tokens = match self.history.last() {
                Some(entry) => entry.tokens.clone(),
                None => Vec::new(),
            };
            tokens.push(token.clone());
            self.lexed_prefix.push(token.clone());
            self.history.push(HistoryEntry {
                tokens,
                event: Event::Lexed,
            });
            return Some(Step {
                kind: EventKind::Lexed,
                head: token,
            });
        }

        self.lex_buffer.push(token);
        let newest = &self.history.last().expect("frames imply history").tokens;
        let tail = newest.get(self.lexed_prefix.len()..).unwrap_or_default();
        if tail == self.lex_buffer.as_slice() {
            self.lexed_prefix.append(&mut self.lex_buffer);
            self.frames.clear();
        }
        None
    }

    /// A macro invocation was recognized. `call_tokens` is the sanitized
    /// full form of the invocation.
    pub fn on_call(&mut self, call_tokens: Vec<Token>) -> Option<Step> {
        if call_tokens.is_empty() {
            return None;
        }
        let head = call_tokens[0].clone();

        if let Some(top) = self.frames.last() {
            if let Some((start, end)) = top.find(&call_tokens) {
                // The call sits within the top frame's own text; no new
                // frame is needed.
                let tokens = self.prepend_lexed(top.tokens.clone());
                let offset = self.lexed_prefix.len();
                self.history.push(HistoryEntry {
                    tokens,
                    event: Event::Call {
                        tokens: call_tokens,
                        start: offset + start,
                        end: offset + end,
                    },
                });
                return Some(Step {
                    kind: EventKind::Call,
                    head,
                });
            }
            // No match anywhere useful: treat this as a fresh outer
            // invocation.
            self.frames.clear();
        }

        let offset = self.lexed_prefix.len();
        let event = Event::Call {
            tokens: call_tokens.clone(),
            start: offset,
            end: offset + call_tokens.len(),
        };
        self.push_frame(call_tokens, 0, event);
        Some(Step {
            kind: EventKind::Call,
            head,
        })
    }

    /// `initial` has been replaced by `result`.
    pub fn on_expanded(&mut self, initial: Vec<Token>, result: Vec<Token>) -> Option<Step> {
        if initial.is_empty() {
            return None;
        }
        let head = initial[0].clone();
        self.splice(initial, result, |initial, start, end| Event::Expanded {
            initial,
            start,
            end,
        });
        Some(Step {
            kind: EventKind::Expanded,
            head,
        })
    }

    /// `initial` (caused by `cause`) was rescanned into `result`.
    ///
    /// A rescan of nothing is ignored.
    pub fn on_rescanned(
        &mut self,
        cause: Vec<Token>,
        initial: Vec<Token>,
        result: Vec<Token>,
    ) -> Option<Step> {
        if initial.is_empty() {
            return None;
        }
        let head = initial[0].clone();
        self.splice(initial, result, move |initial, start, end| Event::Rescanned {
            cause,
            initial,
            start,
            end,
        });
        Some(Step {
            kind: EventKind::Rescanned,
            head,
        })
    }

    /// Locate `initial` in the pending frames, popping frames whose text
    /// cannot contain it, and splice `result` over the match. On a clean
    /// miss the model is rebased on `result` alone behind an inert frame.
    fn splice<F>(&mut self, initial: Vec<Token>, result: Vec<Token>, make_event: F)
    where
        F: FnOnce(Vec<Token>, usize, usize) -> Event,
    {
        let found = loop {
            match self.frames.last() {
                None => break None,
                Some(top) => match top.find(&initial) {
                    Some(span) => break Some(span),
                    None => {
                        self.frames.pop();
                    }
                },
            }
        };

        let offset = self.lexed_prefix.len();
        match found {
            Some((start, end)) => {
                let top = self.frames.last().expect("match implies a frame");
                let mut new_tokens = Vec::with_capacity(top.tokens.len() + result.len());
                new_tokens.extend_from_slice(&top.tokens[..start]);
                new_tokens.extend_from_slice(&result);
                let new_end = new_tokens.len();
                new_tokens.extend_from_slice(&top.tokens[end..]);

                let event = make_event(initial, offset + start, offset + new_end);
                self.push_frame(new_tokens, start, event);
            }
            None => {
                // Recovery: the engine reported something our model never
                // saw. Rebase on the result alone.
                let event = make_event(initial, offset, offset + result.len());
                let inert_from = result.len();
                self.push_frame(result, inert_from, event);
            }
        }
    }

    fn push_frame(&mut self, tokens: Vec<Token>, search_from: usize, event: Event) {
        self.history.push(HistoryEntry {
            tokens: self.prepend_lexed(tokens.clone()),
            event,
        });
        self.frames.push(Frame {
            tokens,
            search_from,
        });
    }

    fn prepend_lexed(&self, tokens: Vec<Token>) -> Vec<Token> {
        let mut acc = self.lexed_prefix.clone();
        acc.extend(tokens);
        acc
    }
}
