//! Stepping and breakpoint control.

use crate::event::EventKind;
use std::collections::HashSet;

/// How the debugger advances between prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Prompt on every event.
    Free,
    /// Run until a breakpoint fires.
    UntilBreak,
}

/// The class a breakpoint is keyed to.
///
/// Rescan and lex breakpoints are accepted by the command grammar but never
/// trip; only calls and expansions are meaningful stopping points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakClass {
    Call,
    Expand,
    Rescan,
    Lex,
}

#[derive(Debug)]
pub struct Stepper {
    mode: Mode,
    steps_remaining: usize,
    call_breakpoints: HashSet<String>,
    expanded_breakpoints: HashSet<String>,
}

impl Stepper {
    pub fn new(mode: Mode) -> Stepper {
        Stepper {
            mode,
            steps_remaining: 0,
            call_breakpoints: HashSet::new(),
            expanded_breakpoints: HashSet::new(),
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Request `n` more events before the next blocking prompt.
    pub fn request_steps(&mut self, n: usize) {
        self.steps_remaining = n;
    }

    /// Whether a step request is outstanding, meaning a blocked prompt
    /// should return to the engine.
    pub fn steps_pending(&self) -> bool {
        self.steps_remaining > 0
    }

    /// Whether this event requests a prompt at all.
    pub fn wants_prompt(&self, kind: EventKind, head: &str) -> bool {
        match self.mode {
            Mode::Free => true,
            Mode::UntilBreak => match kind {
                EventKind::Call => self.call_breakpoints.contains(head),
                EventKind::Expanded => self.expanded_breakpoints.contains(head),
                EventKind::Rescanned | EventKind::Lexed => false,
            },
        }
    }

    /// Consume one outstanding step. Returns true when the prompt should
    /// actually block.
    pub fn take_step(&mut self) -> bool {
        if self.steps_remaining > 0 {
            self.steps_remaining -= 1;
        }
        self.steps_remaining == 0
    }

    pub fn add_breakpoint(&mut self, class: BreakClass, name: &str) {
        match class {
            BreakClass::Call => {
                self.call_breakpoints.insert(name.to_string());
            }
            BreakClass::Expand => {
                self.expanded_breakpoints.insert(name.to_string());
            }
            BreakClass::Rescan | BreakClass::Lex => {}
        }
    }

    pub fn remove_breakpoint(&mut self, class: BreakClass, name: &str) {
        match class {
            BreakClass::Call => {
                self.call_breakpoints.remove(name);
            }
            BreakClass::Expand => {
                self.expanded_breakpoints.remove(name);
            }
            BreakClass::Rescan | BreakClass::Lex => {}
        }
    }
}
