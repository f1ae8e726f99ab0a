//! The debugger session: the engine adapter and everything it drives.
//!
//! [`Session`] implements the engine's [`Hooks`] contract. Each hook is
//! sanitized and forwarded to the tracker as one of four events; preserved
//! flavors of every surfaced sequence are kept alongside so the recorder can
//! write faithful text. The session also maintains the display stacks for
//! `backtrace`/`forwardtrace`, the conditional-evaluation and fatal-error
//! suppression flags, and the stepper that decides when the prompt blocks.

use crate::recorder::Recorder;
use crate::repl::{self, LineReader, TerminalReader};
use crate::stepper::{Mode, Stepper};
use crate::tokens::{self, preserve, sanitize};
use crate::tracker::{Step, Tracker};
use ppstep_engine::{Diagnostic, Hooks, Preprocessor, Severity, Token};
use std::path::PathBuf;

/// Session configuration.
pub struct SessionOptions {
    /// Decorates the prompt, e.g. `pp [prefix]> `.
    pub prefix: String,
    pub initial_mode: Mode,
    /// Start recording to this file immediately.
    pub record_to: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> SessionOptions {
        SessionOptions {
            prefix: String::new(),
            initial_mode: Mode::Free,
            record_to: None,
        }
    }
}

/// A sequence carried in both flavors.
#[derive(Debug, Clone)]
pub struct SeqPair {
    pub sanitized: Vec<Token>,
    pub preserved: Vec<Token>,
}

impl SeqPair {
    fn new(tokens: &[Token]) -> SeqPair {
        SeqPair {
            sanitized: sanitize(tokens),
            preserved: preserve(tokens),
        }
    }
}

pub struct Session {
    pub(crate) tracker: Tracker,
    pub(crate) stepper: Stepper,
    pub(crate) recorder: Recorder,
    pub(crate) prefix: String,
    pub(crate) reader: Box<dyn LineReader>,
    /// Pending macro invocations, outermost first.
    pub(crate) expanding: Vec<SeqPair>,
    /// Pending (cause, initial) rescan pairs, outermost first.
    pub(crate) rescanning: Vec<(SeqPair, SeqPair)>,
    evaluating_conditional: bool,
    fatal_error: bool,
}

impl Session {
    pub fn new(options: SessionOptions) -> Session {
        Session::with_reader(options, Box::<TerminalReader>::default())
    }

    /// Create a session reading prompt input from `reader` instead of the
    /// terminal. This is how the session is driven in tests.
    pub fn with_reader(options: SessionOptions, reader: Box<dyn LineReader>) -> Session {
        let mut recorder = Recorder::default();
        if let Some(path) = &options.record_to {
            if !recorder.start(path) {
                println!("Failed to open {} for recording", path.display());
            }
        }
        Session {
            tracker: Tracker::new(),
            stepper: Stepper::new(options.initial_mode),
            recorder,
            prefix: options.prefix,
            reader,
            expanding: Vec::new(),
            rescanning: Vec::new(),
            evaluating_conditional: false,
            fatal_error: false,
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    fn suppressed(&self) -> bool {
        self.evaluating_conditional || self.fatal_error
    }

    fn step_notify(&mut self, pp: &mut Preprocessor, step: Step) -> anyhow::Result<()> {
        if self.stepper.wants_prompt(step.kind, step.head.text()) {
            repl::prompt(self, pp, step.kind.trigger(), true)?;
        }
        Ok(())
    }
}

impl Hooks for Session {
    fn start(&mut self, pp: &mut Preprocessor) -> anyhow::Result<()> {
        println!("Preprocessing {}.", pp.main_file());
        repl::prompt(self, pp, "started", false)
    }

    fn lexed_token(&mut self, pp: &mut Preprocessor, token: &Token) -> anyhow::Result<()> {
        if self.suppressed() || !tokens::is_substantive(token) {
            return Ok(());
        }
        if let Some(step) = self.tracker.on_lexed(token.clone()) {
            self.recorder.record_lexed(token);
            self.step_notify(pp, step)?;
        }
        Ok(())
    }

    fn expanding_function_like_macro(
        &mut self,
        pp: &mut Preprocessor,
        _macro_def: &Token,
        _formals: &[Token],
        _definition: &[Token],
        _call: &Token,
        arguments: &[Vec<Token>],
        call_tokens: &[Token],
    ) -> anyhow::Result<bool> {
        if self.suppressed() {
            return Ok(false);
        }
        let call_pair = SeqPair::new(call_tokens);
        let preserved_args: Vec<Vec<Token>> = arguments.iter().map(|a| preserve(a)).collect();
        self.recorder.record_call(&call_pair.preserved, &preserved_args);

        let step = self.tracker.on_call(call_pair.sanitized.clone());
        if let Some(step) = step {
            self.step_notify(pp, step)?;
        }
        self.expanding.push(call_pair);
        Ok(false)
    }

    fn expanding_object_like_macro(
        &mut self,
        pp: &mut Preprocessor,
        _macro_def: &Token,
        _definition: &[Token],
        call: &Token,
    ) -> anyhow::Result<bool> {
        if self.suppressed() {
            return Ok(false);
        }
        let call_pair = SeqPair::new(std::slice::from_ref(call));
        self.recorder.record_call(&call_pair.preserved, &[]);

        let step = self.tracker.on_call(call_pair.sanitized.clone());
        if let Some(step) = step {
            self.step_notify(pp, step)?;
        }
        self.expanding.push(call_pair);
        Ok(false)
    }

    fn expanded_macro(&mut self, pp: &mut Preprocessor, result: &[Token]) -> anyhow::Result<()> {
        if self.suppressed() {
            return Ok(());
        }
        let initial = match self.expanding.last() {
            Some(pair) => pair.clone(),
            // The engine reported an expansion we never saw the call for.
            None => return Ok(()),
        };
        let result_pair = SeqPair::new(result);
        self.recorder
            .record_expanded(&initial.preserved, &result_pair.preserved);

        let step = self
            .tracker
            .on_expanded(initial.sanitized.clone(), result_pair.sanitized.clone());
        if let Some(step) = step {
            self.step_notify(pp, step)?;
        }
        self.rescanning.push((initial, result_pair));
        self.expanding.pop();
        Ok(())
    }

    fn rescanned_macro(&mut self, pp: &mut Preprocessor, result: &[Token]) -> anyhow::Result<()> {
        if self.suppressed() {
            return Ok(());
        }
        let (cause, initial) = match self.rescanning.last() {
            Some(pair) => pair.clone(),
            None => return Ok(()),
        };
        let result_pair = SeqPair::new(result);
        // A rescan of nothing is not an event.
        if !initial.sanitized.is_empty() {
            self.recorder.record_rescanned(
                &cause.preserved,
                &initial.preserved,
                &result_pair.preserved,
            );
            let step = self.tracker.on_rescanned(
                cause.sanitized.clone(),
                initial.sanitized.clone(),
                result_pair.sanitized.clone(),
            );
            if let Some(step) = step {
                self.step_notify(pp, step)?;
            }
        }
        self.rescanning.pop();
        Ok(())
    }

    fn found_directive(&mut self, _pp: &mut Preprocessor, directive: &Token) -> anyhow::Result<bool> {
        if matches!(directive.text(), "if" | "elif" | "ifdef" | "ifndef") {
            self.evaluating_conditional = true;
        }
        Ok(false)
    }

    fn evaluated_conditional_expression(
        &mut self,
        _pp: &mut Preprocessor,
        _directive: &Token,
        _expression: &[Token],
        _value: bool,
    ) -> anyhow::Result<bool> {
        self.evaluating_conditional = false;
        Ok(false)
    }

    fn throw_exception(
        &mut self,
        pp: &mut Preprocessor,
        diagnostic: &Diagnostic,
    ) -> anyhow::Result<bool> {
        match diagnostic.severity {
            // Warnings and remarks are not surfaced.
            Severity::Remark | Severity::Warning => Ok(false),
            Severity::Error | Severity::Fatal => {
                // Errors in included files are suppressed, best effort.
                if diagnostic.file_name != pp.main_file() {
                    return Ok(false);
                }
                self.fatal_error = true;
                println!("{diagnostic}");
                repl::prompt(self, pp, "exception", false)?;
                Ok(true)
            }
        }
    }

    fn complete(&mut self, pp: &mut Preprocessor) -> anyhow::Result<()> {
        repl::prompt(self, pp, "complete", true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::repl::{ReadOutcome, Signal};
    use ppstep_engine::{Position, TokenKind};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    fn tok(text: &str) -> Token {
        let kind = if text.chars().next().is_some_and(|c| c.is_whitespace()) {
            TokenKind::Whitespace
        } else if text.chars().next().is_some_and(|c| c.is_alphabetic()) {
            TokenKind::Identifier
        } else if text.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            TokenKind::Number
        } else {
            TokenKind::Punctuator
        };
        Token::new(text, kind, Position::command_line())
    }

    fn toks(texts: &[&str]) -> Vec<Token> {
        texts.iter().map(|t| tok(t)).collect()
    }

    /// Prompt input from a script; records the trigger of every blocking
    /// prompt.
    struct ScriptedReader {
        lines: VecDeque<&'static str>,
        prompts: Rc<RefCell<Vec<String>>>,
    }

    impl LineReader for ScriptedReader {
        fn read_line(&mut self, prompt: &str) -> anyhow::Result<ReadOutcome> {
            self.prompts.borrow_mut().push(prompt.to_string());
            match self.lines.pop_front() {
                Some(line) => Ok(ReadOutcome::Line(line.to_string())),
                None => Ok(ReadOutcome::Eof),
            }
        }
    }

    fn scripted_session(
        mode: Mode,
        lines: &[&'static str],
    ) -> (Session, Rc<RefCell<Vec<String>>>) {
        let prompts = Rc::new(RefCell::new(Vec::new()));
        let reader = ScriptedReader {
            lines: lines.iter().copied().collect(),
            prompts: Rc::clone(&prompts),
        };
        let session = Session::with_reader(
            SessionOptions {
                prefix: String::new(),
                initial_mode: mode,
                record_to: None,
            },
            Box::new(reader),
        );
        (session, prompts)
    }

    /// Drive the hook sequence of scenario B (`ADD(2,3)` expanding to
    /// `2 + 3`) against the session.
    fn drive_add_expansion(session: &mut Session, pp: &mut Preprocessor) {
        let call_tokens = toks(&["ADD", "(", "2", ",", " ", "3", ")"]);
        let def_name = tok("ADD");
        let formals = toks(&["a", "b"]);
        let body = toks(&["a", "+", "b"]);
        session
            .expanding_function_like_macro(
                pp,
                &def_name,
                &formals,
                &body,
                &def_name,
                &[vec![tok("2")], vec![tok("3")]],
                &call_tokens,
            )
            .unwrap();
        let result = toks(&["2", "+", "3"]);
        session.expanded_macro(pp, &result).unwrap();
        session.rescanned_macro(pp, &result).unwrap();
        for text in ["2", "+", "3"] {
            session.lexed_token(pp, &tok(text)).unwrap();
        }
    }

    // Scenario E: a call breakpoint fires exactly once under `continue`.
    #[test]
    fn breakpoint_fires_once_under_continue() {
        let mut pp = Preprocessor::new("test.c", "");
        // At the "started" prompt: break on calls of ADD, then continue.
        // When the breakpoint fires, continue again.
        let (mut session, prompts) = scripted_session(Mode::Free, &["b c ADD", "c", "c"]);

        session.start(&mut pp).unwrap();
        drive_add_expansion(&mut session, &mut pp);

        let prompts = prompts.borrow();
        // One read for each scripted command at the started prompt, then
        // exactly one block on the ADD call event; the expansion, rescan
        // and lex events run free.
        let triggers: Vec<&str> = prompts
            .iter()
            .map(|p| p.as_str())
            .filter(|p| p.contains('('))
            .map(|p| &p[p.find('(').unwrap()..])
            .collect();
        assert_eq!(
            triggers,
            vec!["(started)> ", "(started)> ", "(called)> "]
        );
    }

    #[test]
    fn until_break_without_breakpoints_never_prompts() {
        let mut pp = Preprocessor::new("test.c", "");
        let (mut session, prompts) = scripted_session(Mode::UntilBreak, &[]);
        drive_add_expansion(&mut session, &mut pp);
        assert!(prompts.borrow().is_empty());
        // The stream settled.
        assert!(session.tracker().frames().is_empty());
        assert_eq!(session.tracker().lexed_prefix().len(), 3);
    }

    #[test]
    fn adapter_builds_both_flavors() {
        let mut pp = Preprocessor::new("test.c", "");
        let (mut session, _) = scripted_session(Mode::UntilBreak, &[]);

        let call_tokens = toks(&["ADD", "(", "2", ",", " ", "3", ")"]);
        session
            .expanding_function_like_macro(
                &mut pp,
                &tok("ADD"),
                &toks(&["a", "b"]),
                &toks(&["a", "+", "b"]),
                &tok("ADD"),
                &[vec![tok("2")], vec![tok("3")]],
                &call_tokens,
            )
            .unwrap();

        let pair = session.expanding.last().unwrap();
        assert_eq!(pair.sanitized.len(), 6);
        assert_eq!(pair.preserved.len(), 7);
    }

    #[test]
    fn conditional_evaluation_suppresses_forwarding() {
        let mut pp = Preprocessor::new("test.c", "");
        let (mut session, _) = scripted_session(Mode::UntilBreak, &[]);

        session.found_directive(&mut pp, &tok("if")).unwrap();
        // Hooks fired while evaluating the controlling expression must not
        // reach the tracker.
        session
            .expanding_object_like_macro(&mut pp, &tok("N"), &toks(&["3"]), &tok("N"))
            .unwrap();
        session.expanded_macro(&mut pp, &toks(&["3"])).unwrap();
        session.rescanned_macro(&mut pp, &toks(&["3"])).unwrap();
        session.lexed_token(&mut pp, &tok("3")).unwrap();
        assert!(session.tracker().history().is_empty());

        session
            .evaluated_conditional_expression(&mut pp, &tok("if"), &toks(&["N"]), true)
            .unwrap();
        // Forwarding resumes.
        session.lexed_token(&mut pp, &tok("x")).unwrap();
        assert_eq!(session.tracker().history().len(), 1);
    }

    #[test]
    fn warnings_are_suppressed() {
        let mut pp = Preprocessor::new("test.c", "");
        let (mut session, prompts) = scripted_session(Mode::Free, &[]);
        let diag = Diagnostic::warning("something minor", &Position::new("test.c".into(), 1, 1));
        assert!(!session.throw_exception(&mut pp, &diag).unwrap());
        assert!(prompts.borrow().is_empty());
    }

    #[test]
    fn included_file_errors_are_suppressed() {
        let mut pp = Preprocessor::new("test.c", "");
        let (mut session, _) = scripted_session(Mode::Free, &[]);
        let diag = Diagnostic::error(
            "could not find include file \"x.h\"",
            &Position::new("lib/header.h".into(), 4, 1),
        );
        assert!(!session.throw_exception(&mut pp, &diag).unwrap());
        // Forwarding continues.
        session.lexed_token(&mut pp, &tok("a")).unwrap();
        assert_eq!(session.tracker().history().len(), 1);
    }

    #[test]
    fn main_file_error_is_fatal_and_stops_forwarding() {
        let mut pp = Preprocessor::new("test.c", "");
        let (mut session, prompts) = scripted_session(Mode::UntilBreak, &[]);
        let diag = Diagnostic::error("#error boom", &Position::new("test.c".into(), 2, 1));
        assert!(session.throw_exception(&mut pp, &diag).unwrap());
        assert!(prompts.borrow().last().unwrap().contains("(exception)"));
        // Subsequent events are dropped.
        session.lexed_token(&mut pp, &tok("a")).unwrap();
        assert!(session.tracker().history().is_empty());
    }

    #[test]
    fn unmatched_expanded_is_ignored() {
        let mut pp = Preprocessor::new("test.c", "");
        let (mut session, _) = scripted_session(Mode::UntilBreak, &[]);
        // No expanding entry to pair with.
        session.expanded_macro(&mut pp, &toks(&["1"])).unwrap();
        assert!(session.tracker().history().is_empty());
    }

    #[test]
    fn display_stacks_pair_and_unwind() {
        let mut pp = Preprocessor::new("test.c", "");
        let (mut session, _) = scripted_session(Mode::UntilBreak, &[]);
        drive_add_expansion(&mut session, &mut pp);
        assert!(session.expanding.is_empty());
        assert!(session.rescanning.is_empty());
    }

    #[test]
    fn quit_signal_propagates() {
        let mut pp = Preprocessor::new("test.c", "");
        let (mut session, _) = scripted_session(Mode::Free, &["q"]);
        let err = session.start(&mut pp).unwrap_err();
        assert_eq!(err.downcast_ref::<Signal>(), Some(&Signal::Quit));
    }

    #[test]
    fn step_runs_past_n_events() {
        let mut pp = Preprocessor::new("test.c", "");
        // "s 3" at the started prompt: the next two events run free, the
        // third blocks (and EOF ends the session input).
        let (mut session, prompts) = scripted_session(Mode::Free, &["s 3"]);
        session.start(&mut pp).unwrap();
        session.lexed_token(&mut pp, &tok("a")).unwrap();
        session.lexed_token(&mut pp, &tok("b")).unwrap();
        session.lexed_token(&mut pp, &tok("c")).unwrap();

        let blocked: Vec<String> = prompts
            .borrow()
            .iter()
            .filter(|p| p.contains("(lexed)"))
            .cloned()
            .collect();
        assert_eq!(blocked.len(), 1);
        let kinds: Vec<EventKind> = session
            .tracker()
            .history()
            .iter()
            .map(|e| e.event.kind())
            .collect();
        assert_eq!(kinds, vec![EventKind::Lexed; 3]);
    }
}
