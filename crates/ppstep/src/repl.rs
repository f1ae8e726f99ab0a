//! The interactive prompt.
//!
//! The prompt blocks the engine's hook call until the user enters a command
//! that resumes stepping. Line editing and history are provided by
//! `linefeed`; the reader is behind a trait so sessions can be driven by
//! scripted input in tests.

use crate::command::{self, Command};
use crate::session::{Session, SessionOptions};
use crate::stepper::Mode;
use crate::tokens::{write_tokens, write_tokens_preserved};
use ppstep_engine::hooks::NullHooks;
use ppstep_engine::Preprocessor;
use std::fmt;
use std::path::Path;

/// Control-flow signal raised through the error channel.
///
/// A `quit` command (or SIGINT at the prompt) unwinds the engine's run loop
/// cleanly; the host driver downcasts it and exits 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Quit,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Quit => write!(f, "quit"),
        }
    }
}

impl std::error::Error for Signal {}

/// One read from the prompt.
pub enum ReadOutcome {
    Line(String),
    Eof,
    /// SIGINT; treated the same as `quit`.
    Interrupted,
}

/// Source of prompt input.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<ReadOutcome>;
    fn add_history(&mut self, line: &str) {
        _ = line;
    }
}

/// The default reader: a `linefeed` interface over the terminal, created
/// lazily on the first prompt.
#[derive(Default)]
pub struct TerminalReader {
    interface: Option<linefeed::Interface<linefeed::DefaultTerminal>>,
}

impl TerminalReader {
    fn interface(
        &mut self,
    ) -> anyhow::Result<&mut linefeed::Interface<linefeed::DefaultTerminal>> {
        if self.interface.is_none() {
            let interface = linefeed::Interface::new("ppstep")?;
            interface.set_report_signal(linefeed::Signal::Interrupt, true);
            self.interface = Some(interface);
        }
        Ok(self.interface.as_mut().unwrap())
    }
}

impl LineReader for TerminalReader {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<ReadOutcome> {
        let interface = self.interface()?;
        interface.set_prompt(prompt)?;
        match interface.read_line()? {
            linefeed::ReadResult::Input(line) => Ok(ReadOutcome::Line(line)),
            linefeed::ReadResult::Eof => Ok(ReadOutcome::Eof),
            linefeed::ReadResult::Signal(_) => Ok(ReadOutcome::Interrupted),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Some(interface) = &self.interface {
            interface.add_history(line.to_string());
        }
    }
}

fn prompt_text(prefix: &str, trigger: &str) -> String {
    let mut text = String::from("pp");
    if !prefix.is_empty() {
        text.push_str(&format!(" [{prefix}]"));
    }
    if !trigger.is_empty() {
        text.push_str(&format!(" ({trigger})"));
    }
    text.push_str("> ");
    text
}

/// Block for user commands, honoring any outstanding step request.
///
/// The loop exits when a command leaves steps pending (`step`, `continue`)
/// or the input ends; `quit` raises [`Signal::Quit`].
pub(crate) fn prompt(
    session: &mut Session,
    pp: &mut Preprocessor,
    trigger: &str,
    print_state: bool,
) -> anyhow::Result<()> {
    if !session.stepper.take_step() {
        return Ok(());
    }
    session.stepper.set_mode(Mode::Free);

    if print_state {
        print_current_state(session, pp);
    }

    let text = prompt_text(&session.prefix, trigger);
    loop {
        let line = match session.reader.read_line(&text)? {
            ReadOutcome::Line(line) => line,
            ReadOutcome::Eof => return Ok(()),
            ReadOutcome::Interrupted => return Err(anyhow::Error::new(Signal::Quit)),
        };
        session.reader.add_history(&line);

        match command::parse(&line) {
            Err(()) => println!("Undefined command: \"{line}\"."),
            Ok(cmd) => {
                dispatch(session, pp, cmd)?;
                if session.stepper.steps_pending() {
                    return Ok(());
                }
            }
        }
    }
}

fn dispatch(session: &mut Session, pp: &mut Preprocessor, cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Step(n) => session.stepper.request_steps(n),
        Command::Continue => {
            session.stepper.request_steps(1);
            session.stepper.set_mode(Mode::UntilBreak);
        }
        Command::Backtrace => print_expanding_trace(session),
        Command::Forwardtrace => print_rescanning_trace(session),
        Command::Break(class, name) => session.stepper.add_breakpoint(class, &name),
        Command::Delete(class, name) => session.stepper.remove_breakpoint(class, &name),
        Command::Expand(text) => {
            // The auxiliary expansion runs over a fresh session so the
            // primary tracker state is untouched.
            let mut aux = Session::new(SessionOptions {
                prefix: text.clone(),
                initial_mode: Mode::Free,
                record_to: None,
            });
            pp.expand_snippet(&text, &mut aux)?;
        }
        Command::Define(decl) => {
            let mut hooks = NullHooks;
            pp.handle_directive_text(&format!("#define {decl}"), &mut hooks)?;
        }
        Command::Undef(name) => {
            let mut hooks = NullHooks;
            pp.handle_directive_text(&format!("#undef {name}"), &mut hooks)?;
        }
        Command::Include(spec) => {
            let mut hooks = NullHooks;
            pp.handle_directive_text(&format!("#include {spec}"), &mut hooks)?;
        }
        Command::Record(path) => {
            if session.recorder.start(&path) {
                println!("Recording to {path}");
            } else {
                println!("Failed to open {path} for recording");
            }
        }
        Command::StopRecord => {
            session.recorder.stop();
            println!("Recording stopped");
        }
        Command::Status => match session.recorder.path() {
            Some(path) => println!("Recording to: {}", path.display()),
            None => println!("Not recording"),
        },
        Command::What => explain_current_state(session),
        Command::Macros => print_macros(pp),
        Command::Quit => return Err(anyhow::Error::new(Signal::Quit)),
        Command::Empty => print_current_state(session, pp),
    }
    Ok(())
}

/// Print the newest history entry with its span highlighted, prefixed by
/// the engine's main position.
pub(crate) fn print_current_state(session: &Session, pp: &Preprocessor) {
    let entry = match session.tracker.newest_history() {
        Some(entry) => entry,
        None => return,
    };
    let pos = pp.main_pos();
    let file = Path::new(&*pos.file)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| pos.file.to_string());
    println!(
        "[{}:{}:{}]: {}",
        file,
        pos.line,
        pos.column,
        entry.event.print(&entry.tokens)
    );
}

fn explain_current_state(session: &Session) {
    if let Some(entry) = session.tracker.newest_history() {
        println!("{}", entry.event.explain(&entry.tokens));
    }
}

fn print_expanding_trace(session: &Session) {
    for (idx, pair) in session.expanding.iter().rev().enumerate() {
        println!("{idx}: {}", write_tokens(&pair.sanitized));
    }
}

fn print_rescanning_trace(session: &Session) {
    for (idx, (cause, initial)) in session.rescanning.iter().rev().enumerate() {
        println!("{idx}: {}", write_tokens(&initial.sanitized));
        let width = idx.to_string().len();
        println!(
            "{}  caused by {}",
            " ".repeat(width),
            write_tokens(&cause.sanitized)
        );
    }
}

fn print_macros(pp: &Preprocessor) {
    for def in pp.macros().iter_sorted() {
        // Predefined names are hidden.
        if def.name.text().starts_with("__") {
            continue;
        }
        let mut line = format!(" - {}", def.name.text());
        if let Some(params) = &def.params {
            let names: Vec<&str> = params.iter().map(|p| p.text()).collect();
            line.push_str(&format!("({})", names.join(", ")));
        }
        line.push(' ');
        line.push_str(&write_tokens_preserved(&def.body));
        println!("{line}");
    }
}
