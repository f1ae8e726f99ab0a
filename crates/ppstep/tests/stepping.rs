//! End-to-end tests: the real engine driving a scripted debugger session.

use ppstep::event::EventKind;
use ppstep::repl::{LineReader, ReadOutcome};
use ppstep::{Mode, Session, SessionOptions};
use ppstep_engine::Preprocessor;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

struct ScriptedReader {
    lines: VecDeque<String>,
    prompts: Rc<RefCell<Vec<String>>>,
}

impl LineReader for ScriptedReader {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<ReadOutcome> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match self.lines.pop_front() {
            Some(line) => Ok(ReadOutcome::Line(line)),
            None => Ok(ReadOutcome::Eof),
        }
    }
}

fn run_scripted(
    source: &str,
    mode: Mode,
    lines: &[&str],
) -> (Session, Preprocessor, Rc<RefCell<Vec<String>>>) {
    let prompts = Rc::new(RefCell::new(Vec::new()));
    let reader = ScriptedReader {
        lines: lines.iter().map(|l| l.to_string()).collect(),
        prompts: Rc::clone(&prompts),
    };
    let mut session = Session::with_reader(
        SessionOptions {
            prefix: String::new(),
            initial_mode: mode,
            record_to: None,
        },
        Box::new(reader),
    );
    let mut pp = Preprocessor::new("input.c", source);
    pp.run(&mut session).unwrap();
    (session, pp, prompts)
}

fn kinds(session: &Session) -> Vec<EventKind> {
    session
        .tracker()
        .history()
        .iter()
        .map(|entry| entry.event.kind())
        .collect()
}

#[test]
fn object_macro_history() {
    let (session, _, _) = run_scripted("#define FOO 1\nFOO\n", Mode::UntilBreak, &[]);
    assert_eq!(
        kinds(&session),
        vec![EventKind::Call, EventKind::Expanded, EventKind::Rescanned]
    );
    let texts: Vec<&str> = session
        .tracker()
        .lexed_prefix()
        .iter()
        .map(|t| t.text())
        .collect();
    assert_eq!(texts, vec!["1"]);
}

#[test]
fn nested_macro_splices_into_outer_frame() {
    let source = "#define ONE 1\n#define ADD(a, b) a + b\nADD(ONE, 2)\n";
    let (session, _, _) = run_scripted(source, Mode::UntilBreak, &[]);

    let history = session.tracker().history();
    // Outer call, inner call (argument expansion), inner expansion and
    // rescan, outer expansion and rescan.
    assert_eq!(
        kinds(&session),
        vec![
            EventKind::Call,
            EventKind::Call,
            EventKind::Expanded,
            EventKind::Rescanned,
            EventKind::Expanded,
            EventKind::Rescanned,
        ]
    );

    // The inner expansion's snapshot shows the splice inside the outer call.
    let inner = &history[2];
    let texts: Vec<&str> = inner.tokens.iter().map(|t| t.text()).collect();
    assert_eq!(texts, vec!["ADD", "(", "1", ",", "2", ")"]);
    assert_eq!(inner.event.span(), Some((2, 3)));

    // The final stream is settled.
    let prefix: Vec<&str> = session
        .tracker()
        .lexed_prefix()
        .iter()
        .map(|t| t.text())
        .collect();
    assert_eq!(prefix, vec!["1", "+", "2"]);
}

#[test]
fn plain_tokens_produce_lexed_entries() {
    let (session, _, _) = run_scripted("int x ;\n", Mode::UntilBreak, &[]);
    assert_eq!(
        kinds(&session),
        vec![EventKind::Lexed, EventKind::Lexed, EventKind::Lexed]
    );
}

#[test]
fn conditional_evaluation_events_are_hidden() {
    // N is expanded while evaluating the #if expression; none of that may
    // appear in history.
    let source = "#define N 3\n#if N > 2\nyes\n#endif\n";
    let (session, _, _) = run_scripted(source, Mode::UntilBreak, &[]);
    assert_eq!(kinds(&session), vec![EventKind::Lexed]);
    assert_eq!(session.tracker().lexed_prefix()[0].text(), "yes");
}

#[test]
fn breakpoint_blocks_once_with_continue() {
    let source = "#define ONE 1\n#define ADD(a, b) a + b\nADD(ONE, 2)\n";
    // At the started prompt: break on calls of ADD, continue. At the break:
    // continue again (no further breaks fire, so the run finishes; EOF
    // handles the complete prompt).
    let (_, _, prompts) = run_scripted(source, Mode::Free, &["b c ADD", "c", "c"]);

    let prompts = prompts.borrow();
    let called: Vec<&String> = prompts.iter().filter(|p| p.contains("(called)")).collect();
    assert_eq!(called.len(), 1);
    // The inner ONE call never blocked.
    assert!(prompts.iter().all(|p| !p.contains("(expanded)")));
}

#[test]
fn free_mode_prompts_on_every_event() {
    // `s` steps to the call event; every later event blocks and hits EOF.
    let (_, _, prompts) = run_scripted("#define FOO 1\nFOO\n", Mode::Free, &["s"]);
    let prompts = prompts.borrow();
    let triggers: Vec<&str> = prompts
        .iter()
        .filter_map(|p| p.find('(').map(|at| &p[at..]))
        .collect();
    assert_eq!(
        triggers,
        vec![
            "(started)> ",
            "(called)> ",
            "(expanded)> ",
            "(rescanned)> ",
            "(complete)> ",
        ]
    );
}

#[test]
fn recorder_writes_full_trace() {
    let dir = tempfile::TempDir::new().unwrap();
    let trace_path = dir.path().join("trace.log");

    let mut session = Session::with_reader(
        SessionOptions {
            prefix: String::new(),
            initial_mode: Mode::UntilBreak,
            record_to: Some(trace_path.clone()),
        },
        Box::new(ScriptedReader {
            lines: VecDeque::new(),
            prompts: Rc::new(RefCell::new(Vec::new())),
        }),
    );
    let mut pp = Preprocessor::new("input.c", "#define ADD(a, b) a + b\nADD(2, 3)\n");
    pp.run(&mut session).unwrap();
    drop(session);

    let contents = std::fs::read_to_string(&trace_path).unwrap();
    assert!(contents.starts_with("=== PPSTEP TRACE ===\n"));
    assert!(contents.contains("[CALL] ADD (2, 3)\n"));
    assert!(contents.contains("  ARG[0]: 2\n"));
    assert!(contents.contains("  ARG[1]: 3\n"));
    assert!(contents.contains("[EXPANDED]\n"));
    assert!(contents.contains("  TO:   2 + 3\n"));
    assert!(contents.contains("[RESCANNED]\n"));
    assert!(contents.contains("[LEXED] 2\n"));
    assert!(contents.ends_with("=== END OF TRACE ===\n"));
}

#[test]
fn trace_files_are_deterministic_apart_from_timestamps() {
    let run = || {
        let dir = tempfile::TempDir::new().unwrap();
        let trace_path = dir.path().join("trace.log");
        let mut session = Session::with_reader(
            SessionOptions {
                prefix: String::new(),
                initial_mode: Mode::UntilBreak,
                record_to: Some(trace_path.clone()),
            },
            Box::new(ScriptedReader {
                lines: VecDeque::new(),
                prompts: Rc::new(RefCell::new(Vec::new())),
            }),
        );
        let mut pp = Preprocessor::new("input.c", "#define FOO 1 + 2\nFOO\n");
        pp.run(&mut session).unwrap();
        drop(session);
        let contents = std::fs::read_to_string(&trace_path).unwrap();
        // Drop the timestamped header line.
        contents
            .lines()
            .filter(|l| !l.starts_with("Started: "))
            .collect::<Vec<&str>>()
            .join("\n")
    };
    assert_eq!(run(), run());
}
