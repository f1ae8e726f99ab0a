//! The debugger command grammar.
//!
//! Parsing is a pure function from an input line to a [`Command`], so the
//! grammar is testable apart from the prompt loop that executes commands.

use crate::stepper::BreakClass;

/// A parsed debugger command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `step [n]`
    Step(usize),
    Continue,
    Backtrace,
    Forwardtrace,
    Break(BreakClass, String),
    Delete(BreakClass, String),
    /// `expand <text>`: expand a snippet in an auxiliary session.
    Expand(String),
    Define(String),
    Undef(String),
    Include(String),
    Record(String),
    StopRecord,
    Status,
    What,
    Macros,
    Quit,
    /// An empty line reprints the current state.
    Empty,
}

/// Parse one input line. `Err` carries nothing; the caller reports the
/// undefined command with the original line.
pub fn parse(line: &str) -> Result<Command, ()> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Command::Empty);
    }

    let (word, rest) = split_word(trimmed);
    match word {
        "step" | "s" => match rest {
            "" => Ok(Command::Step(1)),
            n => n.parse::<usize>().map(Command::Step).map_err(|_| ()),
        },
        "continue" | "c" if rest.is_empty() => Ok(Command::Continue),
        "backtrace" | "bt" if rest.is_empty() => Ok(Command::Backtrace),
        "forwardtrace" | "ft" if rest.is_empty() => Ok(Command::Forwardtrace),
        "break" | "b" => {
            let (class, name) = parse_breakpoint(rest)?;
            Ok(Command::Break(class, name))
        }
        "delete" | "d" => {
            let (class, name) = parse_breakpoint(rest)?;
            Ok(Command::Delete(class, name))
        }
        "expand" | "e" if !rest.is_empty() => Ok(Command::Expand(rest.to_string())),
        "#define" if !rest.is_empty() => Ok(Command::Define(rest.to_string())),
        "#undef" if !rest.is_empty() => Ok(Command::Undef(rest.to_string())),
        "#include" if !rest.is_empty() => Ok(Command::Include(rest.to_string())),
        "record" | "rec" if !rest.is_empty() => Ok(Command::Record(rest.to_string())),
        "stoprecord" | "sr" if rest.is_empty() => Ok(Command::StopRecord),
        "status" if rest.is_empty() => Ok(Command::Status),
        "what" | "?" if rest.is_empty() => Ok(Command::What),
        "macros" if rest.is_empty() => Ok(Command::Macros),
        "quit" | "q" if rest.is_empty() => Ok(Command::Quit),
        _ => Err(()),
    }
}

fn split_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(at) => (&text[..at], text[at..].trim_start()),
        None => (text, ""),
    }
}

fn parse_breakpoint(rest: &str) -> Result<(BreakClass, String), ()> {
    let (class_word, name) = split_word(rest);
    let class = match class_word {
        "call" | "c" => BreakClass::Call,
        "expand" | "e" => BreakClass::Expand,
        "rescan" | "r" => BreakClass::Rescan,
        "lex" | "l" => BreakClass::Lex,
        _ => return Err(()),
    };
    if name.is_empty() {
        return Err(());
    }
    Ok((class, name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! parse_test {
        ($name: ident, $input: expr, $want: expr) => {
            #[test]
            fn $name() {
                assert_eq!(parse($input), Ok($want));
            }
        };
    }

    parse_test![step_default, "step", Command::Step(1)];
    parse_test![step_alias, "s", Command::Step(1)];
    parse_test![step_count, "step 5", Command::Step(5)];
    parse_test![step_alias_count, "s 12", Command::Step(12)];
    parse_test![continue_full, "continue", Command::Continue];
    parse_test![continue_alias, "c", Command::Continue];
    parse_test![backtrace, "backtrace", Command::Backtrace];
    parse_test![backtrace_alias, "bt", Command::Backtrace];
    parse_test![forwardtrace, "forwardtrace", Command::Forwardtrace];
    parse_test![forwardtrace_alias, "ft", Command::Forwardtrace];
    parse_test![
        break_call,
        "break call ADD",
        Command::Break(BreakClass::Call, "ADD".to_string())
    ];
    parse_test![
        break_expand_aliases,
        "b e ADD",
        Command::Break(BreakClass::Expand, "ADD".to_string())
    ];
    parse_test![
        break_rescan,
        "break rescan FOO",
        Command::Break(BreakClass::Rescan, "FOO".to_string())
    ];
    parse_test![
        delete_call,
        "delete call ADD",
        Command::Delete(BreakClass::Call, "ADD".to_string())
    ];
    parse_test![
        delete_lex_aliases,
        "d l x",
        Command::Delete(BreakClass::Lex, "x".to_string())
    ];
    parse_test![
        expand_text,
        "expand ADD(1, 2)",
        Command::Expand("ADD(1, 2)".to_string())
    ];
    parse_test![
        expand_alias,
        "e FOO",
        Command::Expand("FOO".to_string())
    ];
    parse_test![
        define,
        "#define FOO 1",
        Command::Define("FOO 1".to_string())
    ];
    parse_test![undef, "#undef FOO", Command::Undef("FOO".to_string())];
    parse_test![
        include,
        "#include <stdio.h>",
        Command::Include("<stdio.h>".to_string())
    ];
    parse_test![
        record,
        "record trace.log",
        Command::Record("trace.log".to_string())
    ];
    parse_test![record_alias, "rec t.log", Command::Record("t.log".to_string())];
    parse_test![stop_record, "stoprecord", Command::StopRecord];
    parse_test![stop_record_alias, "sr", Command::StopRecord];
    parse_test![status, "status", Command::Status];
    parse_test![what, "what", Command::What];
    parse_test![what_alias, "?", Command::What];
    parse_test![macros, "macros", Command::Macros];
    parse_test![quit, "quit", Command::Quit];
    parse_test![quit_alias, "q", Command::Quit];
    parse_test![empty, "", Command::Empty];
    parse_test![blank, "   ", Command::Empty];

    #[test]
    fn unknown_commands() {
        assert!(parse("frobnicate").is_err());
        assert!(parse("step five").is_err());
        assert!(parse("break unknown ADD").is_err());
        assert!(parse("break call").is_err());
        assert!(parse("expand").is_err());
        assert!(parse("#define").is_err());
    }
}
