//! Non-interactive hook tracing for `--debug`.

use crate::tokens::write_tokens;
use ppstep_engine::{Diagnostic, Hooks, Preprocessor, Token};

/// Hooks that write one compact line per hook to stdout and never prompt.
#[derive(Debug, Default)]
pub struct DebugHooks;

fn sanitized(tokens: &[Token]) -> String {
    let kept: Vec<Token> = crate::tokens::sanitize(tokens);
    write_tokens(&kept)
}

impl Hooks for DebugHooks {
    fn start(&mut self, pp: &mut Preprocessor) -> anyhow::Result<()> {
        println!("[start] {}", pp.main_file());
        Ok(())
    }

    fn lexed_token(&mut self, _pp: &mut Preprocessor, token: &Token) -> anyhow::Result<()> {
        if crate::tokens::is_substantive(token) {
            println!("[lexed] {}", token.text());
        }
        Ok(())
    }

    fn expanding_function_like_macro(
        &mut self,
        _pp: &mut Preprocessor,
        _macro_def: &Token,
        _formals: &[Token],
        _definition: &[Token],
        call: &Token,
        arguments: &[Vec<Token>],
        _call_tokens: &[Token],
    ) -> anyhow::Result<bool> {
        let args: Vec<String> = arguments.iter().map(|a| sanitized(a)).collect();
        println!("[call] {}({})", call.text(), args.join(", "));
        Ok(false)
    }

    fn expanding_object_like_macro(
        &mut self,
        _pp: &mut Preprocessor,
        _macro_def: &Token,
        _definition: &[Token],
        call: &Token,
    ) -> anyhow::Result<bool> {
        println!("[call] {}", call.text());
        Ok(false)
    }

    fn expanded_macro(&mut self, _pp: &mut Preprocessor, result: &[Token]) -> anyhow::Result<()> {
        println!("[expanded] {}", sanitized(result));
        Ok(())
    }

    fn rescanned_macro(&mut self, _pp: &mut Preprocessor, result: &[Token]) -> anyhow::Result<()> {
        println!("[rescanned] {}", sanitized(result));
        Ok(())
    }

    fn found_directive(
        &mut self,
        _pp: &mut Preprocessor,
        directive: &Token,
    ) -> anyhow::Result<bool> {
        println!("[directive] #{}", directive.text());
        Ok(false)
    }

    fn evaluated_conditional_expression(
        &mut self,
        _pp: &mut Preprocessor,
        directive: &Token,
        expression: &[Token],
        value: bool,
    ) -> anyhow::Result<bool> {
        println!(
            "[conditional] #{} {} => {}",
            directive.text(),
            sanitized(expression),
            value
        );
        Ok(false)
    }

    fn found_unknown_directive(
        &mut self,
        _pp: &mut Preprocessor,
        line: &[Token],
        _pending: &[Token],
    ) -> anyhow::Result<bool> {
        println!("[unknown-directive] {}", sanitized(line));
        Ok(false)
    }

    fn throw_exception(
        &mut self,
        _pp: &mut Preprocessor,
        diagnostic: &Diagnostic,
    ) -> anyhow::Result<bool> {
        println!("[exception] {diagnostic}");
        Ok(false)
    }

    fn complete(&mut self, _pp: &mut Preprocessor) -> anyhow::Result<()> {
        println!("[complete]");
        Ok(())
    }
}
