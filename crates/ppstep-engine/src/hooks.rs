//! The observation hook contract.
//!
//! The preprocessor calls into a [`Hooks`] implementation at every
//! interesting moment: when a token is emitted, when a macro invocation is
//! recognized, when a substitution or rescan finishes, when a directive is
//! found, and when a diagnostic is raised. Hooks receive a mutable handle to
//! the [`Preprocessor`] so that an interactive implementation can inspect and
//! mutate engine state (define macros, push includes) while the engine is
//! paused inside the hook.
//!
//! All default implementations are permissive no-ops, so an implementation
//! only overrides the hooks it cares about.

use crate::error::Diagnostic;
use crate::preprocessor::Preprocessor;
use crate::token::Token;

pub trait Hooks {
    /// Preprocessing is about to begin.
    fn start(&mut self, pp: &mut Preprocessor) -> anyhow::Result<()> {
        _ = pp;
        Ok(())
    }

    /// One output token has been produced.
    ///
    /// Every token of the final token stream passes through here, whitespace
    /// and end-of-file markers included.
    fn lexed_token(&mut self, pp: &mut Preprocessor, token: &Token) -> anyhow::Result<()> {
        _ = (pp, token);
        Ok(())
    }

    /// A function-like macro invocation has been recognized, before its
    /// arguments are expanded.
    ///
    /// `call_tokens` is the full `NAME(...)` call span with whitespace
    /// preserved. Returning `true` vetoes the expansion.
    #[allow(clippy::too_many_arguments)]
    fn expanding_function_like_macro(
        &mut self,
        pp: &mut Preprocessor,
        macro_def: &Token,
        formals: &[Token],
        definition: &[Token],
        call: &Token,
        arguments: &[Vec<Token>],
        call_tokens: &[Token],
    ) -> anyhow::Result<bool> {
        _ = (pp, macro_def, formals, definition, call, arguments, call_tokens);
        Ok(false)
    }

    /// An object-like macro invocation has been recognized.
    ///
    /// Returning `true` vetoes the expansion.
    fn expanding_object_like_macro(
        &mut self,
        pp: &mut Preprocessor,
        macro_def: &Token,
        definition: &[Token],
        call: &Token,
    ) -> anyhow::Result<bool> {
        _ = (pp, macro_def, definition, call);
        Ok(false)
    }

    /// Argument substitution has produced `result`, before rescanning.
    fn expanded_macro(&mut self, pp: &mut Preprocessor, result: &[Token]) -> anyhow::Result<()> {
        _ = (pp, result);
        Ok(())
    }

    /// Rescanning the most recent expansion has produced `result`.
    fn rescanned_macro(&mut self, pp: &mut Preprocessor, result: &[Token]) -> anyhow::Result<()> {
        _ = (pp, result);
        Ok(())
    }

    /// A directive has been recognized. The token is the directive name
    /// (`if`, `define`, ...), without the introducing `#`.
    ///
    /// For the conditional directives this fires only when the controlling
    /// expression will actually be evaluated, so it always pairs with a
    /// subsequent [`evaluated_conditional_expression`](Hooks::evaluated_conditional_expression).
    /// Returning `true` vetoes the directive.
    fn found_directive(&mut self, pp: &mut Preprocessor, directive: &Token) -> anyhow::Result<bool> {
        _ = (pp, directive);
        Ok(false)
    }

    /// The controlling expression of a conditional directive has been
    /// evaluated. The return value is ignored.
    fn evaluated_conditional_expression(
        &mut self,
        pp: &mut Preprocessor,
        directive: &Token,
        expression: &[Token],
        value: bool,
    ) -> anyhow::Result<bool> {
        _ = (pp, directive, expression, value);
        Ok(false)
    }

    /// A directive the engine does not recognize. `line` is the full
    /// directive line; `pending` is what the engine would emit in its place
    /// (currently always empty). Returning `true` marks the directive as
    /// consumed and suppresses the unknown-directive warning.
    fn found_unknown_directive(
        &mut self,
        pp: &mut Preprocessor,
        line: &[Token],
        pending: &[Token],
    ) -> anyhow::Result<bool> {
        _ = (pp, line, pending);
        Ok(false)
    }

    /// A diagnostic has been raised. Returning `true` rethrows it out of the
    /// engine's run loop; returning `false` asks the engine to recover.
    fn throw_exception(
        &mut self,
        pp: &mut Preprocessor,
        diagnostic: &Diagnostic,
    ) -> anyhow::Result<bool> {
        _ = (pp, diagnostic);
        Ok(false)
    }

    /// Preprocessing finished normally.
    fn complete(&mut self, pp: &mut Preprocessor) -> anyhow::Result<()> {
        _ = pp;
        Ok(())
    }
}

/// A hook implementation that observes nothing and permits everything.
///
/// Used for engine operations that should run silently, such as directives
/// issued from the debugger prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHooks;

impl Hooks for NullHooks {}
