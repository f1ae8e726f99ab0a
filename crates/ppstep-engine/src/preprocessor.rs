//! The preprocessor driver.
//!
//! Processing is line oriented: the source is tokenized up front, split into
//! logical lines (the lexer has already resolved splices), and each line is
//! either a directive or text to macro-expand. Includes push a new source
//! frame; conditionals maintain a nesting stack. Hooks fire synchronously as
//! each construct is processed, and a hook may mutate the engine through the
//! handle it receives.

use crate::condition;
use crate::error::Diagnostic;
use crate::hooks::Hooks;
use crate::lexer;
use crate::macros::{MacroDef, MacroTable};
use crate::token::{Position, Token, TokenKind};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

struct SourceFrame {
    lines: VecDeque<Vec<Token>>,
    /// Directory of the file, for resolving quoted includes.
    dir: PathBuf,
    is_main: bool,
}

struct CondFrame {
    /// Whether the surrounding context was active when the `#if` was seen.
    parent_active: bool,
    /// Whether some branch of this conditional has been taken.
    taken: bool,
    /// Whether the current branch is active.
    active: bool,
    else_seen: bool,
    pos: Position,
}

pub struct Preprocessor {
    macros: MacroTable,
    include_paths: Vec<PathBuf>,
    main_file: String,
    main_dir: PathBuf,
    main_pos: Position,
    sources: Vec<SourceFrame>,
    cond: Vec<CondFrame>,
}

impl Preprocessor {
    /// Create a preprocessor over the given translation unit.
    pub fn new(file_name: &str, source: &str) -> Preprocessor {
        let tokens = lexer::tokenize(file_name, source);
        let main_dir = Path::new(file_name)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Preprocessor {
            macros: MacroTable::default(),
            include_paths: Vec::new(),
            main_file: file_name.to_string(),
            main_dir: main_dir.clone(),
            main_pos: Position::new(file_name.into(), 1, 1),
            sources: vec![SourceFrame {
                lines: split_lines(tokens),
                dir: main_dir,
                is_main: true,
            }],
            cond: Vec::new(),
        }
    }

    pub fn add_include_path<P: Into<PathBuf>>(&mut self, path: P) {
        self.include_paths.push(path.into());
    }

    /// Define a macro from a command-line style `NAME[(params)][=VAL]` spec.
    pub fn define_cli(&mut self, spec: &str) -> anyhow::Result<()> {
        let def = MacroTable::parse_cli_definition(spec)?;
        self.macros.define(def);
        Ok(())
    }

    pub fn undefine(&mut self, name: &str) -> bool {
        self.macros.undefine(name).is_some()
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn main_file(&self) -> &str {
        &self.main_file
    }

    /// Position of the most recent main-file line; include processing does
    /// not move it.
    pub fn main_pos(&self) -> &Position {
        &self.main_pos
    }

    /// Run the preprocessor to completion, reporting through `hooks`.
    pub fn run<H: Hooks>(&mut self, hooks: &mut H) -> anyhow::Result<()> {
        hooks.start(self)?;
        while let Some((line, from_main)) = self.next_line() {
            if from_main {
                if let Some(i) = next_substantive(&line, 0) {
                    self.main_pos = line[i].pos().clone();
                }
            }
            self.process_line(line, hooks)?;
        }
        while let Some(frame) = self.cond.pop() {
            let diag = Diagnostic::error("unterminated conditional directive", &frame.pos);
            self.raise(hooks, diag)?;
        }
        hooks.complete(self)?;
        Ok(())
    }

    /// Macro-expand a one-line snippet, firing expansion hooks but emitting
    /// nothing. The primary run state is untouched apart from any macros the
    /// hooks themselves define.
    pub fn expand_snippet<H: Hooks>(
        &mut self,
        text: &str,
        hooks: &mut H,
    ) -> anyhow::Result<Vec<Token>> {
        let mut tokens = lexer::tokenize("<command line>", text);
        tokens.retain(|t| !matches!(t.kind(), TokenKind::Newline | TokenKind::Eof));
        self.expand_sequence(&tokens, hooks, &mut Vec::new())
    }

    /// Process directive text issued from outside the input file, such as a
    /// `#define` typed at the debugger prompt.
    pub fn handle_directive_text<H: Hooks>(
        &mut self,
        text: &str,
        hooks: &mut H,
    ) -> anyhow::Result<()> {
        let mut tokens = lexer::tokenize("<command line>", text);
        tokens.retain(|t| t.kind() != TokenKind::Eof);
        let mut lines = split_lines(tokens);
        while let Some(line) = lines.pop_front() {
            self.process_line(line, hooks)?;
        }
        Ok(())
    }

    fn next_line(&mut self) -> Option<(Vec<Token>, bool)> {
        loop {
            let top = self.sources.last_mut()?;
            match top.lines.pop_front() {
                Some(line) => return Some((line, top.is_main)),
                None => {
                    self.sources.pop();
                }
            }
        }
    }

    fn condition_active(&self) -> bool {
        self.cond.iter().all(|f| f.active)
    }

    fn process_line<H: Hooks>(&mut self, line: Vec<Token>, hooks: &mut H) -> anyhow::Result<()> {
        match next_substantive(&line, 0) {
            Some(i) if line[i].is_punct("#") => self.process_directive(line, i, hooks),
            _ if self.condition_active() => self.process_text_line(line, hooks),
            _ => Ok(()),
        }
    }

    fn process_text_line<H: Hooks>(
        &mut self,
        line: Vec<Token>,
        hooks: &mut H,
    ) -> anyhow::Result<()> {
        let mut i = 0;
        while i < line.len() {
            if self.macro_invocation_at(&line, i, &[]) {
                let (expanded, consumed) = self.expand_macro_at(&line, i, hooks, &mut Vec::new())?;
                for token in &expanded {
                    hooks.lexed_token(self, token)?;
                }
                i += consumed;
            } else {
                let token = line[i].clone();
                hooks.lexed_token(self, &token)?;
                i += 1;
            }
        }
        Ok(())
    }

    fn process_directive<H: Hooks>(
        &mut self,
        line: Vec<Token>,
        hash_idx: usize,
        hooks: &mut H,
    ) -> anyhow::Result<()> {
        let name_idx = match next_substantive(&line, hash_idx + 1) {
            Some(i) => i,
            // The null directive.
            None => return Ok(()),
        };
        let directive = line[name_idx].clone();
        let rest: Vec<Token> = line[name_idx + 1..].to_vec();
        let active = self.condition_active();

        match directive.text() {
            "if" | "ifdef" | "ifndef" => self.directive_conditional_open(&directive, &rest, active, hooks),
            "elif" => self.directive_elif(&directive, &rest, hooks),
            "else" => self.directive_else(&directive, hooks),
            "endif" => self.directive_endif(&directive, hooks),
            _ if !active => Ok(()),
            "define" => {
                if hooks.found_directive(self, &directive)? {
                    return Ok(());
                }
                match MacroTable::parse_definition(&rest) {
                    Ok(def) => {
                        self.macros.define(def);
                        Ok(())
                    }
                    Err(e) => {
                        let diag =
                            Diagnostic::error(format!("bad macro definition: {e}"), directive.pos());
                        self.raise(hooks, diag)
                    }
                }
            }
            "undef" => {
                if hooks.found_directive(self, &directive)? {
                    return Ok(());
                }
                match next_substantive(&rest, 0) {
                    Some(i) if rest[i].is_identifier() => {
                        self.macros.undefine(rest[i].text());
                        Ok(())
                    }
                    _ => {
                        let diag =
                            Diagnostic::error("#undef is missing a macro name", directive.pos());
                        self.raise(hooks, diag)
                    }
                }
            }
            "include" => {
                if hooks.found_directive(self, &directive)? {
                    return Ok(());
                }
                self.directive_include(&directive, &rest, hooks)
            }
            "error" => {
                if hooks.found_directive(self, &directive)? {
                    return Ok(());
                }
                let message = spelled(&rest);
                let diag =
                    Diagnostic::error(format!("#error {}", message.trim()), directive.pos());
                self.raise(hooks, diag)
            }
            "pragma" => {
                hooks.found_directive(self, &directive)?;
                Ok(())
            }
            _ => {
                if hooks.found_unknown_directive(self, &line, &[])? {
                    return Ok(());
                }
                let diag = Diagnostic::warning(
                    format!("unknown preprocessing directive '#{}'", directive.text()),
                    directive.pos(),
                );
                self.raise(hooks, diag)
            }
        }
    }

    fn directive_conditional_open<H: Hooks>(
        &mut self,
        directive: &Token,
        rest: &[Token],
        active: bool,
        hooks: &mut H,
    ) -> anyhow::Result<()> {
        if !active {
            // Inside a skipped region only the nesting is tracked.
            self.cond.push(CondFrame {
                parent_active: false,
                taken: true,
                active: false,
                else_seen: false,
                pos: directive.pos().clone(),
            });
            return Ok(());
        }
        let value = if hooks.found_directive(self, directive)? {
            hooks.evaluated_conditional_expression(self, directive, &[], false)?;
            false
        } else {
            let (expression, value) = self.conditional_value(directive, rest, hooks)?;
            hooks.evaluated_conditional_expression(self, directive, &expression, value)?;
            value
        };
        self.cond.push(CondFrame {
            parent_active: true,
            taken: value,
            active: value,
            else_seen: false,
            pos: directive.pos().clone(),
        });
        Ok(())
    }

    fn directive_elif<H: Hooks>(
        &mut self,
        directive: &Token,
        rest: &[Token],
        hooks: &mut H,
    ) -> anyhow::Result<()> {
        let (parent_active, taken, else_seen) = match self.cond.last() {
            Some(f) => (f.parent_active, f.taken, f.else_seen),
            None => {
                let diag = Diagnostic::error("#elif without #if", directive.pos());
                return self.raise(hooks, diag);
            }
        };
        if else_seen {
            let diag = Diagnostic::error("#elif after #else", directive.pos());
            self.raise(hooks, diag)?;
        }
        if !parent_active || taken || else_seen {
            let frame = self.cond.last_mut().unwrap();
            frame.active = false;
            return Ok(());
        }
        let value = if hooks.found_directive(self, directive)? {
            hooks.evaluated_conditional_expression(self, directive, &[], false)?;
            false
        } else {
            let (expression, value) = self.conditional_value(directive, rest, hooks)?;
            hooks.evaluated_conditional_expression(self, directive, &expression, value)?;
            value
        };
        let frame = self.cond.last_mut().unwrap();
        frame.active = value;
        frame.taken = value;
        Ok(())
    }

    fn directive_else<H: Hooks>(&mut self, directive: &Token, hooks: &mut H) -> anyhow::Result<()> {
        let (parent_active, taken, else_seen) = match self.cond.last() {
            Some(f) => (f.parent_active, f.taken, f.else_seen),
            None => {
                let diag = Diagnostic::error("#else without #if", directive.pos());
                return self.raise(hooks, diag);
            }
        };
        if else_seen {
            let diag = Diagnostic::error("duplicate #else", directive.pos());
            return self.raise(hooks, diag);
        }
        if parent_active {
            hooks.found_directive(self, directive)?;
        }
        let frame = self.cond.last_mut().unwrap();
        frame.active = parent_active && !taken;
        frame.taken = true;
        frame.else_seen = true;
        Ok(())
    }

    fn directive_endif<H: Hooks>(&mut self, directive: &Token, hooks: &mut H) -> anyhow::Result<()> {
        match self.cond.pop() {
            Some(frame) => {
                if frame.parent_active {
                    hooks.found_directive(self, directive)?;
                }
                Ok(())
            }
            None => {
                let diag = Diagnostic::error("#endif without #if", directive.pos());
                self.raise(hooks, diag)
            }
        }
    }

    /// Evaluate the controlling expression of `#if`/`#elif`.
    ///
    /// Returns the sanitized expression tokens (for reporting) and the
    /// truth value; evaluation errors are raised and recover to false.
    fn conditional_value<H: Hooks>(
        &mut self,
        directive: &Token,
        rest: &[Token],
        hooks: &mut H,
    ) -> anyhow::Result<(Vec<Token>, bool)> {
        let expression = substantive(rest);
        if expression.is_empty() {
            let diag = Diagnostic::error(
                format!("#{} with no expression", directive.text()),
                directive.pos(),
            );
            self.raise(hooks, diag)?;
            return Ok((expression, false));
        }
        if matches!(directive.text(), "ifdef" | "ifndef") {
            let name = &expression[0];
            if !name.is_identifier() {
                let diag = Diagnostic::error(
                    format!("#{} expects a macro name", directive.text()),
                    directive.pos(),
                );
                self.raise(hooks, diag)?;
                return Ok((expression.clone(), false));
            }
            let mut value = self.macros.contains(name.text());
            if directive.text() == "ifndef" {
                value = !value;
            }
            return Ok((expression, value));
        }
        let replaced = match self.replace_defined(&expression) {
            Ok(replaced) => replaced,
            Err(diag) => {
                self.raise(hooks, diag)?;
                return Ok((expression, false));
            }
        };
        let expanded = self.expand_sequence(&replaced, hooks, &mut Vec::new())?;
        let sanitized = substantive(&expanded);
        match condition::evaluate(&sanitized, directive.pos()) {
            Ok(value) => Ok((expression, value != 0)),
            Err(diag) => {
                self.raise(hooks, diag)?;
                Ok((expression, false))
            }
        }
    }

    fn directive_include<H: Hooks>(
        &mut self,
        directive: &Token,
        rest: &[Token],
        hooks: &mut H,
    ) -> anyhow::Result<()> {
        let spec = spelled(rest);
        let spec = spec.trim();
        let (name, quoted) = if spec.len() >= 2 && spec.starts_with('"') && spec.ends_with('"') {
            (&spec[1..spec.len() - 1], true)
        } else if spec.len() >= 2 && spec.starts_with('<') && spec.ends_with('>') {
            (&spec[1..spec.len() - 1], false)
        } else {
            let diag = Diagnostic::error(
                format!("malformed #include: {spec}"),
                directive.pos(),
            );
            return self.raise(hooks, diag);
        };

        let mut candidates = Vec::new();
        if quoted {
            let dir = self
                .sources
                .last()
                .map(|f| f.dir.clone())
                .unwrap_or_else(|| self.main_dir.clone());
            candidates.push(dir.join(name));
        }
        candidates.extend(self.include_paths.iter().map(|p| p.join(name)));

        for path in candidates {
            if let Ok(source) = std::fs::read_to_string(&path) {
                let file_name = path.to_string_lossy().to_string();
                let mut tokens = lexer::tokenize(&file_name, &source);
                if matches!(tokens.last(), Some(t) if t.kind() == TokenKind::Eof) {
                    tokens.pop();
                }
                self.sources.push(SourceFrame {
                    lines: split_lines(tokens),
                    dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
                    is_main: false,
                });
                return Ok(());
            }
        }
        let diag = Diagnostic::error(
            format!("could not find include file {spec}"),
            directive.pos(),
        );
        self.raise(hooks, diag)
    }

    /// Whether `tokens[i]` begins a macro invocation.
    ///
    /// A function-like macro name with no following `(` on the logical line
    /// is a plain identifier.
    fn macro_invocation_at(&self, tokens: &[Token], i: usize, disabled: &[String]) -> bool {
        let token = &tokens[i];
        if !token.is_identifier() || disabled.iter().any(|d| d == token.text()) {
            return false;
        }
        match self.macros.get(token.text()) {
            None => false,
            Some(def) if def.is_function_like() => {
                matches!(next_substantive(tokens, i + 1), Some(j) if tokens[j].is_punct("("))
            }
            Some(_) => true,
        }
    }

    /// Expand the macro invocation at `tokens[i]`, firing the expansion hook
    /// family, and return the fully rescanned replacement together with the
    /// number of input tokens consumed.
    fn expand_macro_at<H: Hooks>(
        &mut self,
        tokens: &[Token],
        i: usize,
        hooks: &mut H,
        disabled: &mut Vec<String>,
    ) -> anyhow::Result<(Vec<Token>, usize)> {
        let call_tok = tokens[i].clone();
        let def = match self.macros.get(call_tok.text()).cloned() {
            Some(def) => def,
            None => return Ok((vec![call_tok], 1)),
        };

        if !def.is_function_like() {
            if hooks.expanding_object_like_macro(self, &def.name, &def.body, &call_tok)? {
                return Ok((vec![call_tok], 1));
            }
            let substituted = process_paste(def.body.clone());
            hooks.expanded_macro(self, &substituted)?;
            disabled.push(call_tok.text().to_string());
            let rescanned = self.expand_sequence(&substituted, hooks, disabled)?;
            disabled.pop();
            hooks.rescanned_macro(self, &rescanned)?;
            return Ok((rescanned, 1));
        }

        let open = match next_substantive(tokens, i + 1) {
            Some(j) if tokens[j].is_punct("(") => j,
            _ => return Ok((vec![call_tok], 1)),
        };
        let (raw_args, end) = match collect_arguments(tokens, open) {
            Some(collected) => collected,
            None => {
                let diag = Diagnostic::error(
                    format!("unterminated invocation of macro '{}'", call_tok.text()),
                    call_tok.pos(),
                );
                self.raise(hooks, diag)?;
                return Ok((vec![call_tok], 1));
            }
        };
        let call_tokens: Vec<Token> = tokens[i..end].to_vec();
        let formals = def.params.clone().unwrap_or_default();

        let raw_args = normalize_arity(&formals, raw_args);
        if raw_args.len() != formals.len() {
            let diag = Diagnostic::error(
                format!(
                    "macro '{}' expects {} argument(s), got {}",
                    call_tok.text(),
                    formals.len(),
                    raw_args.len()
                ),
                call_tok.pos(),
            );
            self.raise(hooks, diag)?;
            return Ok((call_tokens, end - i));
        }

        if hooks.expanding_function_like_macro(
            self,
            &def.name,
            &formals,
            &def.body,
            &call_tok,
            &raw_args,
            &call_tokens,
        )? {
            return Ok((call_tokens, end - i));
        }

        let mut expanded_args = Vec::with_capacity(raw_args.len());
        for arg in &raw_args {
            expanded_args.push(self.expand_sequence(arg, hooks, disabled)?);
        }

        let substituted = substitute_function(&def, &raw_args, &expanded_args);
        hooks.expanded_macro(self, &substituted)?;
        disabled.push(call_tok.text().to_string());
        let rescanned = self.expand_sequence(&substituted, hooks, disabled)?;
        disabled.pop();
        hooks.rescanned_macro(self, &rescanned)?;
        Ok((rescanned, end - i))
    }

    /// Expand every macro invocation in `tokens`, left to right.
    fn expand_sequence<H: Hooks>(
        &mut self,
        tokens: &[Token],
        hooks: &mut H,
        disabled: &mut Vec<String>,
    ) -> anyhow::Result<Vec<Token>> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            if self.macro_invocation_at(tokens, i, disabled) {
                let (mut expanded, consumed) = self.expand_macro_at(tokens, i, hooks, disabled)?;
                out.append(&mut expanded);
                i += consumed;
            } else {
                out.push(tokens[i].clone());
                i += 1;
            }
        }
        Ok(out)
    }

    /// Replace `defined NAME` and `defined(NAME)` with `1`/`0`.
    ///
    /// This runs before macro expansion, as the standard requires. The
    /// input is sanitized, so operands are adjacent.
    fn replace_defined(&self, tokens: &[Token]) -> Result<Vec<Token>, Diagnostic> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            if token.is_identifier() && token.text() == "defined" {
                let (name_idx, parenthesized) =
                    if matches!(tokens.get(i + 1), Some(t) if t.is_punct("(")) {
                        (i + 2, true)
                    } else {
                        (i + 1, false)
                    };
                match tokens.get(name_idx) {
                    Some(name) if name.is_identifier() => {
                        let mut next = name_idx + 1;
                        if parenthesized {
                            if !matches!(tokens.get(next), Some(t) if t.is_punct(")")) {
                                return Err(Diagnostic::error(
                                    "expected ')' after 'defined'",
                                    token.pos(),
                                ));
                            }
                            next += 1;
                        }
                        let value = if self.macros.contains(name.text()) { "1" } else { "0" };
                        out.push(Token::new(value, TokenKind::Number, token.pos().clone()));
                        i = next;
                        continue;
                    }
                    _ => {
                        return Err(Diagnostic::error(
                            "operator 'defined' requires a macro name",
                            token.pos(),
                        ))
                    }
                }
            }
            out.push(token.clone());
            i += 1;
        }
        Ok(out)
    }

    fn raise<H: Hooks>(&mut self, hooks: &mut H, diagnostic: Diagnostic) -> anyhow::Result<()> {
        if hooks.throw_exception(self, &diagnostic)? {
            Err(anyhow::Error::new(diagnostic))
        } else {
            Ok(())
        }
    }
}

fn split_lines(tokens: Vec<Token>) -> VecDeque<Vec<Token>> {
    let mut lines = VecDeque::new();
    let mut current = Vec::new();
    for token in tokens {
        let is_newline = token.kind() == TokenKind::Newline;
        current.push(token);
        if is_newline {
            lines.push_back(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        lines.push_back(current);
    }
    lines
}

fn next_substantive(tokens: &[Token], from: usize) -> Option<usize> {
    (from..tokens.len()).find(|&i| tokens[i].kind().is_substantive())
}

fn substantive(tokens: &[Token]) -> Vec<Token> {
    tokens
        .iter()
        .filter(|t| t.kind().is_substantive())
        .cloned()
        .collect()
}

/// Spell a token sequence back out as text, whitespace included.
fn spelled(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter(|t| !matches!(t.kind(), TokenKind::Newline | TokenKind::Eof))
        .map(Token::text)
        .collect()
}

/// Collect the arguments of a function-like invocation starting at the `(`
/// at `open`. Returns the trimmed argument sequences and the index one past
/// the closing `)`, or `None` if the parentheses never balance.
fn collect_arguments(tokens: &[Token], open: usize) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut args: Vec<Vec<Token>> = vec![Vec::new()];
    let mut depth = 1usize;
    let mut j = open + 1;
    while j < tokens.len() {
        let token = &tokens[j];
        if token.is_punct("(") {
            depth += 1;
        } else if token.is_punct(")") {
            depth -= 1;
            if depth == 0 {
                let args = args.into_iter().map(|a| trim_whitespace(a)).collect();
                return Some((args, j + 1));
            }
        } else if token.is_punct(",") && depth == 1 {
            args.push(Vec::new());
            j += 1;
            continue;
        }
        args.last_mut().unwrap().push(token.clone());
        j += 1;
    }
    None
}

/// A call with no tokens between the parentheses is a zero-argument call
/// when the macro takes no parameters.
fn normalize_arity(formals: &[Token], args: Vec<Vec<Token>>) -> Vec<Vec<Token>> {
    if formals.is_empty() && args.len() == 1 && args[0].is_empty() {
        return Vec::new();
    }
    args
}

fn trim_whitespace(tokens: Vec<Token>) -> Vec<Token> {
    let start = tokens
        .iter()
        .position(|t| t.kind().is_substantive())
        .unwrap_or(tokens.len());
    let end = tokens
        .iter()
        .rposition(|t| t.kind().is_substantive())
        .map(|i| i + 1)
        .unwrap_or(start);
    tokens[start..end].to_vec()
}

/// Substitute arguments into a function-like macro body: parameter
/// replacement with `#` stringizing, then `##` pasting.
fn substitute_function(def: &MacroDef, raw_args: &[Vec<Token>], expanded_args: &[Vec<Token>]) -> Vec<Token> {
    let body = &def.body;
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let token = &body[i];
        if token.is_punct("#") {
            if let Some(j) = next_substantive(body, i + 1) {
                if let Some(p) = def.param_index(body[j].text()) {
                    out.push(stringize(&raw_args[p], token.pos().clone()));
                    i = j + 1;
                    continue;
                }
            }
        }
        if token.is_identifier() {
            if let Some(p) = def.param_index(token.text()) {
                // Operands of ## substitute unexpanded.
                let replacement = if paste_adjacent(body, i) {
                    &raw_args[p]
                } else {
                    &expanded_args[p]
                };
                if replacement.is_empty() {
                    out.push(Token::placemarker(token.pos().clone()));
                } else {
                    out.extend(replacement.iter().cloned());
                }
                i += 1;
                continue;
            }
        }
        out.push(token.clone());
        i += 1;
    }
    process_paste(out)
}

fn paste_adjacent(body: &[Token], i: usize) -> bool {
    let before = body[..i]
        .iter()
        .rposition(|t| t.kind().is_substantive() || t.kind() == TokenKind::Placemarker);
    let after = next_substantive(body, i + 1);
    matches!(before, Some(b) if body[b].is_punct("##"))
        || matches!(after, Some(a) if body[a].is_punct("##"))
}

/// Resolve `##` operators in a substituted body.
fn process_paste(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.is_punct("##") {
            while matches!(out.last(), Some(t) if t.is_whitespace()) {
                out.pop();
            }
            let left = out.pop();
            let mut j = i + 1;
            while matches!(tokens.get(j), Some(t) if t.is_whitespace()) {
                j += 1;
            }
            let right = tokens.get(j).cloned();
            match (left, right) {
                (Some(l), Some(r)) => {
                    out.push(paste(l, r));
                    i = j + 1;
                }
                (Some(l), None) => {
                    out.push(l);
                    i += 1;
                }
                (None, Some(r)) => {
                    out.push(r);
                    i = j + 1;
                }
                (None, None) => i += 1,
            }
            continue;
        }
        out.push(token.clone());
        i += 1;
    }
    out
}

fn paste(left: Token, right: Token) -> Token {
    if left.kind() == TokenKind::Placemarker {
        return right;
    }
    if right.kind() == TokenKind::Placemarker {
        return left;
    }
    let text = format!("{}{}", left.text(), right.text());
    let kind = classify_pasted(&text);
    Token::new(text, kind, left.pos().clone())
}

fn classify_pasted(text: &str) -> TokenKind {
    let tokens = lexer::tokenize("<paste>", text);
    let substantive: Vec<&Token> = tokens
        .iter()
        .filter(|t| t.kind().is_substantive())
        .collect();
    match substantive.as_slice() {
        [only] if only.text() == text => only.kind(),
        _ => TokenKind::Other,
    }
}

/// Build the string literal for a `#`-stringized argument.
fn stringize(arg: &[Token], pos: Position) -> Token {
    let mut content = String::new();
    let mut pending_space = false;
    for token in arg {
        if token.is_whitespace() {
            pending_space = !content.is_empty();
            continue;
        }
        if token.kind() == TokenKind::Placemarker {
            continue;
        }
        if pending_space {
            content.push(' ');
            pending_space = false;
        }
        for c in token.text().chars() {
            if c == '"' || c == '\\' {
                content.push('\\');
            }
            content.push(c);
        }
    }
    Token::new(format!("\"{content}\""), TokenKind::Literal, pos)
}
