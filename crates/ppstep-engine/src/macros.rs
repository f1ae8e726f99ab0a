//! The macro table.

use crate::lexer;
use crate::token::{Position, Token, TokenKind};
use std::collections::HashMap;

/// A macro definition.
#[derive(Debug, Clone)]
pub struct MacroDef {
    /// The name token from the definition site.
    pub name: Token,
    /// Formal parameters; `None` for object-like macros.
    ///
    /// An empty vector is a function-like macro with zero parameters, which
    /// is distinct from an object-like macro.
    pub params: Option<Vec<Token>>,
    /// The replacement list, with interior whitespace preserved.
    pub body: Vec<Token>,
}

impl MacroDef {
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// Index of `text` in the formal parameter list.
    pub fn param_index(&self, text: &str) -> Option<usize> {
        self.params
            .as_ref()?
            .iter()
            .position(|p| p.text() == text)
    }
}

/// Errors from parsing a macro definition.
#[derive(Debug, PartialEq, Eq)]
pub enum DefineError {
    MissingName,
    BadParameterList,
    Unsupported(&'static str),
}

impl std::fmt::Display for DefineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefineError::MissingName => write!(f, "macro definition is missing a name"),
            DefineError::BadParameterList => write!(f, "malformed macro parameter list"),
            DefineError::Unsupported(what) => write!(f, "{what} are not supported"),
        }
    }
}

impl std::error::Error for DefineError {}

/// Name-to-definition map for all defined macros.
#[derive(Debug, Default)]
pub struct MacroTable {
    defs: HashMap<String, MacroDef>,
}

impl MacroTable {
    /// Insert a definition, replacing any previous definition of the name.
    pub fn define(&mut self, def: MacroDef) -> Option<MacroDef> {
        self.defs.insert(def.name.text().to_string(), def)
    }

    pub fn undefine(&mut self, name: &str) -> Option<MacroDef> {
        self.defs.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.defs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// All definitions, sorted by name.
    pub fn iter_sorted(&self) -> Vec<&MacroDef> {
        let mut defs: Vec<&MacroDef> = self.defs.values().collect();
        defs.sort_by(|a, b| a.name.text().cmp(b.name.text()));
        defs
    }

    /// Parse the token form of a `#define` line: everything after the
    /// `define` keyword.
    pub fn parse_definition(tokens: &[Token]) -> Result<MacroDef, DefineError> {
        let mut i = skip_whitespace(tokens, 0);
        let name = match tokens.get(i) {
            Some(t) if t.is_identifier() => t.clone(),
            _ => return Err(DefineError::MissingName),
        };
        i += 1;

        // A parameter list only exists when `(` immediately follows the name.
        let params = match tokens.get(i) {
            Some(t) if t.is_punct("(") => {
                i += 1;
                let (params, next) = parse_params(tokens, i)?;
                i = next;
                Some(params)
            }
            _ => None,
        };

        let body = trim_whitespace(&tokens[i.min(tokens.len())..]);
        Ok(MacroDef { name, params, body })
    }

    /// Parse a command-line style definition: `NAME`, `NAME=VAL` or
    /// `NAME(a,b)=VAL`. A missing value defaults to `1`.
    pub fn parse_cli_definition(spec: &str) -> Result<MacroDef, DefineError> {
        let (head, value) = match find_top_level_eq(spec) {
            Some(at) => (&spec[..at], Some(&spec[at + 1..])),
            None => (spec, None),
        };
        let head_tokens = substantive(&lexer::tokenize("<command line>", head));
        let mut def = MacroTable::parse_definition(&head_tokens)?;
        def.body = match value {
            Some(v) => trim_whitespace(&lexer::tokenize("<command line>", v)),
            None => vec![Token::new(
                "1",
                TokenKind::Number,
                Position::command_line(),
            )],
        };
        Ok(def)
    }
}

fn substantive(tokens: &[Token]) -> Vec<Token> {
    tokens
        .iter()
        .filter(|t| t.kind().is_substantive())
        .cloned()
        .collect()
}

fn find_top_level_eq(spec: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in spec.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn skip_whitespace(tokens: &[Token], mut i: usize) -> usize {
    while matches!(tokens.get(i), Some(t) if !t.kind().is_substantive()) {
        i += 1;
    }
    i
}

fn trim_whitespace(tokens: &[Token]) -> Vec<Token> {
    let mut start = 0;
    let mut end = tokens.len();
    while start < end && !tokens[start].kind().is_substantive() {
        start += 1;
    }
    while end > start && !tokens[end - 1].kind().is_substantive() {
        end -= 1;
    }
    tokens[start..end].to_vec()
}

fn parse_params(tokens: &[Token], mut i: usize) -> Result<(Vec<Token>, usize), DefineError> {
    let mut params = Vec::new();
    i = skip_whitespace(tokens, i);
    if matches!(tokens.get(i), Some(t) if t.is_punct(")")) {
        return Ok((params, i + 1));
    }
    loop {
        i = skip_whitespace(tokens, i);
        match tokens.get(i) {
            Some(t) if t.is_identifier() => params.push(t.clone()),
            Some(t) if t.is_punct("...") => {
                return Err(DefineError::Unsupported("variadic macros"))
            }
            _ => return Err(DefineError::BadParameterList),
        }
        i = skip_whitespace(tokens, i + 1);
        match tokens.get(i) {
            Some(t) if t.is_punct(",") => i += 1,
            Some(t) if t.is_punct(")") => return Ok((params, i + 1)),
            _ => return Err(DefineError::BadParameterList),
        }
    }
}
