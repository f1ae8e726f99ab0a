//! The C-family lexer.
//!
//! The lexer converts source text into [`Token`]s. Backslash-newline splices
//! and `\r\n` line endings are resolved before tokenization, so downstream
//! code only ever sees logical lines. Comments lex as a single whitespace
//! token, which keeps them out of macro bodies while preserving token
//! separation.

use crate::token::{Position, Token, TokenKind};
use std::rc::Rc;

/// A source character with the position it was read from.
struct Pc {
    c: char,
    line: u32,
    column: u32,
}

/// Resolve line splices and carriage returns, attaching positions.
fn preprocess(source: &str) -> Vec<Pc> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = Vec::with_capacity(chars.len());
    let (mut line, mut column) = (1u32, 1u32);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\r' {
            i += 1;
            continue;
        }
        if c == '\\' && matches!(chars.get(i + 1), Some('\n'))
            || c == '\\' && matches!(chars.get(i + 1), Some('\r')) && matches!(chars.get(i + 2), Some('\n'))
        {
            i += if chars[i + 1] == '\r' { 3 } else { 2 };
            line += 1;
            column = 1;
            continue;
        }
        out.push(Pc { c, line, column });
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
        i += 1;
    }
    out
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

const PUNCT3: [&str; 3] = ["<<=", ">>=", "..."];
const PUNCT2: [&str; 19] = [
    "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=",
];
const PUNCT1: &str = "()[]{};:,.?~!%^&*-+=<>|/#";

/// The lexer.
pub struct Lexer {
    src: Vec<Pc>,
    idx: usize,
    file: Rc<str>,
}

impl Lexer {
    pub fn new(file: &str, source: &str) -> Lexer {
        Lexer {
            src: preprocess(source),
            idx: 0,
            file: file.into(),
        }
    }

    /// Tokenize the entire source, appending a final end-of-file token.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        let pos = match tokens.last() {
            Some(t) => t.pos().clone(),
            None => Position::new(Rc::clone(&self.file), 1, 1),
        };
        tokens.push(Token::eof(pos));
        tokens
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.src.get(self.idx + ahead).map(|pc| pc.c)
    }

    fn here(&self) -> Position {
        match self.src.get(self.idx) {
            Some(pc) => Position::new(Rc::clone(&self.file), pc.line, pc.column),
            None => Position::new(Rc::clone(&self.file), 0, 0),
        }
    }

    fn take(&mut self, n: usize) -> String {
        let text: String = self.src[self.idx..self.idx + n].iter().map(|pc| pc.c).collect();
        self.idx += n;
        text
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, pred: F) -> String {
        let start = self.idx;
        while let Some(c) = self.peek(0) {
            if !pred(c) {
                break;
            }
            self.idx += 1;
        }
        self.src[start..self.idx].iter().map(|pc| pc.c).collect()
    }

    fn next_token(&mut self) -> Option<Token> {
        let c = self.peek(0)?;
        let pos = self.here();

        if c == '\n' {
            self.idx += 1;
            return Some(Token::new("\n", TokenKind::Newline, pos));
        }
        if c.is_whitespace() {
            let text = self.take_while(|c| c.is_whitespace() && c != '\n');
            return Some(Token::new(text, TokenKind::Whitespace, pos));
        }
        if c == '/' && self.peek(1) == Some('/') {
            self.take_while(|c| c != '\n');
            return Some(Token::new(" ", TokenKind::Whitespace, pos));
        }
        if c == '/' && self.peek(1) == Some('*') {
            self.idx += 2;
            while self.peek(0).is_some() {
                if self.peek(0) == Some('*') && self.peek(1) == Some('/') {
                    self.idx += 2;
                    break;
                }
                self.idx += 1;
            }
            return Some(Token::new(" ", TokenKind::Whitespace, pos));
        }
        if is_ident_start(c) {
            let text = self.take_while(is_ident_continue);
            return Some(Token::new(text, TokenKind::Identifier, pos));
        }
        if c.is_ascii_digit() || (c == '.' && matches!(self.peek(1), Some(d) if d.is_ascii_digit()))
        {
            return Some(self.number(pos));
        }
        if c == '"' || c == '\'' {
            return Some(self.literal(c, pos));
        }
        for p in PUNCT3 {
            if self.matches(p) {
                let text = self.take(p.len());
                return Some(Token::new(text, TokenKind::Punctuator, pos));
            }
        }
        for p in PUNCT2 {
            if self.matches(p) {
                let text = self.take(p.len());
                return Some(Token::new(text, TokenKind::Punctuator, pos));
            }
        }
        // ## must out-munch #.
        if c == '#' && self.peek(1) == Some('#') {
            let text = self.take(2);
            return Some(Token::new(text, TokenKind::Punctuator, pos));
        }
        if PUNCT1.contains(c) {
            let text = self.take(1);
            return Some(Token::new(text, TokenKind::Punctuator, pos));
        }
        let text = self.take(1);
        Some(Token::new(text, TokenKind::Other, pos))
    }

    fn matches(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, p)| self.peek(i) == Some(p))
    }

    fn number(&mut self, pos: Position) -> Token {
        let start = self.idx;
        self.idx += 1;
        while let Some(c) = self.peek(0) {
            if is_ident_continue(c) || c == '.' {
                self.idx += 1;
            } else if (c == '+' || c == '-')
                && matches!(
                    self.src.get(self.idx - 1).map(|pc| pc.c),
                    Some('e') | Some('E') | Some('p') | Some('P')
                )
            {
                self.idx += 1;
            } else {
                break;
            }
        }
        let text: String = self.src[start..self.idx].iter().map(|pc| pc.c).collect();
        Token::new(text, TokenKind::Number, pos)
    }

    fn literal(&mut self, quote: char, pos: Position) -> Token {
        let start = self.idx;
        self.idx += 1;
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                // Unterminated literal; take what we have.
                break;
            }
            if c == '\\' && self.peek(1).is_some() && self.peek(1) != Some('\n') {
                self.idx += 2;
                continue;
            }
            self.idx += 1;
            if c == quote && self.idx - start > 1 {
                break;
            }
        }
        let text: String = self.src[start..self.idx].iter().map(|pc| pc.c).collect();
        Token::new(text, TokenKind::Literal, pos)
    }
}

/// Tokenize `source`, labeling positions with `file`.
pub fn tokenize(file: &str, source: &str) -> Vec<Token> {
    Lexer::new(file, source).tokenize()
}
