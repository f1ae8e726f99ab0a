//! Preprocessor tokens.

use std::fmt;
use std::rc::Rc;

/// Classification of a preprocessor token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    /// A string or character literal.
    Literal,
    Punctuator,
    /// A run of horizontal whitespace, or a comment.
    Whitespace,
    Newline,
    /// Stands in for an empty macro argument during substitution.
    Placemarker,
    Eof,
    Other,
}

impl TokenKind {
    /// Whether tokens of this kind carry meaning for expansion tracking.
    ///
    /// Whitespace, newlines, end-of-file markers and placemarkers are
    /// formatting artifacts; everything else is substantive.
    pub fn is_substantive(self) -> bool {
        !matches!(
            self,
            TokenKind::Whitespace | TokenKind::Newline | TokenKind::Placemarker | TokenKind::Eof
        )
    }
}

/// Source position of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub file: Rc<str>,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(file: Rc<str>, line: u32, column: u32) -> Position {
        Position { file, line, column }
    }

    /// A position for tokens that do not come from a file, such as
    /// command-line definitions.
    pub fn command_line() -> Position {
        Position {
            file: "<command line>".into(),
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A preprocessor token.
///
/// Tokens are compared by their printable text only; the kind and position
/// are carried along for classification and diagnostics.
#[derive(Debug, Clone, Eq)]
pub struct Token {
    text: String,
    kind: TokenKind,
    pos: Position,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Token {
    pub fn new<T: Into<String>>(text: T, kind: TokenKind, pos: Position) -> Token {
        Token {
            text: text.into(),
            kind,
            pos,
        }
    }

    pub fn placemarker(pos: Position) -> Token {
        Token {
            text: String::new(),
            kind: TokenKind::Placemarker,
            pos,
        }
    }

    pub fn eof(pos: Position) -> Token {
        Token {
            text: String::new(),
            kind: TokenKind::Eof,
            pos,
        }
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    #[inline]
    pub fn pos(&self) -> &Position {
        &self.pos
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    /// Whether this token is the given punctuator.
    pub fn is_punct(&self, text: &str) -> bool {
        self.kind == TokenKind::Punctuator && self.text == text
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Newline)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_kind_and_position() {
        let a = Token::new("x", TokenKind::Identifier, Position::command_line());
        let b = Token::new(
            "x",
            TokenKind::Other,
            Position::new("f.c".into(), 10, 3),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn substantive_kinds() {
        assert!(TokenKind::Identifier.is_substantive());
        assert!(TokenKind::Punctuator.is_substantive());
        assert!(!TokenKind::Whitespace.is_substantive());
        assert!(!TokenKind::Newline.is_substantive());
        assert!(!TokenKind::Placemarker.is_substantive());
        assert!(!TokenKind::Eof.is_substantive());
    }
}
