//! Evaluation of `#if`/`#elif` controlling expressions.
//!
//! The caller is responsible for replacing `defined` operators and macro
//! expanding the expression first; this module parses and evaluates the
//! resulting constant expression. Per the preprocessor's rules, identifiers
//! that survive expansion evaluate to zero.

use crate::error::Diagnostic;
use crate::token::{Position, Token, TokenKind};

/// Evaluate a constant expression over sanitized tokens.
///
/// `pos` anchors diagnostics for errors that cannot be attributed to a
/// specific token (such as an empty expression).
pub fn evaluate(tokens: &[Token], pos: &Position) -> Result<i64, Diagnostic> {
    let mut parser = Parser { tokens, i: 0, pos };
    let value = parser.ternary()?;
    match parser.peek() {
        None => Ok(value),
        Some(t) => Err(Diagnostic::error(
            format!("unexpected token '{}' in conditional expression", t.text()),
            t.pos(),
        )),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    i: usize,
    pos: &'a Position,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.i)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let t = self.tokens.get(self.i);
        self.i += 1;
        t
    }

    fn eat_punct(&mut self, text: &str) -> bool {
        if matches!(self.peek(), Some(t) if t.is_punct(text)) {
            self.i += 1;
            true
        } else {
            false
        }
    }

    fn ternary(&mut self) -> Result<i64, Diagnostic> {
        let condition = self.binary(1)?;
        if !self.eat_punct("?") {
            return Ok(condition);
        }
        let then = self.ternary()?;
        if !self.eat_punct(":") {
            return Err(Diagnostic::error(
                "expected ':' in conditional expression",
                self.here(),
            ));
        }
        let otherwise = self.ternary()?;
        Ok(if condition != 0 { then } else { otherwise })
    }

    fn binary(&mut self, min_prec: u8) -> Result<i64, Diagnostic> {
        let mut lhs = self.unary()?;
        loop {
            let (op, prec) = match self.peek() {
                Some(t) if t.kind() == TokenKind::Punctuator => {
                    match precedence(t.text()) {
                        Some(prec) if prec >= min_prec => (t.clone(), prec),
                        _ => break,
                    }
                }
                _ => break,
            };
            self.i += 1;

            // Short-circuit before evaluating the right-hand side so that
            // expressions like `0 && 1/0` do not fault.
            if op.text() == "&&" && lhs == 0 {
                self.binary(prec + 1)?;
                lhs = 0;
                continue;
            }
            if op.text() == "||" && lhs != 0 {
                self.binary(prec + 1)?;
                lhs = 1;
                continue;
            }

            let rhs = self.binary(prec + 1)?;
            lhs = apply(&op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i64, Diagnostic> {
        let token = match self.peek() {
            Some(t) => t,
            None => {
                return Err(Diagnostic::error(
                    "expected a conditional expression",
                    self.pos,
                ))
            }
        };
        if token.kind() == TokenKind::Punctuator {
            match token.text() {
                "!" => {
                    self.i += 1;
                    return Ok((self.unary()? == 0) as i64);
                }
                "~" => {
                    self.i += 1;
                    return Ok(!self.unary()?);
                }
                "-" => {
                    self.i += 1;
                    return Ok(self.unary()?.wrapping_neg());
                }
                "+" => {
                    self.i += 1;
                    return self.unary();
                }
                "(" => {
                    self.i += 1;
                    let value = self.ternary()?;
                    if !self.eat_punct(")") {
                        return Err(Diagnostic::error(
                            "expected ')' in conditional expression",
                            self.here(),
                        ));
                    }
                    return Ok(value);
                }
                _ => {}
            }
        }
        let token = self.bump().unwrap();
        match token.kind() {
            TokenKind::Number => parse_number(token),
            TokenKind::Literal if token.text().starts_with('\'') => parse_char(token),
            // Identifiers that survive macro expansion evaluate to zero.
            TokenKind::Identifier => Ok(0),
            _ => Err(Diagnostic::error(
                format!("unexpected token '{}' in conditional expression", token.text()),
                token.pos(),
            )),
        }
    }

    fn here(&self) -> &'a Position {
        match self.tokens.get(self.i.min(self.tokens.len().saturating_sub(1))) {
            Some(t) => t.pos(),
            None => self.pos,
        }
    }
}

fn precedence(op: &str) -> Option<u8> {
    Some(match op {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | "<=" | ">" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    })
}

fn apply(op: &Token, lhs: i64, rhs: i64) -> Result<i64, Diagnostic> {
    Ok(match op.text() {
        "||" => ((lhs != 0) || (rhs != 0)) as i64,
        "&&" => ((lhs != 0) && (rhs != 0)) as i64,
        "|" => lhs | rhs,
        "^" => lhs ^ rhs,
        "&" => lhs & rhs,
        "==" => (lhs == rhs) as i64,
        "!=" => (lhs != rhs) as i64,
        "<" => (lhs < rhs) as i64,
        "<=" => (lhs <= rhs) as i64,
        ">" => (lhs > rhs) as i64,
        ">=" => (lhs >= rhs) as i64,
        "<<" => lhs.wrapping_shl(rhs as u32),
        ">>" => lhs.wrapping_shr(rhs as u32),
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "*" => lhs.wrapping_mul(rhs),
        "/" | "%" if rhs == 0 => {
            return Err(Diagnostic::error(
                "division by zero in conditional expression",
                op.pos(),
            ))
        }
        "/" => lhs.wrapping_div(rhs),
        "%" => lhs.wrapping_rem(rhs),
        _ => {
            return Err(Diagnostic::error(
                format!("unexpected operator '{}' in conditional expression", op.text()),
                op.pos(),
            ))
        }
    })
}

fn parse_number(token: &Token) -> Result<i64, Diagnostic> {
    let text = token
        .text()
        .trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        i64::from_str_radix(&text[1..], 8)
    } else {
        text.parse::<i64>()
    };
    parsed.map_err(|_| {
        Diagnostic::error(
            format!("'{}' is not an integer constant", token.text()),
            token.pos(),
        )
    })
}

fn parse_char(token: &Token) -> Result<i64, Diagnostic> {
    let inner = token.text().trim_matches('\'');
    let mut chars = inner.chars();
    let value = match chars.next() {
        Some('\\') => match chars.next() {
            Some('n') => '\n' as i64,
            Some('t') => '\t' as i64,
            Some('r') => '\r' as i64,
            Some('0') => 0,
            Some('\\') => '\\' as i64,
            Some('\'') => '\'' as i64,
            Some(c) => c as i64,
            None => 0,
        },
        Some(c) => c as i64,
        None => 0,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn eval(expr: &str) -> Result<i64, Diagnostic> {
        let tokens: Vec<Token> = lexer::tokenize("test.c", expr)
            .into_iter()
            .filter(|t| t.kind().is_substantive())
            .collect();
        evaluate(&tokens, &Position::command_line())
    }

    macro_rules! eval_test {
        ($name: ident, $input: expr, $want: expr) => {
            #[test]
            fn $name() {
                assert_eq!(eval($input).unwrap(), $want);
            }
        };
    }

    eval_test![number, "42", 42];
    eval_test![hex, "0x2A", 42];
    eval_test![octal, "052", 42];
    eval_test![suffixed, "42UL", 42];
    eval_test![arithmetic, "1 + 2 * 3", 7];
    eval_test![parens, "(1 + 2) * 3", 9];
    eval_test![comparison, "3 < 5", 1];
    eval_test![logical_and, "1 && 0", 0];
    eval_test![logical_or, "0 || 2", 1];
    eval_test![short_circuit_and, "0 && 1 / 0", 0];
    eval_test![short_circuit_or, "1 || 1 / 0", 1];
    eval_test![unary_not, "!5", 0];
    eval_test![unary_minus, "-3 + 5", 2];
    eval_test![bitwise, "0xF0 | 0x0F", 0xFF];
    eval_test![shifts, "1 << 4", 16];
    eval_test![ternary_true, "1 ? 2 : 3", 2];
    eval_test![ternary_false, "0 ? 2 : 3", 3];
    eval_test![unknown_identifier_is_zero, "SOME_UNDEFINED_NAME", 0];
    eval_test![char_constant, "'a'", 97];
    eval_test![escaped_char, r"'\n'", 10];

    #[test]
    fn division_by_zero() {
        assert!(eval("1 / 0").is_err());
    }

    #[test]
    fn empty_expression() {
        assert!(eval("").is_err());
    }

    #[test]
    fn trailing_garbage() {
        assert!(eval("1 2").is_err());
    }

    #[test]
    fn unbalanced_paren() {
        assert!(eval("(1 + 2").is_err());
    }
}
