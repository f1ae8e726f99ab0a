//! Token sequence utilities.
//!
//! Two flavors of a sequence travel through the debugger in parallel:
//! *sanitized* (whitespace, end-of-file, placemarker tokens removed), which
//! the tracker's matching works on, and *preserved* (whitespace kept), which
//! the recorder uses for faithful text. The sanitized flavor derives from
//! the preserved one by dropping whitespace, so sanitation is idempotent.

use ppstep_engine::{Token, TokenKind};

fn keep_in_sanitized(token: &Token) -> bool {
    !matches!(
        token.kind(),
        TokenKind::Whitespace | TokenKind::Newline | TokenKind::Eof | TokenKind::Placemarker
    )
}

fn keep_in_preserved(token: &Token) -> bool {
    !matches!(token.kind(), TokenKind::Eof | TokenKind::Placemarker)
}

/// Remove whitespace, end-of-file and placemarker tokens.
pub fn sanitize(tokens: &[Token]) -> Vec<Token> {
    tokens.iter().filter(|t| keep_in_sanitized(t)).cloned().collect()
}

/// Like [`sanitize`], but whitespace is kept.
pub fn preserve(tokens: &[Token]) -> Vec<Token> {
    tokens.iter().filter(|t| keep_in_preserved(t)).cloned().collect()
}

/// Whether a lexed token survives sanitation at all.
pub fn is_substantive(token: &Token) -> bool {
    keep_in_sanitized(token)
}

/// Find the first occurrence of `needle` as a contiguous subsequence of
/// `haystack`, starting at or after `from`. Tokens compare by printable
/// value. Returns half-open indices; an empty needle matches at `from`.
pub fn find_subseq(haystack: &[Token], needle: &[Token], from: usize) -> Option<(usize, usize)> {
    if from > haystack.len() {
        return None;
    }
    if needle.is_empty() {
        return Some((from, from));
    }
    if haystack.len() - from < needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|at| (from + at, from + at + needle.len()))
}

/// Render tokens with a single space between them.
pub fn write_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::text)
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Render preserved tokens verbatim, with no inserted delimiters.
pub fn write_tokens_preserved(tokens: &[Token]) -> String {
    tokens.iter().map(Token::text).collect()
}

// Spacing suppression sets for normalized rendering.
const NO_SPACE_BEFORE: &str = ",;)]}";
const NO_SPACE_AFTER: &str = "([{";

/// Render a preserved sequence with normalized whitespace: a single space
/// between tokens, suppressed around brackets and before separators. Used
/// for trace file lines, where raw whitespace runs would be noise.
pub fn write_tokens_normalized(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut need_space = false;
    for token in tokens {
        if token.is_whitespace() {
            continue;
        }
        let text = token.text();
        if text.is_empty() {
            continue;
        }
        let first = text.chars().next().unwrap();
        if need_space && !NO_SPACE_BEFORE.contains(first) {
            out.push(' ');
        }
        out.push_str(text);
        let last = text.chars().last().unwrap();
        need_space = !NO_SPACE_AFTER.contains(last);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppstep_engine::Position;

    fn tok(text: &str) -> Token {
        let kind = if text.chars().all(|c| c.is_whitespace()) {
            TokenKind::Whitespace
        } else if text.chars().next().unwrap().is_alphabetic() {
            TokenKind::Identifier
        } else if text.chars().next().unwrap().is_ascii_digit() {
            TokenKind::Number
        } else {
            TokenKind::Punctuator
        };
        Token::new(text, kind, Position::command_line())
    }

    fn toks(texts: &[&str]) -> Vec<Token> {
        texts.iter().map(|t| tok(t)).collect()
    }

    #[test]
    fn sanitize_removes_formatting_tokens() {
        let seq = vec![
            tok("a"),
            tok(" "),
            tok("b"),
            Token::placemarker(Position::command_line()),
            Token::eof(Position::command_line()),
        ];
        let sanitized = sanitize(&seq);
        assert_eq!(write_tokens(&sanitized), "a b");
    }

    #[test]
    fn preserve_keeps_whitespace() {
        let seq = vec![tok("a"), tok(" "), tok("b"), Token::eof(Position::command_line())];
        let preserved = preserve(&seq);
        assert_eq!(write_tokens_preserved(&preserved), "a b");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let seq = vec![tok("a"), tok(" "), tok("b")];
        let once = sanitize(&seq);
        let twice = sanitize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn sanitized_derives_from_preserved() {
        let seq = vec![tok("a"), tok(" "), tok("b"), Token::eof(Position::command_line())];
        assert_eq!(sanitize(&preserve(&seq)), sanitize(&seq));
    }

    #[test]
    fn find_subseq_leftmost() {
        let haystack = toks(&["a", "b", "a", "b"]);
        let needle = toks(&["a", "b"]);
        assert_eq!(find_subseq(&haystack, &needle, 0), Some((0, 2)));
        assert_eq!(find_subseq(&haystack, &needle, 1), Some((2, 4)));
        assert_eq!(find_subseq(&haystack, &needle, 3), None);
    }

    #[test]
    fn find_subseq_empty_needle() {
        let haystack = toks(&["a"]);
        assert_eq!(find_subseq(&haystack, &[], 1), Some((1, 1)));
    }

    #[test]
    fn find_subseq_from_past_end() {
        let haystack = toks(&["a"]);
        let needle = toks(&["a"]);
        assert_eq!(find_subseq(&haystack, &needle, 2), None);
    }

    #[test]
    fn find_subseq_no_match() {
        let haystack = toks(&["a", "b"]);
        let needle = toks(&["c"]);
        assert_eq!(find_subseq(&haystack, &needle, 0), None);
    }

    #[test]
    fn normalized_rendering() {
        let seq = toks(&["ADD", "(", "2", ",", " ", "3", ")"]);
        assert_eq!(write_tokens_normalized(&seq), "ADD (2, 3)");
    }

    #[test]
    fn normalized_spacing_between_words() {
        let seq = toks(&["a", " ", "+", " ", "b"]);
        assert_eq!(write_tokens_normalized(&seq), "a + b");
    }
}
