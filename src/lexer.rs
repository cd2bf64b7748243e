//! # Lexer
//!
//! Splits a line of source text into whitespace-separated tokens, with
//! two exceptions: `[` and `]` are self-delimiting tokens even when
//! glued to neighboring text, and a leading `'` on a token expands to a
//! surrounding bracket pair (`'foo` lexes identically to `[ foo ]`).
//!
//! A lone `'`, a doubled `''`, or a `'` immediately before `[`/`]` is a
//! syntax error — there is no token for it to quote.

use crate::error::LexError;

/// Lex `line` into a flat token stream. `[`/`]` always appear as their
/// own tokens; `'tok` is rewritten to the three tokens `[`, `tok`, `]`.
pub fn lex(line: &str) -> Result<Vec<String>, LexError> {
    let mut out = Vec::new();
    for word in split_brackets(line) {
        if word == "[" || word == "]" {
            out.push(word);
            continue;
        }
        if let Some(rest) = word.strip_prefix('\'') {
            if rest.is_empty() || rest == "[" || rest == "]" {
                return Err(LexError::DanglingTick);
            }
            out.push("[".to_string());
            out.push(rest.to_string());
            out.push("]".to_string());
            continue;
        }
        out.push(word);
    }
    Ok(out)
}

/// Split on whitespace, additionally splitting `[`/`]` out of a token
/// they're glued to (e.g. `[dup` -> `[`, `dup`; `dup]` -> `dup`, `]`).
fn split_brackets(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    for chunk in line.split_whitespace() {
        let mut rest = chunk;
        while let Some(stripped) = rest.strip_prefix('[') {
            out.push("[".to_string());
            rest = stripped;
        }
        let mut trailing_closes = 0;
        while let Some(stripped) = rest.strip_suffix(']') {
            trailing_closes += 1;
            rest = stripped;
        }
        if !rest.is_empty() {
            out.push(rest.to_string());
        }
        for _ in 0..trailing_closes {
            out.push("]".to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_plain_whitespace_separated_tokens() {
        assert_eq!(lex("11 output pinMode").unwrap(), vec!["11", "output", "pinMode"]);
    }

    #[test]
    fn tick_prefix_expands_to_a_bracket_pair() {
        assert_eq!(lex("'foo").unwrap(), vec!["[", "foo", "]"]);
    }

    #[test]
    fn brackets_are_self_delimiting_even_when_glued() {
        assert_eq!(lex("[dup *]").unwrap(), vec!["[", "dup", "*", "]"]);
    }

    #[test]
    fn nested_brackets_split_cleanly() {
        assert_eq!(
            lex("[ [ a ] b ]").unwrap(),
            vec!["[", "[", "a", "]", "b", "]"]
        );
    }

    #[test]
    fn dangling_tick_is_a_syntax_error() {
        assert!(lex("'").is_err());
        assert!(lex("''").is_err());
        assert!(lex("'[").is_err());
        assert!(lex("']").is_err());
    }

    #[test]
    fn lex_join_round_trips_plain_token_lists() {
        let tokens = vec!["foo".to_string(), "bar".to_string(), "42".to_string()];
        let joined = tokens.join(" ");
        assert_eq!(lex(&joined).unwrap(), tokens);
    }
}
