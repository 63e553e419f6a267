//! Command Line Tokenizer
//!
//! Splits a request payload into at most [`MAX_TOKENS`] tokens. The verb, key
//! and length never contain whitespace, but the value may, so splitting stops
//! once three tokens have been produced and the remainder of the payload is
//! kept verbatim as the fourth.
//!
//! ```text
//! "create 5 11 hello world"  ->  ["create", "5", "11", "hello world"]
//! "read   5"                 ->  ["read", "5"]
//! ""                         ->  [""]
//! ```
//!
//! Tokens are `Bytes` slices of the payload, so no bytes are copied.

use bytes::Bytes;

/// Maximum number of tokens in a command line.
pub const MAX_TOKENS: usize = 4;

#[inline]
fn is_separator(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n')
}

/// Splits `line` into between one and [`MAX_TOKENS`] tokens.
///
/// While fewer than `MAX_TOKENS - 1` tokens exist, runs of separators are
/// collapsed and dropped. After that, every remaining byte (separators
/// included) belongs to the last token. The last token is always emitted,
/// even when empty.
pub fn tokenize(line: &Bytes) -> Vec<Bytes> {
    let mut tokens = Vec::with_capacity(MAX_TOKENS);
    let mut start = 0;
    let mut in_token = false;

    for (i, &b) in line.iter().enumerate() {
        if tokens.len() >= MAX_TOKENS - 1 {
            break;
        }

        if is_separator(b) {
            if in_token {
                tokens.push(line.slice(start..i));
                in_token = false;
            }
            start = i + 1;
        } else if !in_token {
            start = i;
            in_token = true;
        }
    }

    tokens.push(line.slice(start.min(line.len())..));
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(s: &[u8]) -> Vec<Bytes> {
        tokenize(&Bytes::copy_from_slice(s))
    }

    fn strs(tokens: &[Bytes]) -> Vec<String> {
        tokens
            .iter()
            .map(|t| String::from_utf8_lossy(t).into_owned())
            .collect()
    }

    #[test]
    fn test_simple_command() {
        let tokens = tok(b"read 5");
        assert_eq!(strs(&tokens), vec!["read", "5"]);
    }

    #[test]
    fn test_full_command() {
        let tokens = tok(b"create 5 3 abc");
        assert_eq!(strs(&tokens), vec!["create", "5", "3", "abc"]);
    }

    #[test]
    fn test_value_keeps_whitespace() {
        let tokens = tok(b"create 5 11 hello\tbig world");
        assert_eq!(tokens.len(), 4);
        assert_eq!(&tokens[3][..], b"hello\tbig world");
    }

    #[test]
    fn test_value_keeps_trailing_newline() {
        let tokens = tok(b"update 5 4 xyz\n");
        assert_eq!(&tokens[3][..], b"xyz\n");
    }

    #[test]
    fn test_separator_runs_collapse() {
        let tokens = tok(b"  delete \t\n 12");
        assert_eq!(strs(&tokens), vec!["delete", "12"]);
    }

    #[test]
    fn test_separators_after_third_token_are_kept() {
        let tokens = tok(b"create 1 2   ab");
        assert_eq!(&tokens[3][..], b"  ab");
    }

    #[test]
    fn test_trailing_separator_yields_empty_token() {
        let tokens = tok(b"read 5\n");
        assert_eq!(strs(&tokens), vec!["read", "5", ""]);
    }

    #[test]
    fn test_empty_line() {
        let tokens = tok(b"");
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_empty());

        let tokens = tok(b"   ");
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_empty());
    }

    #[test]
    fn test_binary_value() {
        let tokens = tok(b"create 1 4 \x00\xff \x01");
        assert_eq!(&tokens[3][..], b"\x00\xff \x01");
    }

    #[test]
    fn test_never_more_than_four_tokens() {
        let tokens = tok(b"a b c d e f g");
        assert_eq!(tokens.len(), MAX_TOKENS);
        assert_eq!(&tokens[3][..], b"d e f g");
    }
}
