//! Tokenizer for algebra statements

use crate::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Dataset or function name, optionally `name@mapset`
    Name(String),
    /// Numeric literal, kept as written
    Number(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Assign,
    End,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Name(name) => f.write_str(name),
            TokenKind::Number(text) => f.write_str(text),
            TokenKind::Plus => f.write_str("+"),
            TokenKind::Minus => f.write_str("-"),
            TokenKind::Star => f.write_str("*"),
            TokenKind::Slash => f.write_str("/"),
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::LBracket => f.write_str("["),
            TokenKind::RBracket => f.write_str("]"),
            TokenKind::Comma => f.write_str(","),
            TokenKind::Assign => f.write_str("="),
            TokenKind::End => f.write_str("end of input"),
        }
    }
}

/// A token and the character position where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Split `input` into tokens, ending with [`TokenKind::End`]
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '=' => TokenKind::Assign,
            c if c.is_ascii_digit() || c == '.' => {
                pos = scan_number(&chars, pos)?;
                tokens.push(Token {
                    kind: TokenKind::Number(chars[start..pos].iter().collect()),
                    position: start,
                });
                continue;
            }
            c if is_name_start(c) => {
                pos = scan_name(&chars, pos)?;
                tokens.push(Token {
                    kind: TokenKind::Name(chars[start..pos].iter().collect()),
                    position: start,
                });
                continue;
            }
            other => {
                return Err(Error::syntax(
                    other.to_string(),
                    start,
                    "Unexpected character",
                ));
            }
        };
        tokens.push(Token {
            kind,
            position: start,
        });
        pos += 1;
    }

    tokens.push(Token {
        kind: TokenKind::End,
        position: chars.len(),
    });
    Ok(tokens)
}

fn scan_number(chars: &[char], start: usize) -> Result<usize> {
    let mut pos = start;
    let mut seen_digit = false;
    let mut seen_dot = false;
    while pos < chars.len() {
        match chars[pos] {
            c if c.is_ascii_digit() => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        pos += 1;
    }
    if !seen_digit {
        return Err(Error::syntax(".", start, "Expected a digit"));
    }

    // Optional exponent, e.g. 1e-3
    if pos < chars.len() && matches!(chars[pos], 'e' | 'E') {
        let mut exp = pos + 1;
        if exp < chars.len() && matches!(chars[exp], '+' | '-') {
            exp += 1;
        }
        let digits_start = exp;
        while exp < chars.len() && chars[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp == digits_start {
            let text: String = chars[start..exp].iter().collect();
            return Err(Error::syntax(text, start, "Malformed exponent"));
        }
        pos = exp;
    }

    if pos < chars.len() && is_name_start(chars[pos]) {
        let text: String = chars[start..=pos].iter().collect();
        return Err(Error::syntax(text, start, "Malformed number"));
    }
    Ok(pos)
}

fn scan_name(chars: &[char], start: usize) -> Result<usize> {
    let mut pos = start;
    while pos < chars.len() && is_name_char(chars[pos]) {
        pos += 1;
    }
    if pos < chars.len() && chars[pos] == '@' {
        let mapset_start = pos + 1;
        pos = mapset_start;
        while pos < chars.len() && is_name_char(chars[pos]) {
            pos += 1;
        }
        if pos == mapset_start {
            return Err(Error::syntax("@", mapset_start - 1, "Expected a mapset name after '@'"));
        }
    }
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_statement_tokens() {
        assert_eq!(
            kinds("D = A[-1] + 2.5"),
            vec![
                TokenKind::Name("D".into()),
                TokenKind::Assign,
                TokenKind::Name("A".into()),
                TokenKind::LBracket,
                TokenKind::Minus,
                TokenKind::Number("1".into()),
                TokenKind::RBracket,
                TokenKind::Plus,
                TokenKind::Number("2.5".into()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_qualified_names_and_exponents() {
        assert_eq!(
            kinds("temp.daily@climate*1e-3"),
            vec![
                TokenKind::Name("temp.daily@climate".into()),
                TokenKind::Star,
                TokenKind::Number("1e-3".into()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("  A +B").unwrap();
        assert_eq!(tokens[0].position, 2);
        assert_eq!(tokens[1].position, 4);
        assert_eq!(tokens[2].position, 5);
        assert_eq!(tokens[3].position, 6);
    }

    #[test]
    fn test_rejects_unknown_characters() {
        let err = tokenize("A + $B").unwrap_err();
        match err {
            Error::Syntax { token, position, .. } => {
                assert_eq!(token, "$");
                assert_eq!(position, 4);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(tokenize("A@").is_err());
        assert!(tokenize("3x").is_err());
        assert!(tokenize("1e+").is_err());
    }
}
