// src/core/lexer.rs
//! Lexer for AryanBlock source with line/column tracking and spanned errors.

use std::fmt;

use unicode_ident::{is_xid_continue, is_xid_start};
use unicode_normalization::UnicodeNormalization;

use crate::core::token::{Token, TokenKind, KEYWORDS};

/// Lexical errors are fatal: tokenization aborts and no partial token
/// stream is returned.
#[derive(Debug, Clone)]
pub enum LexerError {
    UnexpectedCharacter(char, usize, usize),
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexerError::UnexpectedCharacter(ch, line, col) => {
                write!(f, "Unknown character '{}' at {}:{}", ch, line, col)
            }
        }
    }
}

impl std::error::Error for LexerError {}

impl LexerError {
    pub fn position(&self) -> (usize, usize) {
        match self {
            LexerError::UnexpectedCharacter(_, line, col) => (*line, *col),
        }
    }
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        // NFC-normalize up front so identifier comparison is stable.
        let chars: Vec<char> = source.nfc().collect();
        Self { chars, pos: 0, line: 1, column: 1 }
    }

    #[inline]
    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        self.pos += 1;
        if ch == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), Some(' ') | Some('\t') | Some('\r')) {
            self.advance();
        }
    }

    // `//` runs to end of line; `/* */` stops at the first `*/` (nesting is
    // not detected). Reaching end of input inside a block comment is not an
    // error: the comment simply swallows the rest of the source.
    fn skip_comment(&mut self) {
        if self.current() == Some('/') && self.peek() == Some('/') {
            while let Some(ch) = self.current() {
                if ch == '\n' {
                    break;
                }
                self.advance();
            }
        } else if self.current() == Some('/') && self.peek() == Some('*') {
            self.advance();
            self.advance();
            while self.current().is_some() {
                if self.current() == Some('*') && self.peek() == Some('/') {
                    self.advance();
                    self.advance();
                    return;
                }
                self.advance();
            }
        }
    }

    fn read_string(&mut self) -> Token {
        let (line, col) = (self.line, self.column);
        self.advance(); // opening quote
        let mut value = String::new();
        while let Some(ch) = self.current() {
            if ch == '"' {
                break;
            }
            if ch == '\\' {
                self.advance();
                // Unrecognized escapes pass the following character through.
                let escaped = match self.current() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('\\') => '\\',
                    Some('"') => '"',
                    Some(other) => other,
                    None => break,
                };
                value.push(escaped);
            } else {
                value.push(ch);
            }
            self.advance();
        }
        self.advance(); // closing quote (no-op at end of input)
        Token::new(TokenKind::Str(value), line, col, 1)
    }

    fn read_number(&mut self) -> Token {
        let (line, col) = (self.line, self.column);
        let mut value = String::new();
        while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
            value.push(self.advance().unwrap());
        }
        // A `.` makes this a float only when immediately followed by a digit;
        // otherwise it is left for the `..` range operator or member access.
        if self.current() == Some('.') && matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            value.push(self.advance().unwrap());
            while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                value.push(self.advance().unwrap());
            }
            let parsed = value.parse::<f64>().unwrap_or(0.0);
            return Token::new(TokenKind::Float(parsed), line, col, value.len());
        }
        let parsed = value.parse::<i64>().unwrap_or(0);
        Token::new(TokenKind::Integer(parsed), line, col, value.len())
    }

    fn read_identifier(&mut self) -> Token {
        let (line, col) = (self.line, self.column);
        let mut value = String::new();
        while matches!(self.current(), Some(c) if is_identifier_part(c)) {
            value.push(self.advance().unwrap());
        }
        let length = value.chars().count();
        let kind = if let Some(kind) = KEYWORDS.get(value.as_str()) {
            kind.clone()
        } else if value == "true" {
            TokenKind::Boolean(true)
        } else if value == "false" {
            TokenKind::Boolean(false)
        } else {
            TokenKind::Identifier(value)
        };
        Token::new(kind, line, col, length)
    }

    fn read_operator(&mut self) -> Result<Token, LexerError> {
        use TokenKind::*;
        let (line, col) = (self.line, self.column);
        let c = self.current().unwrap();

        // Two-character maximal munch before single-character fallback.
        if let Some(next) = self.peek() {
            let two = match (c, next) {
                ('=', '=') => Some(Equal),
                ('!', '=') => Some(NotEqual),
                ('<', '=') => Some(LessEqual),
                ('>', '=') => Some(GreaterEqual),
                ('*', '*') => Some(Power),
                ('+', '=') => Some(PlusAssign),
                ('-', '=') => Some(MinusAssign),
                ('*', '=') => Some(MultAssign),
                ('/', '=') => Some(DivAssign),
                ('|', '>') => Some(Pipe),
                ('-', '>') => Some(Arrow),
                ('=', '>') => Some(FatArrow),
                ('.', '.') => Some(Range),
                ('?', '.') => Some(NullSafe),
                ('?', '?') => Some(NullCoalesce),
                _ => None,
            };
            if let Some(kind) = two {
                self.advance();
                self.advance();
                return Ok(Token::new(kind, line, col, 2));
            }
        }

        let one = match c {
            '+' => Some(Plus),
            '-' => Some(Minus),
            '*' => Some(Multiply),
            '/' => Some(Divide),
            '%' => Some(Modulo),
            '<' => Some(Less),
            '>' => Some(Greater),
            '=' => Some(Assign),
            '(' => Some(LParen),
            ')' => Some(RParen),
            '{' => Some(LBrace),
            '}' => Some(RBrace),
            '[' => Some(LBracket),
            ']' => Some(RBracket),
            ',' => Some(Comma),
            ':' => Some(Colon),
            ';' => Some(Semicolon),
            '.' => Some(Dot),
            '?' => Some(Question),
            _ => None,
        };
        match one {
            Some(kind) => {
                self.advance();
                Ok(Token::new(kind, line, col, 1))
            }
            None => Err(LexerError::UnexpectedCharacter(c, line, col)),
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        while self.current().is_some() {
            self.skip_whitespace();
            let ch = match self.current() {
                Some(ch) => ch,
                None => break,
            };
            if ch == '/' && matches!(self.peek(), Some('/') | Some('*')) {
                self.skip_comment();
                continue;
            }
            if ch == '\n' {
                self.advance();
                continue;
            }
            if ch == '"' {
                tokens.push(self.read_string());
            } else if ch.is_ascii_digit() {
                tokens.push(self.read_number());
            } else if is_identifier_start(ch) {
                tokens.push(self.read_identifier());
            } else {
                tokens.push(self.read_operator()?);
            }
        }
        tokens.push(Token::new(TokenKind::Eof, self.line, self.column, 0));
        Ok(tokens)
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch == '_' || is_xid_start(ch)
}

fn is_identifier_part(ch: char) -> bool {
    ch == '_' || is_xid_continue(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .expect("lexes")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn integers_and_floats() {
        assert_eq!(
            kinds("1 2.5 3"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Float(2.5),
                TokenKind::Integer(3),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn dot_without_digit_is_not_a_float() {
        // `0..3` must lex as integer, range, integer.
        assert_eq!(
            kinds("0..3"),
            vec![
                TokenKind::Integer(0),
                TokenKind::Range,
                TokenKind::Integer(3),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn true_false_lex_as_boolean_literals() {
        assert_eq!(
            kinds("true false"),
            vec![TokenKind::Boolean(true), TokenKind::Boolean(false), TokenKind::Eof]
        );
    }

    #[test]
    fn two_char_operators_take_precedence() {
        assert_eq!(
            kinds("a |> b ?? c ?. d"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Pipe,
                TokenKind::Identifier("b".into()),
                TokenKind::NullCoalesce,
                TokenKind::Identifier("c".into()),
                TokenKind::NullSafe,
                TokenKind::Identifier("d".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\tb\n\\\"""#),
            vec![TokenKind::Str("a\tb\n\\\"".into()), TokenKind::Eof]
        );
        // Unknown escape passes the character through.
        assert_eq!(kinds(r#""\q""#), vec![TokenKind::Str("q".into()), TokenKind::Eof]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 // trailing\n/* block\n comment */ 2"),
            vec![TokenKind::Integer(1), TokenKind::Integer(2), TokenKind::Eof]
        );
    }

    #[test]
    fn block_comment_ends_at_first_close() {
        // `/* a /* b */` terminates at the first `*/`; the rest is code.
        assert_eq!(
            kinds("/* a /* b */ 7"),
            vec![TokenKind::Integer(7), TokenKind::Eof]
        );
    }

    #[test]
    fn unknown_character_is_fatal() {
        let err = Lexer::new("let x = #").tokenize().unwrap_err();
        assert!(matches!(err, LexerError::UnexpectedCharacter('#', 1, 9)));
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = Lexer::new("let x\nlet y").tokenize().expect("lexes");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 1));
        assert_eq!((tokens[3].line, tokens[3].column), (2, 5));
    }

    #[test]
    fn literal_spans_reproduce_source() {
        // Non-whitespace, non-comment spans recombine to the original text.
        let source = "let total = count + 12";
        let tokens = Lexer::new(source).tokenize().expect("lexes");
        let rebuilt: Vec<String> = tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| {
                let start = t.column - 1;
                source[start..start + t.length].to_string()
            })
            .collect();
        assert_eq!(rebuilt.join(" "), source);
    }
}
