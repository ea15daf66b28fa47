//! Expression lexer
//!
//! Turns the source text found between `${{` and `}}` into a flat token stream.
//! The stream always ends with an [`TokenKind::Eof`] token carrying the end
//! position, so the parser never has to special-case running out of input.

use thiserror::Error;

use super::data::{parse_number, Value};

/// Inputs longer than this are rejected before scanning.
pub const MAX_EXPRESSION_LENGTH: usize = 21000;

/// Zero-based position of a token within the expression source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// The kind of a lexed token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    Dot,
    Comma,
    Star,
    Bang,
    BangEqual,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    And,
    Or,
    Number,
    String,
    Identifier,
    True,
    False,
    Null,
    Eof,
}

/// A single token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The raw source text of the token
    pub lexeme: String,
    /// Literal value for number, string and keyword tokens
    pub value: Option<Value>,
    pub position: Position,
}

/// Output of a successful lex
#[derive(Debug, Clone, PartialEq)]
pub struct LexResult {
    pub tokens: Vec<Token>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("Unexpected symbol: '{lexeme}'. Located at position {} within expression", .position.column + 1)]
    UnexpectedSymbol { lexeme: String, position: Position },

    #[error("Unterminated string literal. Located at position {} within expression", .position.column + 1)]
    UnterminatedString { position: Position },

    #[error("Exceeded max expression length {}", MAX_EXPRESSION_LENGTH)]
    ExceededMaxLength { length: usize },
}

impl LexError {
    pub fn position(&self) -> Option<Position> {
        match self {
            LexError::UnexpectedSymbol { position, .. } => Some(*position),
            LexError::UnterminatedString { position } => Some(*position),
            LexError::ExceededMaxLength { .. } => None,
        }
    }
}

/// Lex an expression into tokens.
pub fn lex(text: &str) -> Result<LexResult, LexError> {
    // A byte length within the limit guarantees a char count within the limit.
    if text.len() > MAX_EXPRESSION_LENGTH {
        let length = text.chars().count();
        if length > MAX_EXPRESSION_LENGTH {
            return Err(LexError::ExceededMaxLength { length });
        }
    }

    Lexer::new(text).lex()
}

struct Lexer {
    chars: Vec<char>,
    start: usize,
    current: usize,
    line: u32,
    line_start: usize,
    token_line: u32,
    token_column: u32,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            start: 0,
            current: 0,
            line: 0,
            line_start: 0,
            token_line: 0,
            token_column: 0,
            tokens: Vec::new(),
        }
    }

    fn lex(mut self) -> Result<LexResult, LexError> {
        while !self.at_end() {
            self.start = self.current;
            self.token_line = self.line;
            self.token_column = (self.start - self.line_start) as u32;

            let c = self.next();
            match c {
                '[' => self.add(TokenKind::LeftBracket, None),
                ']' => self.add(TokenKind::RightBracket, None),
                '(' => self.add(TokenKind::LeftParen, None),
                ')' => self.add(TokenKind::RightParen, None),
                ',' => self.add(TokenKind::Comma, None),
                '*' => self.add(TokenKind::Star, None),
                '.' => {
                    if self.dot_starts_number() {
                        self.consume_number()?;
                    } else {
                        self.add(TokenKind::Dot, None);
                    }
                }
                '-' => {
                    if self.peek().is_some_and(|p| p.is_ascii_digit() || p == '.') {
                        self.consume_number()?;
                    } else {
                        return Err(self.unexpected());
                    }
                }
                '!' => {
                    if self.matches('=') {
                        self.add(TokenKind::BangEqual, None);
                    } else {
                        self.add(TokenKind::Bang, None);
                    }
                }
                '=' => {
                    if self.matches('=') {
                        self.add(TokenKind::EqualEqual, None);
                    } else {
                        return Err(self.unexpected());
                    }
                }
                '<' => {
                    if self.matches('=') {
                        self.add(TokenKind::LessEqual, None);
                    } else {
                        self.add(TokenKind::Less, None);
                    }
                }
                '>' => {
                    if self.matches('=') {
                        self.add(TokenKind::GreaterEqual, None);
                    } else {
                        self.add(TokenKind::Greater, None);
                    }
                }
                '&' => {
                    if self.matches('&') {
                        self.add(TokenKind::And, None);
                    } else {
                        return Err(self.unexpected());
                    }
                }
                '|' => {
                    if self.matches('|') {
                        self.add(TokenKind::Or, None);
                    } else {
                        return Err(self.unexpected());
                    }
                }
                '\n' => {
                    self.line += 1;
                    self.line_start = self.current;
                }
                ' ' | '\r' | '\t' => {}
                '\'' => self.consume_string()?,
                c if c.is_ascii_digit() => self.consume_number()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.consume_identifier(),
                _ => return Err(self.unexpected()),
            }
        }

        self.start = self.current;
        self.token_line = self.line;
        self.token_column = (self.current - self.line_start) as u32;
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            value: None,
            position: self.token_position(),
        });

        Ok(LexResult {
            tokens: self.tokens,
        })
    }

    /// A dot begins a number (`.5`) unless it follows something that can be indexed.
    fn dot_starts_number(&self) -> bool {
        let follows_operand = matches!(
            self.tokens.last().map(|t| t.kind),
            Some(
                TokenKind::Identifier
                    | TokenKind::RightBracket
                    | TokenKind::RightParen
                    | TokenKind::Star
            )
        );
        !follows_operand && self.peek().is_some_and(|p| p.is_ascii_digit())
    }

    fn consume_number(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek() {
            if is_boundary(c) && c != '.' {
                break;
            }
            self.next();
        }

        let lexeme = self.lexeme();
        let value = parse_number(&lexeme);
        if value.is_nan() {
            return Err(LexError::UnexpectedSymbol {
                lexeme,
                position: self.token_position(),
            });
        }

        self.add(TokenKind::Number, Some(Value::Number(value)));
        Ok(())
    }

    fn consume_string(&mut self) -> Result<(), LexError> {
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(LexError::UnterminatedString {
                        position: self.token_position(),
                    })
                }
                Some('\'') => {
                    self.next();
                    // Doubled quote is an escaped quote
                    if self.peek() == Some('\'') {
                        self.next();
                        value.push('\'');
                    } else {
                        break;
                    }
                }
                Some(c) => {
                    self.next();
                    value.push(c);
                }
            }
        }

        self.add(TokenKind::String, Some(Value::String(value)));
        Ok(())
    }

    fn consume_identifier(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                self.next();
            } else {
                break;
            }
        }

        let lexeme = self.lexeme();
        match lexeme.as_str() {
            "true" => self.add(TokenKind::True, Some(Value::Boolean(true))),
            "false" => self.add(TokenKind::False, Some(Value::Boolean(false))),
            "null" => self.add(TokenKind::Null, Some(Value::Null)),
            "NaN" => self.add(TokenKind::Number, Some(Value::Number(f64::NAN))),
            "Infinity" => self.add(TokenKind::Number, Some(Value::Number(f64::INFINITY))),
            _ => self.add(TokenKind::Identifier, None),
        }
    }

    fn add(&mut self, kind: TokenKind, value: Option<Value>) {
        self.tokens.push(Token {
            kind,
            lexeme: self.lexeme(),
            value,
            position: self.token_position(),
        });
    }

    fn unexpected(&self) -> LexError {
        LexError::UnexpectedSymbol {
            lexeme: self.lexeme(),
            position: self.token_position(),
        }
    }

    fn token_position(&self) -> Position {
        Position {
            line: self.token_line,
            column: self.token_column,
        }
    }

    fn lexeme(&self) -> String {
        self.chars[self.start..self.current].iter().collect()
    }

    fn at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.current).copied()
    }

    fn next(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        c
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.current += 1;
            true
        } else {
            false
        }
    }
}

fn is_boundary(c: char) -> bool {
    matches!(
        c,
        '(' | '[' | ')' | ']' | ',' | '.' | '!' | '>' | '<' | '=' | '&' | '|'
    ) || c.is_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn kinds(text: &str) -> Vec<TokenKind> {
        lex(text)
            .expect("expression should lex")
            .tokens
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_lex_property_access() {
        assert_eq!(
            kinds("github.event.ref"),
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_lex_operators() {
        assert_eq!(
            kinds("a == b && c != d || !e <= f >= g < h > i"),
            vec![
                TokenKind::Identifier,
                TokenKind::EqualEqual,
                TokenKind::Identifier,
                TokenKind::And,
                TokenKind::Identifier,
                TokenKind::BangEqual,
                TokenKind::Identifier,
                TokenKind::Or,
                TokenKind::Bang,
                TokenKind::Identifier,
                TokenKind::LessEqual,
                TokenKind::Identifier,
                TokenKind::GreaterEqual,
                TokenKind::Identifier,
                TokenKind::Less,
                TokenKind::Identifier,
                TokenKind::Greater,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_lex_numbers() {
        let tokens = lex("1 -2.5 .5 1e3 0xff").unwrap().tokens;
        let values: Vec<_> = tokens.iter().filter_map(|t| t.value.clone()).collect();
        assert_eq!(
            values,
            vec![
                Value::Number(1.0),
                Value::Number(-2.5),
                Value::Number(0.5),
                Value::Number(1000.0),
                Value::Number(255.0)
            ]
        );
    }

    #[test]
    fn test_lex_dot_after_identifier_is_property() {
        assert_eq!(
            kinds("steps.1"),
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_lex_string_with_escaped_quote() {
        let tokens = lex("'it''s'").unwrap().tokens;
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].value, Some(Value::String("it's".to_string())));
        assert_eq!(tokens[0].lexeme, "'it''s'");
    }

    #[test]
    fn test_lex_keywords() {
        assert_eq!(
            kinds("true false null"),
            vec![
                TokenKind::True,
                TokenKind::False,
                TokenKind::Null,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_lex_identifier_with_dash() {
        let tokens = lex("steps.my-step.outputs").unwrap().tokens;
        assert_eq!(tokens[2].lexeme, "my-step");
    }

    #[test]
    fn test_eof_carries_end_position() {
        let tokens = lex("abc ").unwrap().tokens;
        let eof = tokens.last().unwrap();
        assert_eq!(eof.kind, TokenKind::Eof);
        assert_eq!(eof.position.column, 4);
    }

    #[test]
    fn test_unterminated_string() {
        assert_matches!(lex("'abc"), Err(LexError::UnterminatedString { .. }));
    }

    #[test]
    fn test_illegal_characters() {
        assert_matches!(
            lex("a & b"),
            Err(LexError::UnexpectedSymbol { ref lexeme, position }) if lexeme == "&" && position.column == 2
        );
        assert_matches!(lex("a = b"), Err(LexError::UnexpectedSymbol { .. }));
        assert_matches!(lex("a # b"), Err(LexError::UnexpectedSymbol { .. }));
        assert_matches!(lex("1abc"), Err(LexError::UnexpectedSymbol { .. }));
    }

    #[test]
    fn test_max_length() {
        let text = "a".repeat(MAX_EXPRESSION_LENGTH + 1);
        assert_matches!(lex(&text), Err(LexError::ExceededMaxLength { .. }));

        let text = "a".repeat(MAX_EXPRESSION_LENGTH);
        assert!(lex(&text).is_ok());
    }

    #[test]
    fn test_positions_across_lines() {
        let tokens = lex("a\n  b").unwrap().tokens;
        assert_eq!(tokens[1].position, Position { line: 1, column: 2 });
    }
}
