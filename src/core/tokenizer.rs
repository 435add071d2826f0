//! Formula tokenizer
//!
//! Converts FormatScript text like `IF(@currentField > 10, "big", "small")`
//! into a sequence of located tokens that can be parsed into an AST.
//! `@`-prefixed field references are first-class tokens, so the grammar
//! never needs placeholder identifiers for them.

use crate::diagnostics::{Location, Position};
use std::iter::Peekable;
use std::str::Chars;

/// Kind of a formula token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A numeric literal (e.g., 123, 45.67, .5, 1.5e10, 0xFF)
    Number(f64),
    /// A string literal (e.g., "hello" or 'world'), escapes already resolved
    Text(String),
    /// `true` or `false`
    Boolean(bool),
    /// Function name or bare identifier
    Identifier(String),
    /// Field reference root including its `@` (e.g., `@currentField`)
    Field(String),
    /// Binary/logical operators: + - * / % & && | || < <= > >= == != === !== !
    Operator(String),
    OpenParen,
    CloseParen,
    Comma,
    /// Member access
    Dot,
    Question,
    Colon,
    /// Statement separator
    Semicolon,
}

/// A token and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

/// Error during tokenization
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizeError {
    pub message: String,
    pub location: Location,
}

impl TokenizeError {
    fn new(message: impl Into<String>, start: Position, end: Position) -> Self {
        Self {
            message: message.into(),
            location: Location::new(start, end),
        }
    }
}

impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tokenize error at {}: {}",
            self.location.start, self.message
        )
    }
}

impl std::error::Error for TokenizeError {}

/// Tokenizer for formula expressions
pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
    column: u32,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer for the given formula string
    pub fn new(formula: &'a str) -> Self {
        Self {
            chars: formula.chars().peekable(),
            line: 1,
            column: 0,
        }
    }

    /// Tokenize the entire formula into a vector of tokens
    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizeError> {
        let mut tokens = Vec::new();

        // Excel habit: a single leading '=' marks a formula and is ignored
        self.skip_trivia()?;
        if self.peek() == Some('=') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if lookahead.peek() != Some(&'=') {
                self.advance();
            }
        }

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Get the next token, or None if at end of input
    fn next_token(&mut self) -> Result<Option<Token>, TokenizeError> {
        self.skip_trivia()?;

        let start = self.position();
        let c = match self.peek() {
            None => return Ok(None),
            Some(c) => c,
        };

        let kind = match c {
            // String literals
            '"' | '\'' => self.read_string()?,

            '(' => self.single(TokenKind::OpenParen),
            ')' => self.single(TokenKind::CloseParen),
            ',' => self.single(TokenKind::Comma),
            '?' => self.single(TokenKind::Question),
            ':' => self.single(TokenKind::Colon),
            ';' => self.single(TokenKind::Semicolon),

            // Leading-dot fraction or member access
            '.' => {
                if self.peek_second().is_some_and(|n| n.is_ascii_digit()) {
                    self.read_number()?
                } else {
                    self.single(TokenKind::Dot)
                }
            }

            '+' | '-' | '*' | '/' | '%' => {
                self.advance();
                TokenKind::Operator(c.to_string())
            }

            '&' => self.read_doubled('&'),
            '|' => self.read_doubled('|'),
            '<' | '>' => self.read_relational(c),
            '=' => self.read_equals()?,
            '!' => self.read_bang(),

            '@' => self.read_field()?,

            c if c.is_ascii_digit() => self.read_number()?,

            c if is_identifier_start(c) => self.read_identifier(),

            c => {
                self.advance();
                return Err(TokenizeError::new(
                    format!("Unexpected character: '{}'", c),
                    start,
                    self.position(),
                ));
            }
        };

        Ok(Some(Token {
            kind,
            location: Location::new(start, self.position()),
        }))
    }

    /// Peek at the next character without consuming it
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Peek one character past the next
    fn peek_second(&self) -> Option<char> {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        lookahead.next()
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        match c {
            Some('\n') => {
                self.line += 1;
                self.column = 0;
            }
            Some(_) => self.column += 1,
            None => {}
        }
        c
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Skip whitespace and `//` / `/* */` comments
    fn skip_trivia(&mut self) -> Result<(), TokenizeError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    let start = self.position();
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            None => {
                                return Err(TokenizeError::new(
                                    "Unterminated comment",
                                    start,
                                    self.position(),
                                ));
                            }
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Read a string literal (double or single quoted, backslash escapes)
    fn read_string(&mut self) -> Result<TokenKind, TokenizeError> {
        let start = self.position();
        let quote = self.advance().unwrap_or('"');
        let mut value = String::new();

        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(TokenizeError::new(
                        "Unterminated string literal",
                        start,
                        self.position(),
                    ));
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    value.push(self.read_escape(start)?);
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        Ok(TokenKind::Text(value))
    }

    /// Resolve the character after a backslash
    fn read_escape(&mut self, string_start: Position) -> Result<char, TokenizeError> {
        let escape_start = self.position();
        let c = match self.advance() {
            Some(c) => c,
            None => {
                return Err(TokenizeError::new(
                    "Unterminated string literal",
                    string_start,
                    self.position(),
                ));
            }
        };

        let resolved = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' => '\0',
            'x' => self.read_hex_escape(2, escape_start)?,
            'u' => self.read_hex_escape(4, escape_start)?,
            // \\ \" \' and any other escaped character stand for themselves
            other => other,
        };
        Ok(resolved)
    }

    fn read_hex_escape(&mut self, digits: usize, start: Position) -> Result<char, TokenizeError> {
        let mut hex = String::with_capacity(digits);
        for _ in 0..digits {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    self.advance();
                    hex.push(c);
                }
                _ => {
                    return Err(TokenizeError::new(
                        "Invalid escape sequence",
                        start,
                        self.position(),
                    ));
                }
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| TokenizeError::new("Invalid escape sequence", start, self.position()))
    }

    /// Read a number (integer, decimal, scientific notation or hex)
    fn read_number(&mut self) -> Result<TokenKind, TokenizeError> {
        let start = self.position();
        let mut num_str = String::new();

        if self.peek() == Some('0') && matches!(self.peek_second(), Some('x' | 'X')) {
            self.advance();
            self.advance();
            let mut hex = String::new();
            while let Some(c) = self.peek().filter(|c| c.is_ascii_hexdigit()) {
                self.advance();
                hex.push(c);
            }
            self.reject_trailing_identifier(start, "0x")?;
            return u64::from_str_radix(&hex, 16)
                .map(|n| TokenKind::Number(n as f64))
                .map_err(|_| {
                    TokenizeError::new(format!("Invalid number: 0x{}", hex), start, self.position())
                });
        }

        self.read_digits(&mut num_str);

        // Decimal part
        if self.peek() == Some('.') {
            num_str.push('.');
            self.advance();
            self.read_digits(&mut num_str);
        }

        // Exponent part (e.g., 1.5e10, 2E-5)
        if let Some(e @ ('e' | 'E')) = self.peek() {
            num_str.push(e);
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                num_str.push(sign);
                self.advance();
            }
            self.read_digits(&mut num_str);
        }

        self.reject_trailing_identifier(start, &num_str)?;

        num_str.parse::<f64>().map(TokenKind::Number).map_err(|_| {
            TokenizeError::new(format!("Invalid number: {}", num_str), start, self.position())
        })
    }

    fn read_digits(&mut self, into: &mut String) {
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
            self.advance();
            into.push(c);
        }
    }

    /// `12abc` is neither a number nor an identifier
    fn reject_trailing_identifier(&mut self, start: Position, text: &str) -> Result<(), TokenizeError> {
        match self.peek() {
            Some(c) if is_identifier_part(c) => {
                self.advance();
                Err(TokenizeError::new(
                    format!("Invalid number: {}{}", text, c),
                    start,
                    self.position(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Read an identifier; `true`/`false` become booleans
    fn read_identifier(&mut self) -> TokenKind {
        let ident = self.read_identifier_text();
        match ident.as_str() {
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            _ => TokenKind::Identifier(ident),
        }
    }

    fn read_identifier_text(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek().filter(|c| is_identifier_part(*c)) {
            self.advance();
            ident.push(c);
        }
        ident
    }

    /// Read `@name`
    fn read_field(&mut self) -> Result<TokenKind, TokenizeError> {
        let start = self.position();
        self.advance(); // consume '@'

        match self.peek() {
            Some(c) if is_identifier_start(c) => {
                Ok(TokenKind::Field(format!("@{}", self.read_identifier_text())))
            }
            _ => Err(TokenizeError::new(
                "Unexpected character: '@'",
                start,
                self.position(),
            )),
        }
    }

    /// `&` / `&&`, `|` / `||`
    fn read_doubled(&mut self, c: char) -> TokenKind {
        self.advance();
        if self.peek() == Some(c) {
            self.advance();
            TokenKind::Operator(format!("{}{}", c, c))
        } else {
            TokenKind::Operator(c.to_string())
        }
    }

    /// `<`, `<=`, `>`, `>=`
    fn read_relational(&mut self, c: char) -> TokenKind {
        self.advance();
        if self.peek() == Some('=') {
            self.advance();
            TokenKind::Operator(format!("{}=", c))
        } else {
            TokenKind::Operator(c.to_string())
        }
    }

    /// `==` or `===`; a lone `=` is an assignment and has no meaning here
    fn read_equals(&mut self) -> Result<TokenKind, TokenizeError> {
        let start = self.position();
        self.advance();
        if self.peek() != Some('=') {
            return Err(TokenizeError::new(
                "Unexpected character: '=' (use '==' to compare values)",
                start,
                self.position(),
            ));
        }
        self.advance();
        if self.peek() == Some('=') {
            self.advance();
            return Ok(TokenKind::Operator("===".to_string()));
        }
        Ok(TokenKind::Operator("==".to_string()))
    }

    /// `!`, `!=`, `!==`
    fn read_bang(&mut self) -> TokenKind {
        self.advance();
        if self.peek() != Some('=') {
            return TokenKind::Operator("!".to_string());
        }
        self.advance();
        if self.peek() == Some('=') {
            self.advance();
            return TokenKind::Operator("!==".to_string());
        }
        TokenKind::Operator("!=".to_string())
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Convenience function to tokenize a formula string
pub fn tokenize(formula: &str) -> Result<Vec<Token>, TokenizeError> {
    Tokenizer::new(formula).tokenize()
}
