use std::{fmt, str::Chars};

use log::trace;

use crate::error::LexError;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: String,
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    fn new(value: impl Into<String>, kind: TokenKind, line: usize) -> Self {
        Self {
            value: value.into(),
            kind,
            line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Number,
    Identifier,
    String,

    // Keywords
    Var,
    Const,
    Func,
    Async,
    Array,
    If,
    Else,
    Elif,
    Then,
    While,
    For,
    Return,
    Pull,

    // Operators
    BinaryOperator,
    Equals,
    EqualTo,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    And,
    Or,
    PlusEqual,
    MinusEqual,
    Null,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    Comma,
    Colon,
    Semicolon,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "have" => TokenKind::Var,
        "const" => TokenKind::Const,
        "func" => TokenKind::Func,
        "async" => TokenKind::Async,
        "array" => TokenKind::Array,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "elif" => TokenKind::Elif,
        "then" => TokenKind::Then,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "return" => TokenKind::Return,
        "pull" => TokenKind::Pull,
        _ => return None,
    };
    Some(kind)
}

/// Tokenizes `source`, always ending the sequence with exactly one `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).lex()
}

pub struct Lexer<'a> {
    chars: Chars<'a>,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars(),
            line: 1,
        }
    }

    pub fn lex(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens: Vec<Token> = Vec::new();

        while let Some(ch) = self.peek_char() {
            if matches!(ch, ' ' | '\n' | '\t' | '\r') {
                self.advance_char();
                continue;
            }

            if ch == '/' && self.peek_next_char() == Some('*') {
                self.consume_block_comment();
                continue;
            }

            if ch == '#' {
                self.consume_line_comment();
                continue;
            }

            let line = self.line;
            let token = match ch {
                '"' => self.read_string()?,
                '0'..='9' => self.read_number(),
                c if c.is_alphabetic() || c == '_' => self.read_identifier(),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                '.' => self.single(TokenKind::Dot),
                ',' => self.single(TokenKind::Comma),
                ';' => self.single(TokenKind::Semicolon),
                '?' => self.single(TokenKind::Null),
                ':' => {
                    self.advance_char();
                    // Only meaningful after a name (`x := 1`, `{ key: v }`, `have x : t`).
                    match tokens.last() {
                        Some(prev) if prev.kind == TokenKind::Identifier => {
                            Token::new(":", TokenKind::Colon, line)
                        }
                        _ => continue,
                    }
                }
                '<' => self.one_or_two('=', TokenKind::LessThan, TokenKind::LessThanOrEqual),
                '>' => {
                    self.one_or_two('=', TokenKind::GreaterThan, TokenKind::GreaterThanOrEqual)
                }
                '=' => self.one_or_two('=', TokenKind::Equals, TokenKind::EqualTo),
                '+' => self.one_or_two('=', TokenKind::BinaryOperator, TokenKind::PlusEqual),
                '-' => self.one_or_two('=', TokenKind::BinaryOperator, TokenKind::MinusEqual),
                '*' | '/' | '%' => self.single(TokenKind::BinaryOperator),
                '!' => self.pair('=', TokenKind::NotEqual)?,
                '&' => self.pair('&', TokenKind::And)?,
                '|' => self.pair('|', TokenKind::Or)?,
                other => {
                    return Err(LexError::UnrecognizedCharacter {
                        character: other,
                        line,
                    })
                }
            };

            tokens.push(token);
        }

        tokens.push(Token::new("EndOfFile", TokenKind::Eof, self.line));
        trace!("lexed {} tokens over {} line(s)", tokens.len(), self.line);

        Ok(tokens)
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let line = self.line;
        let ch = self.advance_char().unwrap_or_default();
        Token::new(ch.to_string(), kind, line)
    }

    fn one_or_two(&mut self, second: char, one: TokenKind, two: TokenKind) -> Token {
        let line = self.line;
        let mut value = String::new();
        value.extend(self.advance_char());
        if self.peek_char() == Some(second) {
            value.extend(self.advance_char());
            Token::new(value, two, line)
        } else {
            Token::new(value, one, line)
        }
    }

    /// Two-character operators whose first character is meaningless on its own.
    fn pair(&mut self, second: char, kind: TokenKind) -> Result<Token, LexError> {
        let line = self.line;
        let first = self.advance_char().unwrap_or_default();
        if self.peek_char() != Some(second) {
            return Err(LexError::UnrecognizedCharacter {
                character: first,
                line,
            });
        }
        self.advance_char();
        Ok(Token::new(format!("{first}{second}"), kind, line))
    }

    fn consume_line_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.advance_char();
        }
    }

    // An unterminated block comment swallows the rest of the input.
    fn consume_block_comment(&mut self) {
        self.advance_char();
        self.advance_char();
        while let Some(ch) = self.advance_char() {
            if ch == '*' && self.peek_char() == Some('/') {
                self.advance_char();
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        let line = self.line;
        let mut ident = String::new();

        while let Some(ch) = self.peek_char() {
            if ch.is_alphabetic() || ch.is_ascii_digit() || ch == '_' {
                ident.push(ch);
                self.advance_char();
            } else {
                break;
            }
        }

        let kind = keyword(&ident).unwrap_or(TokenKind::Identifier);
        Token::new(ident, kind, line)
    }

    fn read_number(&mut self) -> Token {
        let line = self.line;
        let mut number = String::new();

        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance_char();
            } else {
                break;
            }
        }

        Token::new(number, TokenKind::Number, line)
    }

    fn read_string(&mut self) -> Result<Token, LexError> {
        let line = self.line;
        self.advance_char(); // opening quote
        let mut content = String::new();

        while let Some(ch) = self.advance_char() {
            match ch {
                '"' => return Ok(Token::new(content, TokenKind::String, line)),
                '\\' => {
                    let escaped = match self.advance_char() {
                        Some('"') => '"',
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some(other) => {
                            return Err(LexError::UnsupportedEscape {
                                sequence: other,
                                line: self.line,
                            })
                        }
                        None => break,
                    };
                    content.push(escaped);
                }
                _ => content.push(ch),
            }
        }

        Err(LexError::UnterminatedString { line })
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn peek_next_char(&self) -> Option<char> {
        self.chars.clone().nth(1)
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.chars.next();
        if ch == Some('\n') {
            self.line += 1;
        }
        ch
    }
}
