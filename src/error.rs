use thiserror::Error;

use crate::lexer::TokenKind;

#[derive(Debug, Error)]
pub enum LangError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Lexer(#[from] LexError),
    #[error(transparent)]
    Parser(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub type LangResult<T> = Result<T, LangError>;

pub type EvalResult<T> = Result<T, RuntimeError>;

/// Failures raised while turning source text into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("[Lexer] Error on line {line}: Unrecognized character '{character}' found in source")]
    UnrecognizedCharacter { character: char, line: usize },
    #[error("[Lexer] Error on line {line}: Unterminated string literal")]
    UnterminatedString { line: usize },
    #[error("[Lexer] Error on line {line}: Unsupported escape sequence '\\{sequence}'")]
    UnsupportedEscape { sequence: char, line: usize },
}

/// Structural failures. Every variant names the offending token's kind and line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("[Parser] Error on line {line}: Expected {expected}, found {found} '{value}'")]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        value: String,
        line: usize,
    },
    #[error("[Parser] Error on line {line}: Unexpected token {found} '{value}' found during parsing")]
    InvalidExpression {
        found: TokenKind,
        value: String,
        line: usize,
    },
    #[error("[Parser] Error on line {line}: Expected identifier inside function parameters, found {found}")]
    InvalidParameter { found: String, line: usize },
    #[error("[Parser] Error on line {line}: Cannot use dot operator without right hand side being an identifier, found {found}")]
    InvalidMemberProperty { found: String, line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("Cannot resolve '{name}' as it does not exist")]
    UndefinedVariable { name: String },
    #[error("Cannot declare variable '{name}' as it is already defined")]
    Redeclaration { name: String },
    #[error("Cannot reassign to variable '{name}' as it was declared constant")]
    ConstantReassignment { name: String },
    #[error("Invalid assignment target {target}")]
    InvalidAssignmentTarget { target: String },
    #[error("Cannot resolve property '{property}' as it does not exist")]
    UnresolvedMember { property: String },
    #[error("Cannot access property '{property}' on non-object value {found}")]
    NotAnObject { property: String, found: String },
    #[error("Computed property key must be a string or an integer, found {found}")]
    InvalidComputedKey { found: String },
    #[error("Invalid function call: {found} is not callable")]
    InvalidCallTarget { found: String },
    #[error("Native function '{name}' expects {expected} argument(s), found {found}")]
    NativeArity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Native function '{name}' failed: {message}")]
    Native { name: String, message: String },
}
