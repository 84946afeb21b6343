use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid number literal {literal:?}")]
    InvalidNumber { literal: String },

    #[error("empty path reference at offset {offset}")]
    EmptyPath { offset: usize },

    #[error("unexpected token {found:?}")]
    UnexpectedToken { found: String },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unbalanced parenthesis")]
    UnbalancedParen,

    #[error("empty expression")]
    Empty,
}
