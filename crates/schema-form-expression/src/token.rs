//! Lexer for the computed-directive expression language.

use crate::ast::{Anchor, PathRef};
use crate::error::ExpressionError;
use schema_form_json_pointer::unescape_segment;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Path(PathRef),
    LParen,
    RParen,
    Not,
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

impl Token {
    /// Whether this token ends an operand. Decides if a following `/` is a
    /// division operator or the start of an absolute path reference.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::Number(_)
                | Token::Str(_)
                | Token::Bool(_)
                | Token::Null
                | Token::Path(_)
                | Token::RParen
        )
    }
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '~' | '$' | '@')
}

/// Tokenizes an expression source string.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    tokens.push(Token::And);
                    i += 2;
                } else {
                    return Err(ExpressionError::UnexpectedChar { found: c, offset: i });
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    tokens.push(Token::Or);
                    i += 2;
                } else {
                    return Err(ExpressionError::UnexpectedChar { found: c, offset: i });
                }
            }
            '=' => {
                // `==` and `===` compare identically (JSON values carry no
                // coercion worth distinguishing).
                if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                    if chars.get(i) == Some(&'=') {
                        i += 1;
                    }
                    tokens.push(Token::Eq);
                } else {
                    return Err(ExpressionError::UnexpectedChar { found: c, offset: i });
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                    if chars.get(i) == Some(&'=') {
                        i += 1;
                    }
                    tokens.push(Token::Ne);
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let (token, next) = lex_string(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            '0'..='9' => {
                let (token, next) = lex_number(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            '/' => {
                if tokens.last().is_some_and(Token::ends_operand) {
                    tokens.push(Token::Slash);
                    i += 1;
                } else {
                    let (token, next) = lex_path(&chars, i)?;
                    tokens.push(token);
                    i = next;
                }
            }
            '#' => {
                let (token, next) = lex_path(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            '.' => {
                let (token, next) = lex_path(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "true" => tokens.push(Token::Bool(true)),
                    "false" => tokens.push(Token::Bool(false)),
                    // `undefined` folds into null: JSON carries no separate
                    // missing-value marker.
                    "null" | "undefined" => tokens.push(Token::Null),
                    _ => return Err(ExpressionError::UnexpectedToken { found: word }),
                }
            }
            other => return Err(ExpressionError::UnexpectedChar { found: other, offset: i }),
        }
    }

    Ok(tokens)
}

fn lex_string(chars: &[char], start: usize) -> Result<(Token, usize), ExpressionError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or(ExpressionError::UnterminatedString { offset: start })?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((Token::Str(out), i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(ExpressionError::UnterminatedString { offset: start })
}

fn lex_number(chars: &[char], start: usize) -> Result<(Token, usize), ExpressionError> {
    let mut i = start;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(char::is_ascii_digit) {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    let literal: String = chars[start..i].iter().collect();
    let value: f64 = literal
        .parse()
        .map_err(|_| ExpressionError::InvalidNumber { literal: literal.clone() })?;
    Ok((Token::Number(value), i))
}

/// Lexes a path reference starting at `/`, `#`, `.` or `..`.
fn lex_path(chars: &[char], start: usize) -> Result<(Token, usize), ExpressionError> {
    let mut i = start;
    let anchor_is_relative = match chars[i] {
        '#' => {
            i += 1;
            false
        }
        '/' => false,
        '.' => true,
        _ => return Err(ExpressionError::EmptyPath { offset: start }),
    };

    // Raw slash-separated steps; `.` and `..` steps fold into the anchor.
    let mut levels: usize = 0;
    let mut current_anchor = false;
    let mut segments: Vec<String> = Vec::new();

    if anchor_is_relative {
        // Consume the leading `.` / `..` step without a preceding slash.
        if chars.get(i + 1) == Some(&'.') {
            levels = 1;
            i += 2;
        } else {
            current_anchor = true;
            i += 1;
        }
        if i < chars.len() && chars[i] != '/' {
            return Err(ExpressionError::EmptyPath { offset: start });
        }
    }

    while chars.get(i) == Some(&'/') {
        i += 1;
        let seg_start = i;
        while i < chars.len() && (is_segment_char(chars[i]) || chars[i] == '.') {
            i += 1;
        }
        let raw: String = chars[seg_start..i].iter().collect();
        match raw.as_str() {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    if current_anchor {
                        current_anchor = false;
                    }
                    levels += 1;
                }
            }
            _ => {
                // Dots are step separators, not segment characters.
                if raw.contains('.') {
                    return Err(ExpressionError::UnexpectedToken { found: raw });
                }
                segments.push(unescape_segment(&raw));
            }
        }
    }

    let anchor = if !anchor_is_relative && levels == 0 && !current_anchor {
        Anchor::Root
    } else if levels > 0 {
        Anchor::Parent(levels)
    } else {
        Anchor::Current
    };

    Ok((Token::Path(PathRef { anchor, segments }), i))
}
