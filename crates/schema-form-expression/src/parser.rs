//! Pratt parser for the expression token stream.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::ExpressionError;
use crate::token::{tokenize, Token};
use serde_json::json;
use serde_json::Value;

/// Parses an expression source string into an [`Expr`].
///
/// # Errors
///
/// Any lexical or structural defect surfaces as [`ExpressionError`]; the
/// caller decides how to degrade (directives fall back to their inactive
/// default).
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression(0)?;
    if parser.pos != parser.tokens.len() {
        return Err(ExpressionError::UnexpectedToken {
            found: format!("{:?}", parser.tokens[parser.pos]),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn binding_power(token: &Token) -> Option<(BinaryOp, u8)> {
    Some(match token {
        Token::Or => (BinaryOp::Or, 1),
        Token::And => (BinaryOp::And, 2),
        Token::Eq => (BinaryOp::Eq, 3),
        Token::Ne => (BinaryOp::Ne, 3),
        Token::Lt => (BinaryOp::Lt, 4),
        Token::Le => (BinaryOp::Le, 4),
        Token::Gt => (BinaryOp::Gt, 4),
        Token::Ge => (BinaryOp::Ge, 4),
        Token::Plus => (BinaryOp::Add, 5),
        Token::Minus => (BinaryOp::Sub, 5),
        Token::Star => (BinaryOp::Mul, 6),
        Token::Slash => (BinaryOp::Div, 6),
        Token::Percent => (BinaryOp::Rem, 6),
        _ => return None,
    })
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, ExpressionError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExpressionError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expression(&mut self, min_bp: u8) -> Result<Expr, ExpressionError> {
        let mut lhs = self.prefix()?;
        while let Some((op, bp)) = self.peek().and_then(binding_power) {
            if bp <= min_bp {
                break;
            }
            self.pos += 1;
            // Left-associative: parse the right side at this operator's power.
            let rhs = self.expression(bp)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, ExpressionError> {
        match self.next()? {
            Token::Number(n) => Ok(Expr::Literal(json!(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Bool(b) => Ok(Expr::Literal(Value::Bool(b))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Path(p) => Ok(Expr::Path(p)),
            Token::Not => Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(self.prefix()?),
            }),
            Token::Minus => Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(self.prefix()?),
            }),
            Token::LParen => {
                let inner = self.expression(0)?;
                match self.next() {
                    Ok(Token::RParen) => Ok(inner),
                    _ => Err(ExpressionError::UnbalancedParen),
                }
            }
            other => Err(ExpressionError::UnexpectedToken {
                found: format!("{other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Anchor, PathRef};

    fn path(anchor: Anchor, segments: &[&str]) -> Expr {
        Expr::Path(PathRef {
            anchor,
            segments: segments.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn precedence() {
        // 1 + 2 * 3 groups the product first.
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expr::Literal(json!(1.0))),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: Box::new(Expr::Literal(json!(2.0))),
                    rhs: Box::new(Expr::Literal(json!(3.0))),
                }),
            }
        );
    }

    #[test]
    fn logic_over_comparison() {
        let expr = parse("./a == 1 && ./b > 2").unwrap();
        let Expr::Binary { op: BinaryOp::And, lhs, rhs } = expr else {
            panic!("expected && at the top");
        };
        assert!(matches!(*lhs, Expr::Binary { op: BinaryOp::Eq, .. }));
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Gt, .. }));
    }

    #[test]
    fn unary_and_parens() {
        let expr = parse("!(./done) && -2 < 0").unwrap();
        let Expr::Binary { op: BinaryOp::And, lhs, .. } = expr else {
            panic!("expected &&");
        };
        assert_eq!(
            *lhs,
            Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(path(Anchor::Current, &["done"])),
            }
        );
    }

    #[test]
    fn left_associative_subtraction() {
        let expr = parse("5 - 2 - 1").unwrap();
        let Expr::Binary { op: BinaryOp::Sub, lhs, rhs } = expr else {
            panic!("expected -");
        };
        assert!(matches!(*lhs, Expr::Binary { op: BinaryOp::Sub, .. }));
        assert_eq!(*rhs, Expr::Literal(json!(1.0)));
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(parse("").unwrap_err(), ExpressionError::Empty);
        assert!(parse("1 +").is_err());
        assert!(parse("(1").is_err());
        assert!(parse("1 2").is_err());
    }
}
