//! Expression AST and path references.

use schema_form_json_pointer::{escape_segment, join, JsonPointerError};
use serde_json::Value;

/// Where a [`PathRef`] starts resolving from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Absolute: `/a/b` (or `#/a/b`) from the tree root.
    Root,
    /// `./a/b` from the evaluating node.
    Current,
    /// `../a` (`n` levels up) from the evaluating node.
    Parent(usize),
}

/// A node-path reference inside an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRef {
    pub anchor: Anchor,
    pub segments: Vec<String>,
}

impl PathRef {
    /// Renders the reference back to its source form (`./a/b`, `../x`, `/y`).
    pub fn reference(&self) -> String {
        let mut out = String::new();
        match &self.anchor {
            Anchor::Root => {}
            Anchor::Current => out.push('.'),
            Anchor::Parent(levels) => {
                out.push_str("..");
                for _ in 1..*levels {
                    out.push_str("/..");
                }
            }
        }
        for segment in &self.segments {
            out.push('/');
            out.push_str(&escape_segment(segment));
        }
        out
    }

    /// Resolves the reference against a base node path into an absolute
    /// canonical path.
    ///
    /// # Errors
    ///
    /// [`JsonPointerError::AboveRoot`] when a parent anchor escapes the root.
    pub fn resolve(&self, base: &str) -> Result<String, JsonPointerError> {
        join(base, &self.reference())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation of truthiness.
    Not,
    /// Numeric negation.
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// A parsed computed-directive expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(PathRef),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Collects every path reference in the expression, in source order,
    /// without duplicates.
    pub fn dependencies(&self) -> Vec<PathRef> {
        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }
}

fn collect(expr: &Expr, out: &mut Vec<PathRef>) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Path(path) => {
            if !out.contains(path) {
                out.push(path.clone());
            }
        }
        Expr::Unary { expr, .. } => collect(expr, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect(lhs, out);
            collect(rhs, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_roundtrip() {
        let current = PathRef {
            anchor: Anchor::Current,
            segments: vec!["type".into()],
        };
        assert_eq!(current.reference(), "./type");

        let up_two = PathRef {
            anchor: Anchor::Parent(2),
            segments: vec!["a".into(), "b".into()],
        };
        assert_eq!(up_two.reference(), "../../a/b");

        let root = PathRef {
            anchor: Anchor::Root,
            segments: vec!["user".into()],
        };
        assert_eq!(root.reference(), "/user");
    }

    #[test]
    fn resolve_against_base() {
        let up = PathRef {
            anchor: Anchor::Parent(1),
            segments: vec!["salary".into()],
        };
        assert_eq!(up.resolve("/employee/type").unwrap(), "/employee/salary");

        let current = PathRef {
            anchor: Anchor::Current,
            segments: vec!["kind".into()],
        };
        assert_eq!(current.resolve("/employee").unwrap(), "/employee/kind");

        assert!(up.resolve("").is_err());
    }

    #[test]
    fn dependency_dedup() {
        let path = PathRef {
            anchor: Anchor::Current,
            segments: vec!["x".into()],
        };
        let expr = Expr::Binary {
            op: BinaryOp::And,
            lhs: Box::new(Expr::Path(path.clone())),
            rhs: Box::new(Expr::Path(path.clone())),
        };
        assert_eq!(expr.dependencies(), vec![path]);
    }
}
