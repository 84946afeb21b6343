//! Computed-directive expression language for the form node tree.
//!
//! Directives (`visible`, `active`, `watch`, `if`) are small infix
//! expressions over node paths:
//!
//! ```text
//! ./type === 'full_time' && ../salary >= 1000
//! ```
//!
//! Paths are relative (`./`, `../`) or absolute (`/`, optional leading `#`)
//! and resolve against the evaluating node's location. Parsing is strict and
//! fallible; evaluation is total and side-effect-free, with JS-like
//! truthiness over JSON values.
//!
//! # Example
//!
//! ```
//! use schema_form_expression::{parse, evaluate_truthy, ValueScope};
//! use serde_json::json;
//!
//! let expr = parse("./type === 'full_time'").unwrap();
//! let doc = json!({"employee": {"type": "full_time"}});
//! let scope = ValueScope { doc: &doc, base: "/employee" };
//! assert!(evaluate_truthy(&expr, &scope));
//!
//! // Dependency extraction for change propagation.
//! let deps = expr.dependencies();
//! assert_eq!(deps[0].resolve("/employee").unwrap(), "/employee/type");
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod parser;
pub mod token;

pub use ast::{Anchor, BinaryOp, Expr, PathRef, UnaryOp};
pub use error::ExpressionError;
pub use eval::{evaluate, evaluate_truthy, truthy, PathScope, ValueScope};
pub use parser::parse;
