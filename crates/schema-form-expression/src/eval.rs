//! Expression evaluation.
//!
//! Evaluation is total: a well-formed [`Expr`] always produces a value for a
//! given scope snapshot, with JS-like truthiness and `null` standing in for
//! both JSON null and a missing path. All side effects live in the caller;
//! the scope is read-only.

use crate::ast::{BinaryOp, Expr, PathRef, UnaryOp};
use serde_json::{json, Value};

/// Read-only resolver for path references.
///
/// Implementations resolve against the *enhanced value* of the evaluating
/// node; a missing location returns `None`.
pub trait PathScope {
    fn resolve(&self, path: &PathRef) -> Option<Value>;
}

/// A scope over a plain JSON document with a fixed base path. Useful in
/// tests and for standalone evaluation.
pub struct ValueScope<'a> {
    pub doc: &'a Value,
    pub base: &'a str,
}

impl PathScope for ValueScope<'_> {
    fn resolve(&self, path: &PathRef) -> Option<Value> {
        let absolute = path.resolve(self.base).ok()?;
        schema_form_json_pointer::get(self.doc, &absolute).cloned()
    }
}

/// JS-like truthiness over JSON values.
///
/// `null`, `false`, `0` and `""` are falsy; arrays and objects (even empty)
/// are truthy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn number(f: f64) -> Value {
    // Division by zero and the like fold to null; JSON has no Infinity/NaN.
    if f.is_finite() {
        json!(f)
    } else {
        Value::Null
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        // Numbers compare numerically so that 1 == 1.0.
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Evaluates an expression against a scope.
pub fn evaluate(expr: &Expr, scope: &dyn PathScope) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Path(path) => scope.resolve(path).unwrap_or(Value::Null),
        Expr::Unary { op, expr } => {
            let value = evaluate(expr, scope);
            match op {
                UnaryOp::Not => Value::Bool(!truthy(&value)),
                UnaryOp::Neg => match as_number(&value) {
                    Some(n) => number(-n),
                    None => Value::Null,
                },
            }
        }
        Expr::Binary { op, lhs, rhs } => match op {
            // Short-circuiting operators return the deciding operand,
            // matching JS `&&` / `||`.
            BinaryOp::And => {
                let left = evaluate(lhs, scope);
                if truthy(&left) {
                    evaluate(rhs, scope)
                } else {
                    left
                }
            }
            BinaryOp::Or => {
                let left = evaluate(lhs, scope);
                if truthy(&left) {
                    left
                } else {
                    evaluate(rhs, scope)
                }
            }
            _ => {
                let left = evaluate(lhs, scope);
                let right = evaluate(rhs, scope);
                binary(*op, &left, &right)
            }
        },
    }
}

/// Convenience: evaluate to a boolean via [`truthy`].
pub fn evaluate_truthy(expr: &Expr, scope: &dyn PathScope) -> bool {
    truthy(&evaluate(expr, scope))
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Eq => Value::Bool(loose_eq(left, right)),
        BinaryOp::Ne => Value::Bool(!loose_eq(left, right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, left, right),
        BinaryOp::Add => match (as_number(left), as_number(right)) {
            (Some(x), Some(y)) => number(x + y),
            _ => {
                if left.is_string() || right.is_string() {
                    Value::String(display(left) + &display(right))
                } else {
                    Value::Null
                }
            }
        },
        BinaryOp::Sub => arithmetic(left, right, |x, y| x - y),
        BinaryOp::Mul => arithmetic(left, right, |x, y| x * y),
        BinaryOp::Div => arithmetic(left, right, |x, y| x / y),
        BinaryOp::Rem => arithmetic(left, right, |x, y| x % y),
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuited above"),
    }
}

fn arithmetic(left: &Value, right: &Value, f: impl Fn(f64, f64) -> f64) -> Value {
    match (as_number(left), as_number(right)) {
        (Some(x), Some(y)) => number(f(x, y)),
        _ => Value::Null,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        _ => match (as_number(left), as_number(right)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    };
    let Some(ordering) = ordering else {
        return Value::Bool(false);
    };
    Value::Bool(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn eval(source: &str, doc: &Value, base: &str) -> Value {
        let expr = parse(source).unwrap();
        evaluate(&expr, &ValueScope { doc, base })
    }

    #[test]
    fn truthiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("x")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!({})));
    }

    #[test]
    fn arithmetic_and_strings() {
        let doc = json!({});
        assert_eq!(eval("1 + 2 * 3", &doc, ""), json!(7.0));
        assert_eq!(eval("'a' + 'b'", &doc, ""), json!("ab"));
        assert_eq!(eval("'n=' + 2", &doc, ""), json!("n=2.0"));
        assert_eq!(eval("10 % 3", &doc, ""), json!(1.0));
        assert_eq!(eval("1 / 0", &doc, ""), json!(null));
        assert_eq!(eval("-(2 + 3)", &doc, ""), json!(-5.0));
    }

    #[test]
    fn equality_mixes_integer_and_float() {
        let doc = json!({"n": 1});
        assert_eq!(eval("./n == 1", &doc, ""), json!(true));
        assert_eq!(eval("./n === 1.0", &doc, ""), json!(true));
        assert_eq!(eval("./n !== 2", &doc, ""), json!(true));
    }

    #[test]
    fn comparisons() {
        let doc = json!({"age": 30, "name": "bob"});
        assert_eq!(eval("./age >= 18", &doc, ""), json!(true));
        assert_eq!(eval("./name < 'carl'", &doc, ""), json!(true));
        // Mixed types never order.
        assert_eq!(eval("./name < 5", &doc, ""), json!(false));
    }

    #[test]
    fn short_circuit_returns_operand() {
        let doc = json!({"a": 0, "b": "x"});
        assert_eq!(eval("./a && ./b", &doc, ""), json!(0));
        assert_eq!(eval("./a || ./b", &doc, ""), json!("x"));
        assert_eq!(eval("./missing || 'fallback'", &doc, ""), json!("fallback"));
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let doc = json!({"employee": {"type": "full_time", "salary": 1000}});
        assert_eq!(
            eval("./type === 'full_time'", &doc, "/employee"),
            json!(true)
        );
        assert_eq!(
            eval("../type === 'full_time'", &doc, "/employee/salary"),
            json!(true)
        );
        assert_eq!(eval("/employee/salary >= 500", &doc, "/anywhere"), json!(true));
    }

    #[test]
    fn missing_paths_are_null() {
        let doc = json!({});
        assert_eq!(eval("./nope", &doc, ""), json!(null));
        assert_eq!(eval("./nope == null", &doc, ""), json!(true));
        assert_eq!(eval("!./nope", &doc, ""), json!(true));
    }
}
