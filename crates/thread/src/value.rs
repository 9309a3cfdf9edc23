//! Compile-time values and the captured environment.
//!
//! During lowering every expression position produces a [`Value`]. Most are
//! RTL expressions, but the compiler also tracks things that exist only at
//! compile time: tuples of values, function definitions, and handles to
//! spawned threads. Non-numerical values never back a register; they bind
//! directly into the scope as objects.

use std::collections::HashMap;
use std::rc::Rc;

use silica_rtl::Expr;

use crate::ast::FunctionDef;
use crate::error::CompileError;
use crate::generator::ThreadInfo;

/// A value produced while lowering an expression.
#[derive(Clone, Debug)]
pub enum Value {
    /// An RTL expression (register reference, literal, operator tree).
    Expr(Expr),
    /// A compile-time tuple; there is no runtime tuple in the RTL.
    Tuple(Vec<Value>),
    /// A function available for inlining.
    Func(Rc<FunctionDef>),
    /// A handle to a spawned child thread.
    Thread(ThreadInfo),
}

impl Value {
    /// Whether this value can back a register assignment. String literals
    /// and compile-time objects cannot.
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Expr(e) => e.is_numeric(),
            _ => false,
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Value::Expr(e) => Some(e),
            _ => None,
        }
    }

    /// Unwrap into an RTL expression, or fail with `context` naming the
    /// position that needed one.
    pub fn into_expr(self, context: &str) -> Result<Expr, CompileError> {
        match self {
            Value::Expr(e) => Ok(e),
            other => Err(CompileError::TypeMisuse(format!(
                "{} requires a hardware value, not {}",
                context,
                other.kind_name()
            ))),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Expr(Expr::Str(_)) => "a string",
            Value::Expr(_) => "an expression",
            Value::Tuple(_) => "a tuple",
            Value::Func(_) => "a function",
            Value::Thread(_) => "a thread handle",
        }
    }
}

impl From<Expr> for Value {
    fn from(e: Expr) -> Value {
        Value::Expr(e)
    }
}

/// The lexical bindings captured when a thread is launched.
///
/// The original host-language tool snapshotted the caller's stack frame;
/// here the caller passes the bindings explicitly. Name resolution falls
/// back to the environment when a load misses every scope frame.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    vars: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            vars: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Environment {
    fn from_iter<T: IntoIterator<Item = (S, Value)>>(iter: T) -> Environment {
        Environment {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_category() {
        assert!(Value::Expr(Expr::Int(1)).is_numeric());
        assert!(!Value::Expr(Expr::Str("s".into())).is_numeric());
        assert!(!Value::Tuple(vec![]).is_numeric());
    }

    #[test]
    fn test_into_expr_reports_kind() {
        let v = Value::Tuple(vec![Value::Expr(Expr::Int(1))]);
        let err = v.into_expr("operand").unwrap_err();
        assert!(err.to_string().contains("a tuple"));
    }

    #[test]
    fn test_environment_lookup() {
        let mut env = Environment::new();
        env.insert("x", Value::Expr(Expr::Int(7)));
        assert!(env.contains("x"));
        assert!(env.get("y").is_none());
    }
}
