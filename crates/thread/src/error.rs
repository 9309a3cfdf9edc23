//! Compile error types.
//!
//! Every error is surfaced immediately to the caller; none is recoverable
//! inside the compiler. This allows proper error propagation using `?`
//! through the whole lowering visitor.

/// Error type for thread lowering.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// A source construct outside the accepted sublanguage
    /// (imports, class definitions, non-`range` loop iterables, ...).
    UnsupportedSyntax(String),
    /// An operator with no RTL mapping.
    UnsupportedOperator(String),
    /// Load of a name with no binding in scope, environment or globals.
    UndefinedName(String),
    /// Call of a function that is neither registered nor in scope.
    UndefinedFunction(String),
    /// Tuple unpacking with more values than targets.
    TooManyValues { expected: usize },
    /// Tuple unpacking with fewer values than targets.
    NotEnoughValues { expected: usize, got: usize },
    /// A value used where its kind makes no sense (string arithmetic other
    /// than `+`, calling a non-callable, bad builtin arity, ...).
    TypeMisuse(String),
    /// A function or intrinsic registered under a name already taken.
    DuplicateRegistration(String),
    /// A function reached again while it is still being inlined.
    RecursionDetected(String),
    /// `break` with no enclosing loop in the current function.
    BreakOutsideLoop,
    /// `continue` with no enclosing loop in the current function.
    ContinueOutsideLoop,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::UnsupportedSyntax(what) => {
                write!(f, "{} is not supported", what)
            }
            CompileError::UnsupportedOperator(op) => {
                write!(f, "unsupported operator: {}", op)
            }
            CompileError::UndefinedName(name) => {
                write!(f, "name '{}' is not defined", name)
            }
            CompileError::UndefinedFunction(name) => {
                write!(f, "function '{}' is not defined", name)
            }
            CompileError::TooManyValues { expected } => {
                write!(f, "too many values to unpack (expected {})", expected)
            }
            CompileError::NotEnoughValues { expected, got } => {
                write!(
                    f,
                    "not enough values to unpack (expected {}, got {})",
                    expected, got
                )
            }
            CompileError::TypeMisuse(msg) => write!(f, "{}", msg),
            CompileError::DuplicateRegistration(name) => {
                write!(f, "'{}' is already registered", name)
            }
            CompileError::RecursionDetected(name) => {
                write!(
                    f,
                    "recursive call of '{}' cannot be inlined into a finite state machine",
                    name
                )
            }
            CompileError::BreakOutsideLoop => write!(f, "'break' outside loop"),
            CompileError::ContinueOutsideLoop => write!(f, "'continue' outside loop"),
        }
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = CompileError::UndefinedName("x".to_string());
        assert_eq!(e.to_string(), "name 'x' is not defined");

        let e = CompileError::TooManyValues { expected: 2 };
        assert!(e.to_string().contains("too many values"));

        let e = CompileError::NotEnoughValues {
            expected: 3,
            got: 2,
        };
        assert!(e.to_string().contains("expected 3, got 2"));
    }
}
