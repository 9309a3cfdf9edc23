//! Host-provided callables invoked during lowering.
//!
//! An intrinsic bypasses normal call lowering: its arguments are lowered
//! to values, then the intrinsic runs at compile time with direct access
//! to the generator and the FSM under construction. This is how hardware
//! primitives and cross-thread synchronization (`run`, `sleep`, `wait`,
//! `busy`) are expressed.
//!
//! Free functions are keyed by name. Bound methods are keyed by the
//! identity token of their owner object (e.g. a thread handle) plus the
//! method name; the registrations appear when the owner is created.

use std::collections::HashMap;
use std::rc::Rc;

use silica_rtl::Fsm;

use crate::error::CompileError;
use crate::generator::ThreadGenerator;
use crate::value::Value;

/// A host callable invocable at a call site during lowering.
///
/// The compiler lowers the call's arguments first, then invokes
/// `call(generator, fsm, args, kwargs)`. The return value becomes the
/// call's expression result. Intrinsics may freely mutate the FSM,
/// allocate registers, or synthesize entire child threads.
pub trait Intrinsic {
    fn name(&self) -> &str;

    fn call(
        &self,
        generator: &mut ThreadGenerator,
        fsm: &mut Fsm,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, CompileError>;
}

/// The intrinsic tables consulted at every call site.
#[derive(Default)]
pub struct IntrinsicRegistry {
    functions: HashMap<String, Rc<dyn Intrinsic>>,
    methods: HashMap<(usize, String), Rc<dyn Intrinsic>>,
}

impl IntrinsicRegistry {
    pub fn new() -> IntrinsicRegistry {
        IntrinsicRegistry::default()
    }

    /// Register a free-function intrinsic under its own name.
    pub fn register_function(&mut self, func: Rc<dyn Intrinsic>) -> Result<(), CompileError> {
        let name = func.name().to_string();
        if self.functions.contains_key(&name) {
            return Err(CompileError::DuplicateRegistration(name));
        }
        self.functions.insert(name, func);
        Ok(())
    }

    /// Register a method intrinsic under its owner's identity token.
    pub fn register_method(
        &mut self,
        token: usize,
        func: Rc<dyn Intrinsic>,
    ) -> Result<(), CompileError> {
        let key = (token, func.name().to_string());
        if self.methods.contains_key(&key) {
            return Err(CompileError::DuplicateRegistration(key.1));
        }
        self.methods.insert(key, func);
        Ok(())
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn function(&self, name: &str) -> Option<Rc<dyn Intrinsic>> {
        self.functions.get(name).cloned()
    }

    pub fn method(&self, token: usize, name: &str) -> Option<Rc<dyn Intrinsic>> {
        self.methods.get(&(token, name.to_string())).cloned()
    }
}

impl std::fmt::Debug for IntrinsicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("IntrinsicRegistry")
            .field("functions", &names)
            .field("methods", &self.methods.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silica_rtl::Expr;

    struct Nop(&'static str);

    impl Intrinsic for Nop {
        fn name(&self) -> &str {
            self.0
        }

        fn call(
            &self,
            _generator: &mut ThreadGenerator,
            _fsm: &mut Fsm,
            _args: Vec<Value>,
            _kwargs: Vec<(String, Value)>,
        ) -> Result<Value, CompileError> {
            Ok(Value::Expr(Expr::Int(0)))
        }
    }

    #[test]
    fn test_duplicate_function_registration_is_an_error() {
        let mut reg = IntrinsicRegistry::new();
        reg.register_function(Rc::new(Nop("f"))).unwrap();
        let err = reg.register_function(Rc::new(Nop("f"))).unwrap_err();
        assert_eq!(err, CompileError::DuplicateRegistration("f".to_string()));
    }

    #[test]
    fn test_method_lookup_is_per_owner_token() {
        let mut reg = IntrinsicRegistry::new();
        reg.register_method(7, Rc::new(Nop("wait"))).unwrap();
        assert!(reg.method(7, "wait").is_some());
        assert!(reg.method(8, "wait").is_none());
        assert!(reg.method(7, "busy").is_none());
    }
}
