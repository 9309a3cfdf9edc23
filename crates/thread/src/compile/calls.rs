//! Call lowering: builtins, intrinsics, and function inlining.
//!
//! Three cases, tried in order for a named callee: the builtin shortcuts
//! (`print`, `int`), a registered intrinsic, then inlining. Method calls
//! resolve against the method-intrinsic table keyed by the receiver's
//! identity token.
//!
//! Inlining is eager: the callee body is lowered in place behind a fresh
//! call frame, so the same function may be inlined at many sites but a
//! cycle would allocate states forever. The active-call stack turns a
//! cycle into an error instead.

use silica_rtl::Expr;

use super::Compiler;
use crate::ast::{self, FunctionDef, Keyword};
use crate::error::CompileError;
use crate::scope::FrameKind;
use crate::value::Value;
use std::rc::Rc;

impl Compiler<'_> {
    pub(super) fn lower_call(
        &mut self,
        func: &ast::Expr,
        args: &[ast::Expr],
        keywords: &[Keyword],
    ) -> Result<Value, CompileError> {
        match func {
            ast::Expr::Name(name) => self.call_name(name, args, keywords),
            ast::Expr::Attribute { value, attr } => {
                self.call_attribute(value, attr, args, keywords)
            }
            _ => Err(CompileError::UnsupportedSyntax(
                "call of a computed expression".to_string(),
            )),
        }
    }

    fn call_name(
        &mut self,
        name: &str,
        args: &[ast::Expr],
        keywords: &[Keyword],
    ) -> Result<Value, CompileError> {
        // builtin shortcuts
        if name == "print" {
            if !keywords.is_empty() {
                return Err(CompileError::TypeMisuse(
                    "print() keyword arguments are not supported".to_string(),
                ));
            }
            return self.lower_print(args);
        }
        if name == "int" {
            if args.len() != 1 || !keywords.is_empty() {
                return Err(CompileError::TypeMisuse(format!(
                    "int() takes exactly one argument ({} given)",
                    args.len()
                )));
            }
            return self.lower_expr(&args[0]);
        }

        // intrinsic function call
        if let Some(intrinsic) = self.thgen.intrinsics().function(name) {
            let (argvals, kwvals) = self.lower_arguments(args, keywords)?;
            return intrinsic.call(self.thgen, self.fsm, argvals, kwvals);
        }

        // inlined function call
        self.inline_function(name, args, keywords)
    }

    fn call_attribute(
        &mut self,
        receiver: &ast::Expr,
        attr: &str,
        args: &[ast::Expr],
        keywords: &[Keyword],
    ) -> Result<Value, CompileError> {
        let receiver = self.lower_expr(receiver)?;
        if let Value::Thread(info) = &receiver {
            if let Some(intrinsic) = self.thgen.intrinsics().method(info.token(), attr) {
                let (argvals, kwvals) = self.lower_arguments(args, keywords)?;
                return intrinsic.call(self.thgen, self.fsm, argvals, kwvals);
            }
        }
        Err(CompileError::TypeMisuse(format!(
            "'{}' is not a callable method on {}",
            attr,
            receiver.kind_name()
        )))
    }

    fn lower_arguments(
        &mut self,
        args: &[ast::Expr],
        keywords: &[Keyword],
    ) -> Result<(Vec<Value>, Vec<(String, Value)>), CompileError> {
        let argvals = args
            .iter()
            .map(|arg| self.lower_expr(arg))
            .collect::<Result<Vec<Value>, CompileError>>()?;
        let kwvals = keywords
            .iter()
            .map(|kw| Ok((kw.arg.clone(), self.lower_expr(&kw.value)?)))
            .collect::<Result<Vec<(String, Value)>, CompileError>>()?;
        Ok((argvals, kwvals))
    }

    /// Resolve a callee: scope-visible definitions first, then function
    /// values bound in scope or in the captured environment.
    fn get_function(&self, name: &str) -> Result<Rc<FunctionDef>, CompileError> {
        if let Some(func) = self.scope.search_function(name) {
            return Ok(func);
        }
        match self.scope.search_variable(name) {
            Some(Value::Func(func)) => return Ok(func.clone()),
            Some(other) => {
                return Err(CompileError::TypeMisuse(format!(
                    "{} is not callable",
                    other.kind_name()
                )))
            }
            None => {}
        }
        match self.env.get(name) {
            Some(Value::Func(func)) => Ok(func.clone()),
            Some(other) => Err(CompileError::TypeMisuse(format!(
                "{} is not callable",
                other.kind_name()
            ))),
            None => Err(CompileError::UndefinedFunction(name.to_string())),
        }
    }

    fn inline_function(
        &mut self,
        name: &str,
        args: &[ast::Expr],
        keywords: &[Keyword],
    ) -> Result<Value, CompileError> {
        let tree = self.get_function(name)?;
        if self.call_stack.iter().any(|active| active == name) {
            return Err(CompileError::RecursionDetected(name.to_string()));
        }
        if args.len() > tree.params.len() {
            return Err(CompileError::TypeMisuse(format!(
                "{}() takes {} positional arguments but {} were given",
                name,
                tree.params.len(),
                args.len()
            )));
        }
        if tree.defaults.len() > tree.params.len() {
            return Err(CompileError::TypeMisuse(format!(
                "{}() has more default values than parameters",
                name
            )));
        }

        // argument expressions evaluate in the caller's scope
        let (argvals, kwvals) = self.lower_arguments(args, keywords)?;

        tracing::debug!(function = name, state = self.get_fsm_count(), "inlining call");

        self.call_stack.push(name.to_string());
        self.loop_depth.push(0);
        let result = self.with_scope(Some(name), FrameKind::Call, |c| {
            // positional arguments, then keywords, then defaults for
            // whatever is still unbound
            for (pos, argval) in argvals.into_iter().enumerate() {
                let param = tree.params[pos].clone();
                c.bind_name(&param, argval)?;
            }
            for (key, val) in kwvals {
                c.bind_name(&key, val)?;
            }
            let defaults_start = tree.params.len() - tree.defaults.len();
            for (param, default) in tree.params[defaults_start..].iter().zip(&tree.defaults) {
                if c.scope.search_variable(param).is_none() {
                    let value = c.lower_expr(default)?;
                    c.bind_name(param, value)?;
                }
            }

            c.set_fsm_next();
            c.inc_fsm_count();

            c.lower_body(&tree.body)?;

            let retvar = c.scope.return_variable();

            // every return jumps to the state after the body
            let end = c.get_fsm_count();
            for (state, _value) in c.scope.unresolved_returns() {
                c.set_fsm(Some(state), Some(end), None, None);
            }

            c.scope.clear_breaks();
            c.scope.clear_continues();
            c.scope.clear_returns();
            c.scope.clear_return_variable();

            Ok(match retvar {
                Some(reg) => Value::Expr(Expr::Reg(reg)),
                None => Value::Expr(Expr::Int(0)),
            })
        });
        self.loop_depth.pop();
        self.call_stack.pop();
        result
    }
}
