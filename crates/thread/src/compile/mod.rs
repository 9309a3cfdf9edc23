//! The lowering visitor: walks a procedural AST and programs an FSM.
//!
//! This module holds the visitor state and the plumbing shared by the
//! per-concern submodules:
//!
//! - `statements` - statement dispatch and control-flow construction
//! - `expressions` - expression lowering to RTL nodes
//! - `calls` - builtin shortcuts, intrinsic dispatch, function inlining
//!
//! Every statement occupies one or more FSM states. The visitor advances
//! the machine with `set_fsm` / `inc_fsm_count` and registers structured
//! jumps (`break` / `continue` / `return`) as backpatches in the scope
//! stack, resolved when the owning construct closes.

mod calls;
mod expressions;
mod statements;

use std::collections::BTreeMap;
use std::rc::Rc;

use silica_rtl::{Expr, Fsm, RegId, Stmt as RtlStmt};

use crate::ast::{self, FunctionDef};
use crate::error::CompileError;
use crate::generator::{LoopInfo, SynthesisRecord, ThreadGenerator};
use crate::scope::{FrameKind, ScopeFrameList};
use crate::value::{Environment, Value};

/// Reject values that cannot flow into arithmetic or a register.
pub(crate) fn numeric_expr(value: Value, context: &str) -> Result<Expr, CompileError> {
    if !value.is_numeric() {
        return Err(CompileError::TypeMisuse(format!(
            "{} requires a numerical value, got {}",
            context,
            value.kind_name()
        )));
    }
    value.into_expr(context)
}

/// One thread lowering in progress.
///
/// Borrows the generator (function library, intrinsic registry, name
/// counter, module) and the FSM under construction; owns the scope stack
/// and the per-thread bookkeeping.
pub(crate) struct Compiler<'a> {
    thgen: &'a mut ThreadGenerator,
    fsm: &'a mut Fsm,
    name: String,
    env: Environment,
    scope: ScopeFrameList,
    loops: BTreeMap<(usize, usize), LoopInfo>,
    /// Functions currently being inlined, outermost first.
    call_stack: Vec<String>,
    /// Loop nesting depth, one entry per active call frame. `break` and
    /// `continue` consult the top entry only, so a callee cannot jump
    /// out of its caller's loop.
    loop_depth: Vec<usize>,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(
        thgen: &'a mut ThreadGenerator,
        fsm: &'a mut Fsm,
        name: &str,
        functions: Vec<Rc<FunctionDef>>,
        env: Environment,
    ) -> Compiler<'a> {
        let mut scope = ScopeFrameList::new();
        for func in functions {
            scope.add_function(func);
        }
        Compiler {
            thgen,
            fsm,
            name: name.to_string(),
            env,
            scope,
            loops: BTreeMap::new(),
            call_stack: Vec::new(),
            loop_depth: vec![0],
        }
    }

    /// Lower the synthetic toplevel call that enters the target function.
    /// The argument values sit in the environment under reserved keys.
    pub(crate) fn lower_entry_call(
        &mut self,
        target: &str,
        arg_keys: &[String],
        kwarg_keys: &[(String, String)],
    ) -> Result<(), CompileError> {
        let call = ast::Expr::Call {
            func: Box::new(ast::Expr::Name(target.to_string())),
            args: arg_keys
                .iter()
                .map(|key| ast::Expr::Name(key.clone()))
                .collect(),
            keywords: kwarg_keys
                .iter()
                .map(|(arg, key)| ast::Keyword {
                    arg: arg.clone(),
                    value: ast::Expr::Name(key.clone()),
                })
                .collect(),
        };
        self.lower_expr(&call)?;
        Ok(())
    }

    /// Consume the visitor, yielding the introspection record.
    pub(crate) fn finish(mut self) -> SynthesisRecord {
        SynthesisRecord {
            thread: self.name.clone(),
            binds: self.scope.take_binds(),
            loops: std::mem::take(&mut self.loops),
        }
    }

    // ----- FSM facade -------------------------------------------------

    /// Record a transition. `src` defaults to the current state, `dst` to
    /// the state after `src`.
    pub(super) fn set_fsm(
        &mut self,
        src: Option<usize>,
        dst: Option<usize>,
        cond: Option<Expr>,
        else_dst: Option<usize>,
    ) {
        let src = src.unwrap_or_else(|| self.fsm.current());
        let dst = dst.unwrap_or(src + 1);
        self.fsm.goto_from(src, dst, cond, else_dst);
    }

    /// Unconditional advance out of the current state.
    pub(super) fn set_fsm_next(&mut self) {
        self.set_fsm(None, None, None, None);
    }

    pub(super) fn inc_fsm_count(&mut self) {
        self.fsm.inc();
    }

    pub(super) fn get_fsm_count(&self) -> usize {
        self.fsm.current()
    }

    pub(super) fn set_fsm_loop(
        &mut self,
        begin: usize,
        end: usize,
        iter: Option<Expr>,
        step: Option<Expr>,
    ) {
        self.loops.insert((begin, end), LoopInfo { iter, step });
    }

    // ----- scope ------------------------------------------------------

    /// Run `f` inside a fresh scope frame, popping it on both the success
    /// and the error path.
    pub(super) fn with_scope<T>(
        &mut self,
        label: Option<&str>,
        kind: FrameKind,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        self.scope.push(label, kind);
        let result = f(self);
        self.scope.pop();
        result
    }

    /// Whether the current block has an outstanding structured jump, in
    /// which case subsequent statements are dead until the owning
    /// construct closes.
    pub(super) fn skip(&self) -> bool {
        self.scope.has_break() || self.scope.has_continue() || self.scope.has_return()
    }

    pub(super) fn enter_loop(&mut self) {
        if let Some(depth) = self.loop_depth.last_mut() {
            *depth += 1;
        }
    }

    pub(super) fn exit_loop(&mut self) {
        if let Some(depth) = self.loop_depth.last_mut() {
            *depth = depth.saturating_sub(1);
        }
    }

    pub(super) fn in_loop(&self) -> bool {
        self.loop_depth.last().is_some_and(|depth| *depth > 0)
    }

    // ----- variables and binds ----------------------------------------

    /// Declare a fresh register backing the source variable `name`.
    fn make_variable(&mut self, name: &str) -> RegId {
        let prefix = format!("{}_{}_{}", self.thgen.config().prefix, self.name, name);
        let signame = self.thgen.names_mut().tmp_name(&prefix);
        let width = self.thgen.config().datawidth;
        self.thgen.module().borrow_mut().reg(&signame, width, 0)
    }

    /// Resolve a name. Loads fall back from the scope stack to the
    /// function table, the captured environment, then generator globals.
    /// Stores allocate a register on first sight.
    pub(super) fn get_variable(
        &mut self,
        name: &str,
        store: bool,
    ) -> Result<Value, CompileError> {
        if let Some(value) = self.scope.search_variable(name) {
            if !store || matches!(value, Value::Expr(Expr::Reg(_))) {
                return Ok(value.clone());
            }
            // a store over an object binding re-binds the name to a register
        }
        if !store {
            if let Some(func) = self.scope.search_function(name) {
                return Ok(Value::Func(func));
            }
            if let Some(value) = self.env.get(name) {
                return Ok(value.clone());
            }
            if let Some(value) = self.thgen.global_object(name) {
                return Ok(value.clone());
            }
            return Err(CompileError::UndefinedName(name.to_string()));
        }
        let reg = self.make_variable(name);
        tracing::trace!(name, reg = ?reg, "allocated register");
        self.scope.add_variable(name, Value::Expr(Expr::Reg(reg)));
        Ok(Value::Expr(Expr::Reg(reg)))
    }

    /// Allocate an anonymous register (return-value slots).
    pub(super) fn get_tmp_variable(&mut self) -> RegId {
        let name = self.thgen.names_mut().tmp_name("tmp");
        let reg = self.make_variable(&name);
        self.scope.add_variable(&name, Value::Expr(Expr::Reg(reg)));
        reg
    }

    /// Emit a register assignment on the current state and log it.
    pub(super) fn set_bind(&mut self, dst: RegId, value: Expr, cond: Option<Expr>) {
        self.fsm
            .add_statement(vec![RtlStmt::subst(dst, value.clone())], cond.clone());
        let state = self.get_fsm_count();
        let name = self.fsm.module().borrow().reg_name(dst).to_string();
        self.scope.add_bind(state, Some(name), value, cond);
    }

    /// Attach a system task (no register target) to the current state.
    pub(super) fn set_task(&mut self, task: RtlStmt, cond: Option<Expr>) {
        self.fsm.add_statement(vec![task], cond);
    }

    /// Bind `value` to `name`: numerical values go through a register,
    /// everything else binds into the scope as a compile-time object.
    pub(super) fn bind_name(&mut self, name: &str, value: Value) -> Result<(), CompileError> {
        if !value.is_numeric() {
            self.scope.add_variable(name, value);
            return Ok(());
        }
        let left = self.get_variable(name, true)?;
        match left {
            Value::Expr(Expr::Reg(reg)) => {
                let right = value.into_expr("assignment")?;
                self.set_bind(reg, right, None);
                Ok(())
            }
            other => Err(CompileError::TypeMisuse(format!(
                "cannot assign to {}",
                other.kind_name()
            ))),
        }
    }
}
