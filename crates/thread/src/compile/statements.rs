//! Statement lowering: the control-flow graph builder.
//!
//! Each statement maps to a segment of FSM states. Straight-line
//! statements take one state; `if` / `while` / `for` allocate branch,
//! body and exit states and wire the transitions between them, draining
//! the backpatches their bodies registered.

use silica_rtl::{Expr, Stmt as RtlStmt};

use super::{numeric_expr, Compiler};
use crate::ast::{self, BinOpKind, Target};
use crate::error::CompileError;
use crate::operator;
use crate::scope::FrameKind;
use crate::value::Value;

impl Compiler<'_> {
    pub(super) fn lower_body(&mut self, body: &[ast::Stmt]) -> Result<(), CompileError> {
        for stmt in body {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    pub(super) fn lower_stmt(&mut self, stmt: &ast::Stmt) -> Result<(), CompileError> {
        // An outstanding break/continue/return makes the rest of the
        // block dead; the cascade ends when the owning construct drains
        // its patches.
        if self.skip() {
            return Ok(());
        }
        match stmt {
            ast::Stmt::FunctionDef(def) => {
                self.scope.add_function(def.clone());
                Ok(())
            }
            ast::Stmt::Assign { targets, value } => self.lower_assign(targets, value),
            ast::Stmt::AugAssign { target, op, value } => {
                self.lower_aug_assign(target, *op, value)
            }
            ast::Stmt::If { test, body, orelse } => self.lower_if(test, body, orelse),
            ast::Stmt::While { test, body } => self.lower_while(test, body),
            ast::Stmt::For { target, iter, body } => self.lower_for(target, iter, body),
            ast::Stmt::Return(value) => self.lower_return(value.as_ref()),
            ast::Stmt::Break => self.lower_break(),
            ast::Stmt::Continue => self.lower_continue(),
            ast::Stmt::Pass => Ok(()),
            ast::Stmt::Nonlocal(names) => {
                for name in names {
                    self.scope.add_nonlocal(name);
                }
                Ok(())
            }
            ast::Stmt::Global(names) => {
                for name in names {
                    self.scope.add_global(name);
                }
                Ok(())
            }
            ast::Stmt::Expr(expr) => {
                self.lower_expr(expr)?;
                Ok(())
            }
            ast::Stmt::Print(args) => {
                self.lower_print(args)?;
                Ok(())
            }
            ast::Stmt::Import(name) | ast::Stmt::ImportFrom(name) => Err(
                CompileError::UnsupportedSyntax(format!("import of '{}'", name)),
            ),
            ast::Stmt::ClassDef(name) => Err(CompileError::UnsupportedSyntax(format!(
                "class definition '{}'",
                name
            ))),
        }
    }

    fn lower_assign(&mut self, targets: &[Target], value: &ast::Expr) -> Result<(), CompileError> {
        let right = self.lower_expr(value)?;
        for target in targets {
            self.assign_target(target, &right)?;
        }
        self.set_fsm_next();
        self.inc_fsm_count();
        Ok(())
    }

    fn assign_target(&mut self, target: &Target, value: &Value) -> Result<(), CompileError> {
        match target {
            Target::Name(name) => self.bind_name(name, value.clone()),
            Target::Tuple(elts) | Target::List(elts) => match value {
                Value::Tuple(values) => {
                    if elts.len() < values.len() {
                        return Err(CompileError::TooManyValues {
                            expected: elts.len(),
                        });
                    }
                    if elts.len() > values.len() {
                        return Err(CompileError::NotEnoughValues {
                            expected: elts.len(),
                            got: values.len(),
                        });
                    }
                    for (elt, v) in elts.iter().zip(values) {
                        self.assign_target(elt, v)?;
                    }
                    Ok(())
                }
                other => Err(CompileError::TypeMisuse(format!(
                    "cannot unpack {} into {} targets",
                    other.kind_name(),
                    elts.len()
                ))),
            },
        }
    }

    fn lower_aug_assign(
        &mut self,
        target: &Target,
        op: BinOpKind,
        value: &ast::Expr,
    ) -> Result<(), CompileError> {
        let right = numeric_expr(self.lower_expr(value)?, "augmented assignment")?;
        let name = match target {
            Target::Name(name) => name,
            _ => {
                return Err(CompileError::UnsupportedSyntax(
                    "augmented assignment to a tuple target".to_string(),
                ))
            }
        };
        let rtl_op = operator::binop(op)
            .ok_or_else(|| CompileError::UnsupportedOperator(format!("{:?}", op)))?;
        let left = self.get_variable(name, true)?;
        match left {
            Value::Expr(Expr::Reg(reg)) => {
                let result = Expr::binary(rtl_op, Expr::Reg(reg), right);
                self.set_bind(reg, result, None);
            }
            other => {
                return Err(CompileError::TypeMisuse(format!(
                    "cannot assign to {}",
                    other.kind_name()
                )))
            }
        }
        self.set_fsm_next();
        self.inc_fsm_count();
        Ok(())
    }

    /// `if` lowering:
    ///
    /// ```text
    ///   s:  test ? t : f      t = s+1 (true body), f = else entry or m
    ///   m:  (true fall-through) -> e when an else exists
    /// ```
    fn lower_if(
        &mut self,
        test: &ast::Expr,
        body: &[ast::Stmt],
        orelse: &[ast::Stmt],
    ) -> Result<(), CompileError> {
        let test = numeric_expr(self.lower_expr(test)?, "if condition")?;

        let cur = self.get_fsm_count();
        self.inc_fsm_count();
        let true_start = self.get_fsm_count();

        self.with_scope(Some("if"), FrameKind::Block, |c| c.lower_body(body))?;

        let mid = self.get_fsm_count();

        if orelse.is_empty() {
            self.set_fsm(Some(cur), Some(true_start), Some(test), Some(mid));
            return Ok(());
        }

        self.inc_fsm_count();
        let false_start = self.get_fsm_count();

        self.with_scope(Some("else"), FrameKind::Block, |c| c.lower_body(orelse))?;

        let end = self.get_fsm_count();
        self.set_fsm(Some(cur), Some(true_start), Some(test), Some(false_start));
        // the true branch falls through past the else block
        self.set_fsm(Some(mid), Some(end), None, None);
        Ok(())
    }

    fn lower_while(&mut self, test: &ast::Expr, body: &[ast::Stmt]) -> Result<(), CompileError> {
        let test = numeric_expr(self.lower_expr(test)?, "while condition")?;

        let begin = self.get_fsm_count();
        self.inc_fsm_count();
        let body_begin = self.get_fsm_count();

        self.enter_loop();
        self.with_scope(Some("while"), FrameKind::Block, |c| c.lower_body(body))?;
        self.exit_loop();

        let body_end = self.get_fsm_count();
        self.inc_fsm_count();
        let exit = self.get_fsm_count();

        self.set_fsm(Some(begin), Some(body_begin), Some(test), Some(exit));
        self.set_fsm(Some(body_end), Some(begin), None, None);

        for state in self.scope.unresolved_breaks() {
            self.set_fsm(Some(state), Some(exit), None, None);
        }
        for state in self.scope.unresolved_continues() {
            self.set_fsm(Some(state), Some(begin), None, None);
        }
        self.scope.clear_breaks();
        self.scope.clear_continues();

        self.set_fsm_loop(begin, body_end, None, None);
        Ok(())
    }

    /// Only `range(...)` iterables are accepted, with 1, 2 or 3 arguments
    /// carrying the usual begin/end/step meaning. The iteration register
    /// belongs to the enclosing scope; the step update runs on the body
    /// exit state so `continue` still advances the counter.
    fn lower_for(
        &mut self,
        target: &Target,
        iter: &ast::Expr,
        body: &[ast::Stmt],
    ) -> Result<(), CompileError> {
        let range_args = range_arguments(iter)?;
        let begin_node = match range_args {
            [_only] => Expr::Int(0),
            [first, ..] => numeric_expr(self.lower_expr(first)?, "range begin")?,
            [] => Expr::Int(0),
        };
        let end_node = match range_args {
            [only] => numeric_expr(self.lower_expr(only)?, "range end")?,
            [_, second, ..] => numeric_expr(self.lower_expr(second)?, "range end")?,
            [] => Expr::Int(0),
        };
        let step_node = match range_args {
            [_, _, third] => numeric_expr(self.lower_expr(third)?, "range step")?,
            _ => Expr::Int(1),
        };

        let name = match target {
            Target::Name(name) => name,
            _ => {
                return Err(CompileError::UnsupportedSyntax(
                    "tuple target in 'for'".to_string(),
                ))
            }
        };
        let iter_reg = match self.get_variable(name, true)? {
            Value::Expr(Expr::Reg(reg)) => reg,
            other => {
                return Err(CompileError::TypeMisuse(format!(
                    "cannot assign to {}",
                    other.kind_name()
                )))
            }
        };
        let iter_node = Expr::Reg(iter_reg);
        let cond_node = Expr::less_than(iter_node.clone(), end_node);
        let update_node = Expr::plus(iter_node.clone(), step_node.clone());

        self.enter_loop();
        let (check, body_begin) =
            self.with_scope(Some("for"), FrameKind::Block, |c| {
                // initialize
                c.set_bind(iter_reg, begin_node, None);
                c.set_fsm_next();
                c.inc_fsm_count();

                // condition check
                let check = c.get_fsm_count();
                c.inc_fsm_count();
                let body_begin = c.get_fsm_count();

                c.lower_body(body)?;
                Ok((check, body_begin))
            })?;
        self.exit_loop();

        let body_end = self.get_fsm_count();

        // step update
        self.set_bind(iter_reg, update_node, None);
        self.inc_fsm_count();
        let exit = self.get_fsm_count();

        self.set_fsm(Some(body_end), Some(check), None, None);
        self.set_fsm(Some(check), Some(body_begin), Some(cond_node), Some(exit));

        for state in self.scope.unresolved_breaks() {
            self.set_fsm(Some(state), Some(exit), None, None);
        }
        for state in self.scope.unresolved_continues() {
            self.set_fsm(Some(state), Some(body_end), None, None);
        }
        self.scope.clear_breaks();
        self.scope.clear_continues();

        self.set_fsm_loop(check, body_end, Some(iter_node), Some(step_node));
        Ok(())
    }

    fn lower_break(&mut self) -> Result<(), CompileError> {
        if !self.in_loop() {
            return Err(CompileError::BreakOutsideLoop);
        }
        let state = self.get_fsm_count();
        self.scope.add_break(state);
        self.inc_fsm_count();
        Ok(())
    }

    fn lower_continue(&mut self) -> Result<(), CompileError> {
        if !self.in_loop() {
            return Err(CompileError::ContinueOutsideLoop);
        }
        let state = self.get_fsm_count();
        self.scope.add_continue(state);
        self.inc_fsm_count();
        Ok(())
    }

    /// The first value-carrying `return` in a call frame allocates the
    /// frame's return register; later returns reuse it. A bare `return`
    /// only registers the jump.
    fn lower_return(&mut self, value: Option<&ast::Expr>) -> Result<(), CompileError> {
        let Some(value) = value else {
            self.scope.add_return(self.get_fsm_count(), None);
            self.inc_fsm_count();
            return Ok(());
        };
        let reg = match self.scope.return_variable() {
            Some(reg) => reg,
            None => {
                let tmp = self.get_tmp_variable();
                self.scope.set_return_variable(tmp);
                tmp
            }
        };
        let right = numeric_expr(self.lower_expr(value)?, "return value")?;
        self.set_bind(reg, right.clone(), None);
        self.scope.add_return(self.get_fsm_count(), Some(right));
        self.inc_fsm_count();
        Ok(())
    }

    /// Lower a `print`: accumulate a format string from the arguments
    /// (string literals verbatim, `%d` for hardware values, an inline
    /// `"fmt" % (args...)` consumed as-is) and emit a single `$display`.
    pub(super) fn lower_print(&mut self, args: &[ast::Expr]) -> Result<Value, CompileError> {
        let mut argvalues: Vec<Expr> = Vec::new();
        let mut format: Vec<String> = Vec::new();

        for arg in args {
            match arg {
                ast::Expr::BinOp { left, op, right }
                    if *op == BinOpKind::Mod && matches!(**left, ast::Expr::Str(_)) =>
                {
                    if let ast::Expr::Str(form) = &**left {
                        self.push_format_args(right, &mut argvalues)?;
                        format.push(form.clone());
                        format.push(" ".to_string());
                    }
                }
                ast::Expr::Tuple(elts) => {
                    for elt in elts {
                        self.push_print_arg(elt, &mut format, &mut argvalues)?;
                    }
                }
                _ => self.push_print_arg(arg, &mut format, &mut argvalues)?,
            }
        }
        // drop the trailing separator
        format.pop();

        let mut task_args = vec![Expr::Str(format.concat())];
        task_args.extend(argvalues);
        self.set_task(RtlStmt::system_task("display", task_args), None);

        self.set_fsm_next();
        self.inc_fsm_count();
        Ok(Value::Expr(Expr::Int(0)))
    }

    /// The argument tuple of an inline `"fmt" % (args...)`, flattened.
    fn push_format_args(
        &mut self,
        right: &ast::Expr,
        argvalues: &mut Vec<Expr>,
    ) -> Result<(), CompileError> {
        match right {
            ast::Expr::Tuple(elts) | ast::Expr::List(elts) => {
                for elt in elts {
                    let value = self.lower_expr(elt)?;
                    argvalues.push(value.into_expr("format argument")?);
                }
            }
            other => {
                let value = self.lower_expr(other)?;
                argvalues.push(value.into_expr("format argument")?);
            }
        }
        Ok(())
    }

    fn push_print_arg(
        &mut self,
        arg: &ast::Expr,
        format: &mut Vec<String>,
        argvalues: &mut Vec<Expr>,
    ) -> Result<(), CompileError> {
        let value = self.lower_expr(arg)?;
        match value {
            Value::Expr(Expr::Str(s)) => {
                format.push(s);
                format.push(" ".to_string());
            }
            other => {
                argvalues.push(other.into_expr("print argument")?);
                format.push("%d".to_string());
                format.push(" ".to_string());
            }
        }
        Ok(())
    }
}

/// Extract the argument list of a `range(...)` iterable, rejecting
/// everything else.
fn range_arguments(iter: &ast::Expr) -> Result<&[ast::Expr], CompileError> {
    let ast::Expr::Call {
        func,
        args,
        keywords,
    } = iter
    else {
        return Err(CompileError::UnsupportedSyntax(
            "'for' over an iterable other than range(...)".to_string(),
        ));
    };
    match &**func {
        ast::Expr::Name(name) if name == "range" && keywords.is_empty() => {}
        _ => {
            return Err(CompileError::UnsupportedSyntax(
                "'for' over an iterable other than range(...)".to_string(),
            ))
        }
    }
    if args.is_empty() {
        return Err(CompileError::TypeMisuse(
            "range expected at least 1 argument, got 0".to_string(),
        ));
    }
    if args.len() > 3 {
        return Err(CompileError::TypeMisuse(format!(
            "range expected at most 3 arguments, got {}",
            args.len()
        )));
    }
    Ok(args)
}
