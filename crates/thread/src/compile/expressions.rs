//! Expression lowering.
//!
//! Expressions are free: they never allocate FSM states. Only calls may
//! (inlined bodies and intrinsics advance the machine themselves).

use silica_rtl::{BinaryOp, Expr};

use super::{numeric_expr, Compiler};
use crate::ast::{self, NameConst, Num};
use crate::error::CompileError;
use crate::operator;
use crate::value::Value;

impl Compiler<'_> {
    pub(super) fn lower_expr(&mut self, expr: &ast::Expr) -> Result<Value, CompileError> {
        match expr {
            ast::Expr::Num(Num::Int(n)) => Ok(Value::Expr(Expr::Int(*n))),
            ast::Expr::Num(Num::Float(f)) => Ok(Value::Expr(Expr::Float(*f))),
            ast::Expr::Str(s) => Ok(Value::Expr(Expr::Str(s.clone()))),
            ast::Expr::Const(NameConst::True) => Ok(Value::Expr(Expr::Int(1))),
            ast::Expr::Const(NameConst::False) | ast::Expr::Const(NameConst::None) => {
                Ok(Value::Expr(Expr::Int(0)))
            }
            ast::Expr::Name(name) => self.get_variable(name, false),
            ast::Expr::Attribute { value, attr } => self.lower_attribute(value, attr),
            ast::Expr::UnaryOp { op, operand } => {
                let operand = numeric_expr(self.lower_expr(operand)?, "unary operand")?;
                Ok(Value::Expr(Expr::unary(operator::unaryop(*op), operand)))
            }
            ast::Expr::BinOp { left, op, right } => self.lower_binop(left, *op, right),
            ast::Expr::BoolOp { op, values } => self.lower_boolop(*op, values),
            ast::Expr::Compare {
                left,
                ops,
                comparators,
            } => self.lower_compare(left, ops, comparators),
            ast::Expr::IfExp { test, body, orelse } => {
                let test = numeric_expr(self.lower_expr(test)?, "conditional test")?;
                let body = numeric_expr(self.lower_expr(body)?, "conditional arm")?;
                let orelse = numeric_expr(self.lower_expr(orelse)?, "conditional arm")?;
                Ok(Value::Expr(Expr::cond(test, body, orelse)))
            }
            ast::Expr::Call {
                func,
                args,
                keywords,
            } => self.lower_call(func, args, keywords),
            ast::Expr::Tuple(elts) | ast::Expr::List(elts) => {
                let values = elts
                    .iter()
                    .map(|elt| self.lower_expr(elt))
                    .collect::<Result<Vec<Value>, CompileError>>()?;
                Ok(Value::Tuple(values))
            }
        }
    }

    /// `reg.value` reads back the register itself; nothing else resolves
    /// at synthesis time. Thread-handle methods are handled at call sites.
    fn lower_attribute(&mut self, value: &ast::Expr, attr: &str) -> Result<Value, CompileError> {
        let value = self.lower_expr(value)?;
        if attr == "value" {
            if let Value::Expr(Expr::Reg(_)) = value {
                return Ok(value);
            }
        }
        Err(CompileError::TypeMisuse(format!(
            "attribute '{}' cannot be resolved on {}",
            attr,
            value.kind_name()
        )))
    }

    fn lower_binop(
        &mut self,
        left: &ast::Expr,
        op: ast::BinOpKind,
        right: &ast::Expr,
    ) -> Result<Value, CompileError> {
        let left = self.lower_expr(left)?;
        let right = self.lower_expr(right)?;
        let rtl_op = operator::binop(op)
            .ok_or_else(|| CompileError::UnsupportedOperator(format!("{:?}", op)))?;
        let left = left.into_expr("operand")?;
        let right = right.into_expr("operand")?;
        if !left.is_numeric() || !right.is_numeric() {
            if rtl_op == BinaryOp::Plus {
                return string_plus(&left, &right);
            }
            return Err(CompileError::TypeMisuse(format!(
                "operator '{}' has no meaning on string literals",
                rtl_op
            )));
        }
        Ok(Value::Expr(Expr::binary(rtl_op, left, right)))
    }

    fn lower_boolop(
        &mut self,
        op: ast::BoolOpKind,
        values: &[ast::Expr],
    ) -> Result<Value, CompileError> {
        let rtl_op = operator::boolop(op);
        let mut iter = values.iter();
        let first = iter.next().ok_or_else(|| {
            CompileError::TypeMisuse("boolean operator with no operands".to_string())
        })?;
        let mut result = numeric_expr(self.lower_expr(first)?, "boolean operand")?;
        for value in iter {
            let next = numeric_expr(self.lower_expr(value)?, "boolean operand")?;
            result = Expr::binary(rtl_op, result, next);
        }
        Ok(Value::Expr(result))
    }

    /// A chain `a < b < c` lowers to `(a < b) && (b < c)`: pairwise
    /// comparisons folded left with logical and.
    fn lower_compare(
        &mut self,
        left: &ast::Expr,
        ops: &[ast::CmpOpKind],
        comparators: &[ast::Expr],
    ) -> Result<Value, CompileError> {
        if ops.len() != comparators.len() || ops.is_empty() {
            return Err(CompileError::UnsupportedSyntax(
                "malformed comparison chain".to_string(),
            ));
        }
        let mut operands = vec![numeric_expr(self.lower_expr(left)?, "comparison operand")?];
        for comparator in comparators {
            operands.push(numeric_expr(
                self.lower_expr(comparator)?,
                "comparison operand",
            )?);
        }
        let mut result: Option<Expr> = None;
        for (i, op) in ops.iter().enumerate() {
            let rtl_op = operator::cmpop(*op)
                .ok_or_else(|| CompileError::UnsupportedOperator(format!("{:?}", op)))?;
            let pair = Expr::binary(rtl_op, operands[i].clone(), operands[i + 1].clone());
            result = Some(match result {
                Some(acc) => Expr::binary(BinaryOp::Land, acc, pair),
                None => pair,
            });
        }
        match result {
            Some(expr) => Ok(Value::Expr(expr)),
            None => Err(CompileError::UnsupportedSyntax(
                "malformed comparison chain".to_string(),
            )),
        }
    }
}

/// `+` on string literals concatenates their payloads at compile time.
fn string_plus(left: &Expr, right: &Expr) -> Result<Value, CompileError> {
    match (left.as_str(), right.as_str()) {
        (Some(l), Some(r)) => Ok(Value::Expr(Expr::Str(format!("{}{}", l, r)))),
        _ => Err(CompileError::TypeMisuse(
            "'+' operation requires two string arguments".to_string(),
        )),
    }
}
