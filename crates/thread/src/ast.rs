//! Abstract syntax tree for procedural thread descriptions.
//!
//! The compiler does not parse surface syntax; callers hand it a pre-built
//! tree of these nodes, either constructed directly or through the helper
//! functions in [`build`]. The node vocabulary deliberately mirrors a small
//! imperative host language: assignments, arithmetic, conditionals, loops,
//! function definitions and calls.
//!
//! Node kinds outside the accepted sublanguage ([`Stmt::Import`],
//! [`Stmt::ImportFrom`], [`Stmt::ClassDef`]) are representable so the
//! compiler can reject them with a proper error instead of a parse failure.

use std::rc::Rc;

/// A numeric literal. Integers and all other numerics lower differently.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

/// The named constants of the source language.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameConst {
    True,
    False,
    None,
}

/// Binary operator kinds as they appear in source.
///
/// `MatMult` exists in the host grammar but has no RTL mapping; the
/// operator table rejects it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
}

/// Unary operator kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOpKind {
    UAdd,
    USub,
    Invert,
    Not,
}

/// Boolean operator kinds (`and` / `or`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoolOpKind {
    And,
    Or,
}

/// Comparison operator kinds. `Is`/`IsNot` alias equality; the membership
/// tests exist in the host grammar but have no RTL mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOpKind {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

/// A keyword argument at a call site.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyword {
    pub arg: String,
    pub value: Expr,
}

/// An expression node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Num(Num),
    Str(String),
    Const(NameConst),
    /// Name reference in load context. Store context is [`Target`].
    Name(String),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    UnaryOp {
        op: UnaryOpKind,
        operand: Box<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: BinOpKind,
        right: Box<Expr>,
    },
    BoolOp {
        op: BoolOpKind,
        values: Vec<Expr>,
    },
    /// Comparison chain: `left ops[0] comparators[0] ops[1] comparators[1] ...`
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOpKind>,
        comparators: Vec<Expr>,
    },
    /// Conditional expression `body if test else orelse`.
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
}

/// An assignment target (name reference in store context).
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    Name(String),
    Tuple(Vec<Target>),
    List(Vec<Target>),
}

impl Target {
    /// Collect the symbolic names bound by this target, left to right.
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Target::Name(n) => out.push(n),
            Target::Tuple(elts) | Target::List(elts) => {
                for elt in elts {
                    elt.collect_names(out);
                }
            }
        }
    }
}

/// A function definition.
///
/// `defaults` align with the trailing parameters, as in the host language:
/// with parameters `a, b, c` and two defaults, the defaults belong to `b`
/// and `c`.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub defaults: Vec<Expr>,
    pub body: Vec<Stmt>,
}

/// A statement node.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    FunctionDef(Rc<FunctionDef>),
    /// `targets[0] = targets[1] = ... = value`
    Assign {
        targets: Vec<Target>,
        value: Expr,
    },
    AugAssign {
        target: Target,
        op: BinOpKind,
        value: Expr,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
    },
    /// `for target in iter: body`; the compiler only accepts `range(...)`
    /// iterables.
    For {
        target: Target,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Pass,
    Nonlocal(Vec<String>),
    Global(Vec<String>),
    /// Expression evaluated for effect (typically a call).
    Expr(Expr),
    /// Legacy print statement form.
    Print(Vec<Expr>),
    /// Rejected by the compiler.
    Import(String),
    /// Rejected by the compiler.
    ImportFrom(String),
    /// Rejected by the compiler.
    ClassDef(String),
}

/// Collect every function defined in `body`, at any block depth, without
/// descending into the bodies of the definitions themselves. Used to
/// pre-populate the function table before lowering begins.
pub fn harvest_functions(body: &[Stmt]) -> Vec<Rc<FunctionDef>> {
    let mut out = Vec::new();
    harvest_into(body, &mut out);
    out
}

fn harvest_into(body: &[Stmt], out: &mut Vec<Rc<FunctionDef>>) {
    for stmt in body {
        match stmt {
            Stmt::FunctionDef(def) => out.push(def.clone()),
            Stmt::If { body, orelse, .. } => {
                harvest_into(body, out);
                harvest_into(orelse, out);
            }
            Stmt::While { body, .. } | Stmt::For { body, .. } => {
                harvest_into(body, out);
            }
            _ => {}
        }
    }
}

/// Shorthand constructors for building trees by hand.
///
/// ```
/// use silica_thread::ast::build::*;
///
/// // x = x + 1
/// let stmt = assign(name_target("x"), bin(name("x"), Add, int(1)));
/// ```
pub mod build {
    pub use super::BinOpKind::*;
    pub use super::CmpOpKind;
    use super::*;

    pub fn int(n: i64) -> Expr {
        Expr::Num(Num::Int(n))
    }

    pub fn float(f: f64) -> Expr {
        Expr::Num(Num::Float(f))
    }

    pub fn string(s: &str) -> Expr {
        Expr::Str(s.to_string())
    }

    pub fn name(n: &str) -> Expr {
        Expr::Name(n.to_string())
    }

    pub fn attribute(value: Expr, attr: &str) -> Expr {
        Expr::Attribute {
            value: Box::new(value),
            attr: attr.to_string(),
        }
    }

    pub fn bin(left: Expr, op: BinOpKind, right: Expr) -> Expr {
        Expr::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOpKind, operand: Expr) -> Expr {
        Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn boolop(op: BoolOpKind, values: Vec<Expr>) -> Expr {
        Expr::BoolOp { op, values }
    }

    pub fn compare(left: Expr, op: CmpOpKind, right: Expr) -> Expr {
        Expr::Compare {
            left: Box::new(left),
            ops: vec![op],
            comparators: vec![right],
        }
    }

    pub fn if_exp(test: Expr, body: Expr, orelse: Expr) -> Expr {
        Expr::IfExp {
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        }
    }

    pub fn call(func: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            func: Box::new(name(func)),
            args,
            keywords: Vec::new(),
        }
    }

    pub fn call_kw(func: &str, args: Vec<Expr>, keywords: Vec<(&str, Expr)>) -> Expr {
        Expr::Call {
            func: Box::new(name(func)),
            args,
            keywords: keywords
                .into_iter()
                .map(|(arg, value)| Keyword {
                    arg: arg.to_string(),
                    value,
                })
                .collect(),
        }
    }

    pub fn method_call(recv: Expr, method: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            func: Box::new(attribute(recv, method)),
            args,
            keywords: Vec::new(),
        }
    }

    pub fn tuple(elts: Vec<Expr>) -> Expr {
        Expr::Tuple(elts)
    }

    pub fn name_target(n: &str) -> Target {
        Target::Name(n.to_string())
    }

    pub fn tuple_target(elts: Vec<Target>) -> Target {
        Target::Tuple(elts)
    }

    pub fn assign(target: Target, value: Expr) -> Stmt {
        Stmt::Assign {
            targets: vec![target],
            value,
        }
    }

    pub fn aug_assign(target: Target, op: BinOpKind, value: Expr) -> Stmt {
        Stmt::AugAssign { target, op, value }
    }

    pub fn if_stmt(test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Stmt {
        Stmt::If { test, body, orelse }
    }

    pub fn while_stmt(test: Expr, body: Vec<Stmt>) -> Stmt {
        Stmt::While { test, body }
    }

    pub fn for_range(target: &str, range_args: Vec<Expr>, body: Vec<Stmt>) -> Stmt {
        Stmt::For {
            target: name_target(target),
            iter: call("range", range_args),
            body,
        }
    }

    pub fn ret(value: Expr) -> Stmt {
        Stmt::Return(Some(value))
    }

    pub fn ret_none() -> Stmt {
        Stmt::Return(None)
    }

    pub fn expr_stmt(e: Expr) -> Stmt {
        Stmt::Expr(e)
    }

    pub fn func_def(name: &str, params: &[&str], body: Vec<Stmt>) -> Rc<FunctionDef> {
        Rc::new(FunctionDef {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            defaults: Vec::new(),
            body,
        })
    }

    pub fn func_def_defaults(
        name: &str,
        params: &[&str],
        defaults: Vec<Expr>,
        body: Vec<Stmt>,
    ) -> Rc<FunctionDef> {
        Rc::new(FunctionDef {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            defaults,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::build::*;
    use super::*;

    #[test]
    fn test_target_names_flatten_nested_tuples() {
        let t = Target::Tuple(vec![
            Target::Name("a".to_string()),
            Target::Tuple(vec![
                Target::Name("b".to_string()),
                Target::Name("c".to_string()),
            ]),
        ]);
        assert_eq!(t.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_harvest_finds_nested_block_definitions() {
        let inner = func_def("inner", &[], vec![Stmt::Pass]);
        let top = func_def("top", &[], vec![Stmt::Pass]);
        let body = vec![
            Stmt::FunctionDef(top),
            if_stmt(
                int(1),
                vec![Stmt::FunctionDef(inner)],
                vec![],
            ),
        ];
        let funcs = harvest_functions(&body);
        let names: Vec<&str> = funcs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["top", "inner"]);
    }

    #[test]
    fn test_harvest_does_not_descend_into_function_bodies() {
        let nested = func_def("nested", &[], vec![Stmt::Pass]);
        let outer = func_def("outer", &[], vec![Stmt::FunctionDef(nested)]);
        let funcs = harvest_functions(&[Stmt::FunctionDef(outer)]);
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "outer");
    }
}
