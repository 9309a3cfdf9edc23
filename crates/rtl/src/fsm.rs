//! The FSM primitive: an integer-state sequential controller.
//!
//! An [`Fsm`] is built incrementally. `current()` names the state under
//! construction, `inc()` allocates the next one, and `goto_from` records
//! transitions between states that may not have been reached yet (front
//! ends backpatch jump targets once they are known). Register assignments
//! attach to the current state with `add_statement`.
//!
//! `when(cond).goto_next()` is the stall idiom: the machine stays in the
//! current state until `cond` holds, then advances. Without a pending
//! condition, `goto_next` is an unconditional advance.

use std::collections::BTreeMap;

use crate::expr::{Expr, Stmt};
use crate::module::{ModuleRef, PortId, RegId};

/// One entry in the transition table.
///
/// With no condition this is an unconditional jump. With a condition and
/// no `else_dst`, the machine holds in `src` until the condition is true.
/// With both, it is a two-target branch.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub src: usize,
    pub dst: usize,
    pub cond: Option<Expr>,
    pub else_dst: Option<usize>,
}

/// A finite-state machine under construction inside a module.
#[derive(Debug)]
pub struct Fsm {
    module: ModuleRef,
    name: String,
    clk: PortId,
    rst: PortId,
    state_reg: RegId,
    current: usize,
    max_state: usize,
    transitions: Vec<Transition>,
    body: BTreeMap<usize, Vec<(Option<Expr>, Vec<Stmt>)>>,
    pending: Option<Expr>,
}

impl Fsm {
    /// Create a machine named `name`, allocating its state register in
    /// `module`. State 0 is the reset state.
    pub fn new(module: &ModuleRef, name: &str, clk: PortId, rst: PortId) -> Fsm {
        let state_reg = module.borrow_mut().reg(name, 32, 0);
        Fsm {
            module: module.clone(),
            name: name.to_string(),
            clk,
            rst,
            state_reg,
            current: 0,
            max_state: 0,
            transitions: Vec::new(),
            body: BTreeMap::new(),
            pending: None,
        }
    }

    pub fn module(&self) -> &ModuleRef {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clk(&self) -> PortId {
        self.clk
    }

    pub fn rst(&self) -> PortId {
        self.rst
    }

    /// The state register, as an expression other machines may compare
    /// against.
    pub fn state(&self) -> Expr {
        Expr::Reg(self.state_reg)
    }

    pub fn state_reg(&self) -> RegId {
        self.state_reg
    }

    /// The state currently under construction.
    pub fn current(&self) -> usize {
        self.current
    }

    /// The highest state allocated so far.
    pub fn max_state(&self) -> usize {
        self.max_state
    }

    /// Allocate the next state and make it current.
    pub fn inc(&mut self) {
        self.current += 1;
        if self.current > self.max_state {
            self.max_state = self.current;
        }
    }

    /// Record a transition from `src` to `dst`. Unconditional when `cond`
    /// is `None`; a two-target branch when `else_dst` is given.
    pub fn goto_from(
        &mut self,
        src: usize,
        dst: usize,
        cond: Option<Expr>,
        else_dst: Option<usize>,
    ) {
        self.transitions.push(Transition {
            src,
            dst,
            cond,
            else_dst,
        });
    }

    /// Set a pending condition consumed by the next `goto_next`.
    pub fn when(&mut self, cond: Expr) -> &mut Fsm {
        self.pending = Some(cond);
        self
    }

    /// Advance to the next state, guarded by the pending condition if one
    /// was set with [`when`](Fsm::when).
    pub fn goto_next(&mut self) {
        let cond = self.pending.take();
        let src = self.current;
        self.goto_from(src, src + 1, cond, None);
        self.inc();
    }

    /// Attach statements to the current state, optionally guarded.
    pub fn add_statement(&mut self, stmts: Vec<Stmt>, cond: Option<Expr>) {
        self.body.entry(self.current).or_default().push((cond, stmts));
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Guarded statement groups attached to `state`.
    pub fn statements_at(&self, state: usize) -> &[(Option<Expr>, Vec<Stmt>)] {
        self.body.get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// States that have at least one attached statement, in order.
    pub fn states_with_statements(&self) -> impl Iterator<Item = usize> + '_ {
        self.body.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;

    fn fsm() -> Fsm {
        let m = Module::shared("top");
        let (clk, rst) = {
            let mut mm = m.borrow_mut();
            (mm.input("clk"), mm.input("rst"))
        };
        Fsm::new(&m, "ctrl", clk, rst)
    }

    #[test]
    fn test_inc_advances_current_and_max() {
        let mut f = fsm();
        assert_eq!(f.current(), 0);
        f.inc();
        f.inc();
        assert_eq!(f.current(), 2);
        assert_eq!(f.max_state(), 2);
    }

    #[test]
    fn test_goto_next_consumes_pending_condition() {
        let mut f = fsm();
        f.when(Expr::eq(Expr::Int(1), Expr::Int(1))).goto_next();
        assert_eq!(f.current(), 1);
        let t = &f.transitions()[0];
        assert_eq!((t.src, t.dst), (0, 1));
        assert!(t.cond.is_some());

        f.goto_next();
        let t = &f.transitions()[1];
        assert!(t.cond.is_none());
    }

    #[test]
    fn test_statements_attach_to_current_state() {
        let m = Module::shared("top");
        let (clk, rst) = {
            let mut mm = m.borrow_mut();
            (mm.input("clk"), mm.input("rst"))
        };
        let r = m.borrow_mut().reg("x", 32, 0);
        let mut f = Fsm::new(&m, "ctrl", clk, rst);
        f.inc();
        f.add_statement(vec![Stmt::subst(r, Expr::Int(5))], None);
        assert_eq!(f.statements_at(1).len(), 1);
        assert!(f.statements_at(0).is_empty());
    }
}
