//! Nested scope frames for the lowering visitor.
//!
//! One frame per lexical scope: the bodies of `if`/`while`/`for` blocks
//! push plain frames, inlined function calls push `Call` frames. Frames
//! form a tree kept alive for the whole synthesis; `pop` only moves the
//! current pointer back to the parent. Variable and function lookup walks
//! the active chain, current frame to root.
//!
//! Frames also carry the backpatching state for structured jumps: the FSM
//! states occupied by `break`, `continue` and `return` statements whose
//! targets do not exist yet. A patch registers on the frame where the
//! statement occurs. The skip cascade consults only the current frame, so
//! it ends exactly where the jump's block ends. Draining is a subtree
//! operation: a loop collects the patches registered anywhere inside its
//! just-closed body, an inlined call collects the returns registered
//! anywhere below its (still current) call frame.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use silica_rtl::{Expr, RegId};

use crate::ast::FunctionDef;
use crate::value::Value;

/// What kind of construct a frame belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameKind {
    /// A block body (`if`/`while`/`for`) or the toplevel.
    #[default]
    Block,
    /// An inlined function call; bounds return patches and the return
    /// variable slot.
    Call,
}

/// A register assignment logged during lowering, for downstream
/// introspection.
#[derive(Clone, Debug, PartialEq)]
pub struct BindRecord {
    pub state: usize,
    pub name: Option<String>,
    pub value: Expr,
    pub cond: Option<Expr>,
}

#[derive(Debug, Default)]
struct ScopeFrame {
    parent: Option<usize>,
    label: Option<String>,
    kind: FrameKind,
    variables: HashMap<String, Value>,
    functions: HashMap<String, Rc<FunctionDef>>,
    nonlocals: HashSet<String>,
    globals: HashSet<String>,
    breaks: Vec<usize>,
    continues: Vec<usize>,
    returns: Vec<(usize, Option<Expr>)>,
    return_variable: Option<RegId>,
}

/// The scope frame tree plus the cursor into it.
#[derive(Debug)]
pub struct ScopeFrameList {
    frames: Vec<ScopeFrame>,
    current: usize,
    /// Frame closed by the most recent `pop`; the root of the subtree a
    /// loop drains.
    last_popped: Option<usize>,
    binds: Vec<BindRecord>,
}

impl Default for ScopeFrameList {
    fn default() -> ScopeFrameList {
        ScopeFrameList::new()
    }
}

impl ScopeFrameList {
    /// Create the tree with its toplevel frame.
    pub fn new() -> ScopeFrameList {
        let top = ScopeFrame {
            label: Some("_top".to_string()),
            ..ScopeFrame::default()
        };
        ScopeFrameList {
            frames: vec![top],
            current: 0,
            last_popped: None,
            binds: Vec::new(),
        }
    }

    pub fn push(&mut self, label: Option<&str>, kind: FrameKind) {
        tracing::trace!(label = label.unwrap_or(""), ?kind, "push scope frame");
        let frame = ScopeFrame {
            parent: Some(self.current),
            label: label.map(str::to_string),
            kind,
            ..ScopeFrame::default()
        };
        self.frames.push(frame);
        self.current = self.frames.len() - 1;
    }

    /// Close the current frame. The frame stays in the tree so patches
    /// registered inside it remain drainable.
    pub fn pop(&mut self) {
        let Some(parent) = self.frames[self.current].parent else {
            debug_assert!(false, "scope underflow");
            return;
        };
        tracing::trace!(
            label = self.frames[self.current].label.as_deref().unwrap_or(""),
            "pop scope frame"
        );
        self.last_popped = Some(self.current);
        self.current = parent;
    }

    fn current_frame(&self) -> &ScopeFrame {
        &self.frames[self.current]
    }

    fn current_frame_mut(&mut self) -> &mut ScopeFrame {
        &mut self.frames[self.current]
    }

    /// Frame indices of the active chain, current first.
    fn active_chain(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(self.current), |&i| self.frames[i].parent)
    }

    fn is_within(&self, frame: usize, root: usize) -> bool {
        std::iter::successors(Some(frame), |&i| self.frames[i].parent).any(|i| i == root)
    }

    /// Frame indices in the subtree rooted at `root` (inclusive).
    fn subtree(&self, root: usize) -> Vec<usize> {
        (0..self.frames.len())
            .filter(|&i| self.is_within(i, root))
            .collect()
    }

    // ----- variables --------------------------------------------------

    /// Look a name up along the active chain.
    pub fn search_variable(&self, name: &str) -> Option<&Value> {
        self.active_chain()
            .find_map(|i| self.frames[i].variables.get(name))
    }

    /// Bind a name. Plain bindings go into the current frame; names
    /// declared `nonlocal` resolve to the nearest enclosing frame that
    /// already binds them (or the immediate parent), names declared
    /// `global` resolve to the toplevel frame.
    pub fn add_variable(&mut self, name: &str, value: Value) {
        if self.current_frame().globals.contains(name) {
            self.frames[0].variables.insert(name.to_string(), value);
            return;
        }
        if self.current_frame().nonlocals.contains(name) {
            let enclosing: Vec<usize> = self.active_chain().skip(1).collect();
            let slot = enclosing
                .iter()
                .copied()
                .find(|&i| self.frames[i].variables.contains_key(name))
                .or_else(|| enclosing.first().copied())
                .unwrap_or(0);
            self.frames[slot].variables.insert(name.to_string(), value);
            return;
        }
        self.current_frame_mut()
            .variables
            .insert(name.to_string(), value);
    }

    pub fn add_nonlocal(&mut self, name: &str) {
        self.current_frame_mut().nonlocals.insert(name.to_string());
    }

    pub fn add_global(&mut self, name: &str) {
        self.current_frame_mut().globals.insert(name.to_string());
    }

    // ----- functions --------------------------------------------------

    pub fn add_function(&mut self, func: Rc<FunctionDef>) {
        self.current_frame_mut()
            .functions
            .insert(func.name.clone(), func);
    }

    pub fn search_function(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.active_chain()
            .find_map(|i| self.frames[i].functions.get(name).cloned())
    }

    // ----- jump patches -----------------------------------------------

    pub fn add_break(&mut self, state: usize) {
        self.current_frame_mut().breaks.push(state);
    }

    pub fn add_continue(&mut self, state: usize) {
        self.current_frame_mut().continues.push(state);
    }

    pub fn add_return(&mut self, state: usize, value: Option<Expr>) {
        self.current_frame_mut().returns.push((state, value));
    }

    /// Outstanding `break` in the current block. Only the current frame
    /// counts: the skip cascade must end where the block ends.
    pub fn has_break(&self) -> bool {
        !self.current_frame().breaks.is_empty()
    }

    pub fn has_continue(&self) -> bool {
        !self.current_frame().continues.is_empty()
    }

    pub fn has_return(&self) -> bool {
        !self.current_frame().returns.is_empty()
    }

    /// Break patches registered anywhere inside the block that most
    /// recently closed. Called by a loop right after popping its body.
    pub fn unresolved_breaks(&self) -> Vec<usize> {
        let Some(root) = self.last_popped else {
            return Vec::new();
        };
        self.subtree(root)
            .into_iter()
            .flat_map(|i| self.frames[i].breaks.iter().copied())
            .collect()
    }

    pub fn unresolved_continues(&self) -> Vec<usize> {
        let Some(root) = self.last_popped else {
            return Vec::new();
        };
        self.subtree(root)
            .into_iter()
            .flat_map(|i| self.frames[i].continues.iter().copied())
            .collect()
    }

    /// Return patches registered anywhere below the current (call) frame.
    /// Called by call lowering before the call frame pops.
    pub fn unresolved_returns(&self) -> Vec<(usize, Option<Expr>)> {
        self.subtree(self.current)
            .into_iter()
            .flat_map(|i| self.frames[i].returns.iter().cloned())
            .collect()
    }

    pub fn clear_breaks(&mut self) {
        if let Some(root) = self.last_popped {
            for i in self.subtree(root) {
                self.frames[i].breaks.clear();
            }
        }
    }

    pub fn clear_continues(&mut self) {
        if let Some(root) = self.last_popped {
            for i in self.subtree(root) {
                self.frames[i].continues.clear();
            }
        }
    }

    pub fn clear_returns(&mut self) {
        for i in self.subtree(self.current) {
            self.frames[i].returns.clear();
        }
    }

    // ----- return variable --------------------------------------------

    fn innermost_call_index(&self) -> Option<usize> {
        self.active_chain()
            .find(|&i| self.frames[i].kind == FrameKind::Call)
    }

    /// Record the register that carries this call's return value, on the
    /// innermost call frame.
    pub fn set_return_variable(&mut self, reg: RegId) {
        if let Some(i) = self.innermost_call_index() {
            self.frames[i].return_variable = Some(reg);
        }
    }

    /// The return register of the innermost call frame, if one has been
    /// allocated. The search stops at the call boundary so an outer
    /// call's register is never visible.
    pub fn return_variable(&self) -> Option<RegId> {
        for i in self.active_chain() {
            if let Some(reg) = self.frames[i].return_variable {
                return Some(reg);
            }
            if self.frames[i].kind == FrameKind::Call {
                return None;
            }
        }
        None
    }

    pub fn clear_return_variable(&mut self) {
        if let Some(i) = self.innermost_call_index() {
            self.frames[i].return_variable = None;
        }
    }

    // ----- bind log ---------------------------------------------------

    pub fn add_bind(
        &mut self,
        state: usize,
        name: Option<String>,
        value: Expr,
        cond: Option<Expr>,
    ) {
        self.binds.push(BindRecord {
            state,
            name,
            value,
            cond,
        });
    }

    pub fn binds(&self) -> &[BindRecord] {
        &self.binds
    }

    pub fn take_binds(&mut self) -> Vec<BindRecord> {
        std::mem::take(&mut self.binds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::func_def;

    #[test]
    fn test_inner_binding_shadows_outer() {
        let mut scope = ScopeFrameList::new();
        scope.add_variable("x", Value::Expr(Expr::Reg(RegId(0))));
        scope.push(None, FrameKind::Block);
        scope.add_variable("x", Value::Expr(Expr::Reg(RegId(1))));
        match scope.search_variable("x") {
            Some(Value::Expr(Expr::Reg(id))) => assert_eq!(*id, RegId(1)),
            other => panic!("unexpected binding: {:?}", other),
        }
        scope.pop();
        match scope.search_variable("x") {
            Some(Value::Expr(Expr::Reg(id))) => assert_eq!(*id, RegId(0)),
            other => panic!("unexpected binding: {:?}", other),
        }
    }

    #[test]
    fn test_global_binds_into_toplevel_frame() {
        let mut scope = ScopeFrameList::new();
        scope.push(None, FrameKind::Call);
        scope.push(None, FrameKind::Block);
        scope.add_global("g");
        scope.add_variable("g", Value::Expr(Expr::Reg(RegId(3))));
        scope.pop();
        scope.pop();
        assert!(scope.search_variable("g").is_some());
    }

    #[test]
    fn test_nonlocal_rebinds_enclosing_frame() {
        let mut scope = ScopeFrameList::new();
        scope.push(None, FrameKind::Call);
        scope.add_variable("n", Value::Expr(Expr::Reg(RegId(0))));
        scope.push(None, FrameKind::Block);
        scope.add_nonlocal("n");
        scope.add_variable("n", Value::Expr(Expr::Reg(RegId(9))));
        scope.pop();
        match scope.search_variable("n") {
            Some(Value::Expr(Expr::Reg(id))) => assert_eq!(*id, RegId(9)),
            other => panic!("unexpected binding: {:?}", other),
        }
    }

    #[test]
    fn test_skip_visibility_ends_with_the_block() {
        let mut scope = ScopeFrameList::new();
        scope.push(Some("while"), FrameKind::Block);
        scope.push(Some("if"), FrameKind::Block);
        scope.add_break(4);
        // visible inside the block that issued the break
        assert!(scope.has_break());
        scope.pop();
        // not visible from the parent block; the skip cascade has ended
        assert!(!scope.has_break());
    }

    #[test]
    fn test_loop_drain_collects_the_closed_body_subtree() {
        let mut scope = ScopeFrameList::new();
        scope.push(Some("while"), FrameKind::Block);
        scope.push(Some("if"), FrameKind::Block);
        scope.add_break(4);
        scope.pop(); // if body
        scope.pop(); // while body
        assert_eq!(scope.unresolved_breaks(), vec![4]);
        scope.clear_breaks();
        assert!(scope.unresolved_breaks().is_empty());
    }

    #[test]
    fn test_loop_drain_ignores_patches_outside_its_body() {
        let mut scope = ScopeFrameList::new();
        scope.push(Some("outer-while"), FrameKind::Block);
        scope.add_break(7); // break belonging to the outer loop
        scope.push(Some("inner-while"), FrameKind::Block);
        scope.pop(); // inner body closes empty
        assert!(scope.unresolved_breaks().is_empty());
        scope.pop(); // outer body closes
        assert_eq!(scope.unresolved_breaks(), vec![7]);
    }

    #[test]
    fn test_return_drain_reads_below_current_call_frame() {
        let mut scope = ScopeFrameList::new();
        scope.push(Some("f"), FrameKind::Call);
        scope.push(Some("if"), FrameKind::Block);
        scope.add_return(2, None);
        scope.pop();
        scope.add_return(3, None);
        // current frame shows only its own patch to the skip cascade,
        // the drain sees both
        assert!(scope.has_return());
        let states: Vec<usize> = scope.unresolved_returns().iter().map(|r| r.0).collect();
        assert_eq!(states, vec![3, 2]);
        scope.clear_returns();
        assert!(scope.unresolved_returns().is_empty());
    }

    #[test]
    fn test_return_variable_scoped_to_call_frame() {
        let mut scope = ScopeFrameList::new();
        scope.push(Some("outer"), FrameKind::Call);
        scope.set_return_variable(RegId(1));
        scope.push(Some("inner"), FrameKind::Call);
        assert_eq!(scope.return_variable(), None);
        scope.set_return_variable(RegId(2));
        assert_eq!(scope.return_variable(), Some(RegId(2)));
        scope.clear_return_variable();
        scope.pop();
        assert_eq!(scope.return_variable(), Some(RegId(1)));
    }

    #[test]
    fn test_function_lookup_walks_active_chain() {
        let mut scope = ScopeFrameList::new();
        scope.add_function(func_def("f", &[], vec![crate::ast::Stmt::Pass]));
        scope.push(None, FrameKind::Call);
        assert!(scope.search_function("f").is_some());
        assert!(scope.search_function("g").is_none());
    }
}
