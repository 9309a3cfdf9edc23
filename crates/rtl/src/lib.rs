//! RTL intermediate representation for the Silica toolkit.
//!
//! This crate defines the in-memory hardware description objects the
//! rest of the toolkit emits into: expression nodes, clocked registers,
//! the module that owns them, and the `Fsm` sequential controller.
//!
//! Nothing here performs synthesis or pretty-printing. A `Module` is a
//! container of declarations; an [`Fsm`] is a transition table plus
//! per-state register assignments. Downstream emitters walk these
//! structures to produce Verilog or simulation models.

pub mod expr;
pub mod fsm;
pub mod module;

pub use expr::{BinaryOp, Expr, Stmt, UnaryOp};
pub use fsm::{Fsm, Transition};
pub use module::{Module, ModuleRef, PortDef, PortId, RegDef, RegId};
