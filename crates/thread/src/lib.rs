//! Thread-to-FSM compiler for the Silica toolkit.
//!
//! Lowers an imperative procedural description (variables, arithmetic,
//! conditionals, loops, function calls, early returns) into an explicit
//! finite-state machine whose transitions drive clocked register
//! assignments in the surrounding hardware module. One source statement
//! normally maps to exactly one state transition; no optimization or
//! scheduling is performed.
//!
//! # Example
//!
//! ```
//! use silica_rtl::{Expr, Module};
//! use silica_thread::ast::build::*;
//! use silica_thread::{Environment, ThreadGenerator, Value};
//!
//! let module = Module::shared("top");
//! let (clk, rst) = {
//!     let mut m = module.borrow_mut();
//!     (m.input("clk"), m.input("rst"))
//! };
//!
//! // def blink(n):
//! //     for i in range(n):
//! //         led = i
//! let blink = func_def(
//!     "blink",
//!     &["n"],
//!     vec![for_range(
//!         "i",
//!         vec![name("n")],
//!         vec![assign(name_target("led"), name("i"))],
//!     )],
//! );
//!
//! let mut generator = ThreadGenerator::new(&module, clk, rst);
//! let fsm = generator
//!     .create(
//!         "th_blink",
//!         &blink,
//!         &[Value::Expr(Expr::Int(8))],
//!         &[],
//!         Environment::new(),
//!     )
//!     .unwrap();
//! assert!(fsm.max_state() > 0);
//! ```
//!
//! Calls resolve in three ways: builtin shortcuts (`print`, `int`),
//! registered [`Intrinsic`]s (host callables with direct FSM access), and
//! eager inlining of registered or in-scope function definitions. The
//! `run` / `sleep` intrinsics and the `wait` / `busy` methods of spawned
//! thread handles cover cross-thread synchronization.

pub mod ast;
pub mod config;
pub mod error;
pub mod generator;
pub mod intrinsics;
pub mod operator;
pub mod scope;
pub mod value;

mod compile;

pub use config::SynthesisConfig;
pub use error::CompileError;
pub use generator::{LoopInfo, NameGen, SynthesisRecord, ThreadGenerator, ThreadInfo};
pub use intrinsics::{Intrinsic, IntrinsicRegistry};
pub use scope::{BindRecord, FrameKind, ScopeFrameList};
pub use value::{Environment, Value};
