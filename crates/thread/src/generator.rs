//! Thread manager: the entry point of the compiler.
//!
//! A [`ThreadGenerator`] owns everything shared between the threads it
//! synthesizes into one hardware module: the function library, the
//! intrinsic registry, the name counter and the synthesis configuration.
//! `create` builds a fresh FSM from a target function; `extend` appends
//! to an existing one; the `run` and `sleep` intrinsics are available to
//! the procedural code itself for spawning child threads and stalling.
//!
//! Spawning installs the child handle's `wait` / `busy` methods into the
//! intrinsic registry under the handle's identity token, so the parent
//! thread can synchronize on the child by ordinary method-call syntax.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use silica_rtl::{Expr, Fsm, ModuleRef, PortId, RegId, Stmt as RtlStmt};

use crate::ast::{self, FunctionDef};
use crate::compile::Compiler;
use crate::config::SynthesisConfig;
use crate::error::CompileError;
use crate::intrinsics::{Intrinsic, IntrinsicRegistry};
use crate::scope::BindRecord;
use crate::value::{Environment, Value};

/// Monotonic counter seeding every generated unique name.
///
/// Owned by a generator rather than process-wide, so independent
/// compilations cannot couple through hidden state; `reset` exists so
/// tests can pin the emitted names.
#[derive(Debug, Default)]
pub struct NameGen {
    count: usize,
}

impl NameGen {
    pub fn new() -> NameGen {
        NameGen::default()
    }

    /// `prefix_N` with a fresh `N`.
    pub fn tmp_name(&mut self, prefix: &str) -> String {
        let v = self.count;
        self.count += 1;
        format!("{}_{}", prefix, v)
    }

    /// A fresh identity token (shares the name counter).
    pub fn token(&mut self) -> usize {
        let v = self.count;
        self.count += 1;
        v
    }

    /// Zero the counter. Only meaningful between independent syntheses;
    /// resetting mid-synthesis would allow name collisions.
    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Handle to a spawned child thread.
///
/// Carries what the parent needs to synchronize: the child's state
/// register and the state number the child ends in.
#[derive(Clone, Debug)]
pub struct ThreadInfo {
    name: String,
    token: usize,
    state_reg: RegId,
    end_state: usize,
}

impl ThreadInfo {
    fn new(fsm: &Fsm, token: usize) -> ThreadInfo {
        ThreadInfo {
            name: fsm.name().to_string(),
            token,
            state_reg: fsm.state_reg(),
            end_state: fsm.current(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity token keying this handle's method intrinsics.
    pub fn token(&self) -> usize {
        self.token
    }

    pub fn end_state(&self) -> usize {
        self.end_state
    }

    /// The child's state register as an expression.
    pub fn state(&self) -> Expr {
        Expr::Reg(self.state_reg)
    }

    /// True while the child has not reached its end state.
    pub fn busy_expr(&self) -> Expr {
        Expr::not_eq(self.state(), Expr::Int(self.end_state as i64))
    }

    /// True once the child has reached its end state.
    pub fn done_expr(&self) -> Expr {
        Expr::eq(self.state(), Expr::Int(self.end_state as i64))
    }
}

/// `th.wait()`: stall the calling thread until the child finishes.
struct WaitIntrinsic {
    info: ThreadInfo,
}

impl Intrinsic for WaitIntrinsic {
    fn name(&self) -> &str {
        "wait"
    }

    fn call(
        &self,
        _generator: &mut ThreadGenerator,
        fsm: &mut Fsm,
        _args: Vec<Value>,
        _kwargs: Vec<(String, Value)>,
    ) -> Result<Value, CompileError> {
        fsm.when(self.info.done_expr()).goto_next();
        Ok(Value::Expr(Expr::Int(0)))
    }
}

/// `th.busy()`: a boolean expression, no state cost.
struct BusyIntrinsic {
    info: ThreadInfo,
}

impl Intrinsic for BusyIntrinsic {
    fn name(&self) -> &str {
        "busy"
    }

    fn call(
        &self,
        _generator: &mut ThreadGenerator,
        _fsm: &mut Fsm,
        _args: Vec<Value>,
        _kwargs: Vec<(String, Value)>,
    ) -> Result<Value, CompileError> {
        Ok(Value::Expr(self.info.busy_expr()))
    }
}

/// `run(target, args...)`: spawn a child thread gated on the caller's
/// current state.
struct RunIntrinsic;

impl Intrinsic for RunIntrinsic {
    fn name(&self) -> &str {
        "run"
    }

    fn call(
        &self,
        generator: &mut ThreadGenerator,
        fsm: &mut Fsm,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, CompileError> {
        let mut args = args.into_iter();
        let target = match args.next() {
            Some(Value::Func(func)) => func,
            Some(other) => {
                return Err(CompileError::TypeMisuse(format!(
                    "run() requires a function, not {}",
                    other.kind_name()
                )))
            }
            None => {
                return Err(CompileError::TypeMisuse(
                    "run() requires a target function".to_string(),
                ))
            }
        };
        let rest: Vec<Value> = args.collect();
        generator
            .run_thread(fsm, &target, rest, kwargs)
            .map(Value::Thread)
    }
}

/// `sleep(cycles)`: hold the calling thread for a constant cycle count
/// using a dedicated counter register sized to the count.
struct SleepIntrinsic;

impl Intrinsic for SleepIntrinsic {
    fn name(&self) -> &str {
        "sleep"
    }

    fn call(
        &self,
        _generator: &mut ThreadGenerator,
        fsm: &mut Fsm,
        args: Vec<Value>,
        _kwargs: Vec<(String, Value)>,
    ) -> Result<Value, CompileError> {
        let cycles = match args.as_slice() {
            [Value::Expr(Expr::Int(n))] if *n >= 0 => *n,
            _ => {
                return Err(CompileError::TypeMisuse(
                    "sleep() requires a constant, non-negative cycle count".to_string(),
                ))
            }
        };
        let width = bit_length(cycles) + 1;
        let count = fsm.module().borrow_mut().tmp_reg(width, 0);
        fsm.add_statement(
            vec![RtlStmt::subst(
                count,
                Expr::plus(Expr::Reg(count), Expr::Int(1)),
            )],
            None,
        );
        fsm.when(Expr::eq(Expr::Reg(count), Expr::Int(cycles)))
            .goto_next();
        Ok(Value::Expr(Expr::Int(0)))
    }
}

fn bit_length(n: i64) -> usize {
    (64 - (n as u64).leading_zeros()) as usize
}

/// Loop bounds recorded during lowering, for downstream passes that need
/// to know which states form a loop and what drives the iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopInfo {
    pub iter: Option<Expr>,
    pub step: Option<Expr>,
}

/// Introspection record of one thread synthesis: every register
/// assignment and every loop, keyed by FSM state.
#[derive(Debug)]
pub struct SynthesisRecord {
    pub thread: String,
    pub binds: Vec<BindRecord>,
    pub loops: BTreeMap<(usize, usize), LoopInfo>,
}

impl SynthesisRecord {
    /// Loops whose state span contains `pos`.
    pub fn loops_containing(&self, pos: usize) -> Vec<(usize, usize)> {
        self.loops
            .keys()
            .copied()
            .filter(|&(begin, end)| begin <= pos && pos <= end)
            .collect()
    }
}

/// Builds thread FSMs inside one hardware module.
pub struct ThreadGenerator {
    module: ModuleRef,
    clk: PortId,
    rst: PortId,
    config: SynthesisConfig,
    function_lib: HashMap<String, Rc<FunctionDef>>,
    intrinsics: IntrinsicRegistry,
    globals: Environment,
    /// Environment captured at the latest `create`/`extend`, reused for
    /// child threads spawned with `run`.
    local_objects: Environment,
    names: NameGen,
    children: Vec<Fsm>,
    records: Vec<SynthesisRecord>,
}

impl ThreadGenerator {
    pub fn new(module: &ModuleRef, clk: PortId, rst: PortId) -> ThreadGenerator {
        ThreadGenerator::with_config(module, clk, rst, SynthesisConfig::default())
    }

    pub fn with_config(
        module: &ModuleRef,
        clk: PortId,
        rst: PortId,
        config: SynthesisConfig,
    ) -> ThreadGenerator {
        let mut intrinsics = IntrinsicRegistry::new();
        let builtins: [Rc<dyn Intrinsic>; 2] = [Rc::new(RunIntrinsic), Rc::new(SleepIntrinsic)];
        for builtin in builtins {
            let fresh = intrinsics.register_function(builtin);
            debug_assert!(fresh.is_ok());
        }
        ThreadGenerator {
            module: module.clone(),
            clk,
            rst,
            config,
            function_lib: HashMap::new(),
            intrinsics,
            globals: Environment::new(),
            local_objects: Environment::new(),
            names: NameGen::new(),
            children: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn module(&self) -> &ModuleRef {
        &self.module
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn datawidth(&self) -> usize {
        self.config.datawidth
    }

    pub fn intrinsics(&self) -> &IntrinsicRegistry {
        &self.intrinsics
    }

    pub(crate) fn names_mut(&mut self) -> &mut NameGen {
        &mut self.names
    }

    /// Zero the name counter; see [`NameGen::reset`].
    pub fn reset_names(&mut self) {
        self.names.reset();
    }

    /// Child FSMs spawned by `run`, in creation order.
    pub fn children(&self) -> &[Fsm] {
        &self.children
    }

    /// Introspection records, one per synthesized thread.
    pub fn records(&self) -> &[SynthesisRecord] {
        &self.records
    }

    /// Bind a module-level object visible to every thread.
    pub fn add_global_object(&mut self, name: &str, value: Value) {
        self.globals.insert(name, value);
    }

    pub(crate) fn global_object(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Register a function for later inlining. Registering a name twice
    /// is an error.
    pub fn add_function(&mut self, func: Rc<FunctionDef>) -> Result<(), CompileError> {
        if self.function_lib.contains_key(&func.name) {
            return Err(CompileError::DuplicateRegistration(func.name.clone()));
        }
        self.function_lib.insert(func.name.clone(), func);
        Ok(())
    }

    /// Harvest and register every function defined in `body`.
    pub fn add_functions(&mut self, body: &[ast::Stmt]) -> Result<(), CompileError> {
        for func in ast::harvest_functions(body) {
            self.add_function(func)?;
        }
        Ok(())
    }

    /// Register a host callable as an intrinsic. Registering a name twice
    /// is an error.
    pub fn intrinsic(&mut self, func: Rc<dyn Intrinsic>) -> Result<(), CompileError> {
        self.intrinsics.register_function(func)
    }

    pub fn add_intrinsics(
        &mut self,
        funcs: impl IntoIterator<Item = Rc<dyn Intrinsic>>,
    ) -> Result<(), CompileError> {
        for func in funcs {
            self.intrinsic(func)?;
        }
        Ok(())
    }

    /// Create a thread FSM: build a fresh machine and inline
    /// `target(args..., kwargs...)` into it. `env` is the caller's
    /// lexical environment; loads that miss every scope frame resolve
    /// through it.
    pub fn create(
        &mut self,
        name: &str,
        target: &Rc<FunctionDef>,
        args: &[Value],
        kwargs: &[(String, Value)],
        env: Environment,
    ) -> Result<Fsm, CompileError> {
        tracing::debug!(thread = name, entry = %target.name, "creating thread FSM");
        self.local_objects = env;
        let mut fsm = Fsm::new(&self.module, name, self.clk, self.rst);
        self.synthesize_fsm(&mut fsm, name, target, args.to_vec(), kwargs.to_vec())?;
        Ok(fsm)
    }

    /// Extend an existing thread FSM from its current state.
    pub fn extend(
        &mut self,
        fsm: &mut Fsm,
        target: &Rc<FunctionDef>,
        args: &[Value],
        kwargs: &[(String, Value)],
        env: Environment,
    ) -> Result<(), CompileError> {
        let name = fsm.name().to_string();
        tracing::debug!(thread = %name, entry = %target.name, "extending thread FSM");
        self.local_objects = env;
        self.synthesize_fsm(&mut *fsm, &name, target, args.to_vec(), kwargs.to_vec())
    }

    /// Spawn a child thread from inside a thread (the `run` intrinsic).
    /// The child's first transition is gated on the parent sitting in the
    /// state that issued the spawn.
    pub(crate) fn run_thread(
        &mut self,
        parent: &mut Fsm,
        target: &Rc<FunctionDef>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<ThreadInfo, CompileError> {
        let base = format!("{}_child_{}", parent.name(), target.name);
        let name = self.names.tmp_name(&base);
        tracing::debug!(thread = %name, parent = parent.name(), "spawning child thread");

        let mut child = Fsm::new(&self.module, &name, self.clk, self.rst);
        child
            .when(Expr::eq(
                parent.state(),
                Expr::Int(parent.current() as i64),
            ))
            .goto_next();

        self.synthesize_fsm(&mut child, &name, target, args, kwargs)?;

        let info = ThreadInfo::new(&child, self.names.token());
        self.intrinsics.register_method(
            info.token(),
            Rc::new(WaitIntrinsic { info: info.clone() }),
        )?;
        self.intrinsics.register_method(
            info.token(),
            Rc::new(BusyIntrinsic { info: info.clone() }),
        )?;
        self.children.push(child);
        Ok(info)
    }

    /// Inline `target(args..., kwargs...)` into `fsm`. Argument values
    /// enter through reserved environment keys so the whole call goes
    /// through the ordinary call-lowering path.
    fn synthesize_fsm(
        &mut self,
        fsm: &mut Fsm,
        name: &str,
        target: &Rc<FunctionDef>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<(), CompileError> {
        let mut functions: Vec<Rc<FunctionDef>> = self.function_lib.values().cloned().collect();
        if !self.function_lib.contains_key(&target.name) {
            functions.push(target.clone());
        }

        let mut env = self.local_objects.clone();
        let mut arg_keys = Vec::new();
        for (i, value) in args.into_iter().enumerate() {
            let key = format!("__arg_{}", i);
            env.insert(&key, value);
            arg_keys.push(key);
        }
        let mut kwargs = kwargs;
        kwargs.sort_by(|a, b| a.0.cmp(&b.0));
        let mut kwarg_keys = Vec::new();
        for (i, (arg, value)) in kwargs.into_iter().enumerate() {
            let key = format!("__kwarg_{}", i);
            env.insert(&key, value);
            kwarg_keys.push((arg, key));
        }

        let mut compiler = Compiler::new(self, fsm, name, functions, env);
        compiler.lower_entry_call(&target.name, &arg_keys, &kwarg_keys)?;
        let record = compiler.finish();
        self.records.push(record);
        Ok(())
    }
}
