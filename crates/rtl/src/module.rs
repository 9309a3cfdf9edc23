//! Hardware module: the container that owns register and port declarations.
//!
//! Registers are declared once and referenced everywhere else by [`RegId`],
//! an index into the module's declaration table. Handing out indices keeps
//! expression nodes `Copy`-cheap and makes declaration metadata (name,
//! width, initial value) available for inspection and later emission.

use std::cell::RefCell;
use std::rc::Rc;

/// Handle to a register declaration inside a [`Module`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegId(pub usize);

/// Handle to a port declaration inside a [`Module`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortId(pub usize);

/// A clocked register declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct RegDef {
    pub name: String,
    pub width: usize,
    pub initval: i64,
}

/// An input port declaration (clock, reset, external signals).
#[derive(Clone, Debug, PartialEq)]
pub struct PortDef {
    pub name: String,
}

/// A hardware module under construction.
///
/// Generators and FSMs all allocate into the same module during a
/// synthesis pass, so modules are shared as [`ModuleRef`].
#[derive(Debug)]
pub struct Module {
    name: String,
    regs: Vec<RegDef>,
    ports: Vec<PortDef>,
    tmp_count: usize,
}

/// Shared handle to a [`Module`]. Synthesis is single-threaded, so the
/// interior mutability never crosses a thread boundary.
pub type ModuleRef = Rc<RefCell<Module>>;

impl Module {
    pub fn new(name: &str) -> Module {
        Module {
            name: name.to_string(),
            regs: Vec::new(),
            ports: Vec::new(),
            tmp_count: 0,
        }
    }

    /// Create a module already wrapped in a shared handle.
    pub fn shared(name: &str) -> ModuleRef {
        Rc::new(RefCell::new(Module::new(name)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare an input port and return its handle.
    pub fn input(&mut self, name: &str) -> PortId {
        let id = PortId(self.ports.len());
        self.ports.push(PortDef {
            name: name.to_string(),
        });
        id
    }

    /// Declare a named register. Names must be unique within the module;
    /// generated names come from a monotonic counter, so a duplicate here
    /// indicates a front-end bug.
    pub fn reg(&mut self, name: &str, width: usize, initval: i64) -> RegId {
        debug_assert!(
            !self.regs.iter().any(|r| r.name == name),
            "duplicate register name: {}",
            name
        );
        let id = RegId(self.regs.len());
        self.regs.push(RegDef {
            name: name.to_string(),
            width,
            initval,
        });
        id
    }

    /// Declare an anonymous register with a module-unique generated name.
    pub fn tmp_reg(&mut self, width: usize, initval: i64) -> RegId {
        let name = format!("_tmp_{}", self.tmp_count);
        self.tmp_count += 1;
        self.reg(&name, width, initval)
    }

    pub fn reg_def(&self, id: RegId) -> &RegDef {
        &self.regs[id.0]
    }

    pub fn reg_name(&self, id: RegId) -> &str {
        &self.regs[id.0].name
    }

    pub fn regs(&self) -> &[RegDef] {
        &self.regs
    }

    pub fn ports(&self) -> &[PortDef] {
        &self.ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reg_declaration() {
        let mut m = Module::new("top");
        let clk = m.input("clk");
        let r = m.reg("counter", 8, 0);
        assert_eq!(m.reg_name(r), "counter");
        assert_eq!(m.reg_def(r).width, 8);
        assert_eq!(m.ports()[clk.0].name, "clk");
    }

    #[test]
    fn test_tmp_reg_names_are_unique() {
        let mut m = Module::new("top");
        let a = m.tmp_reg(4, 0);
        let b = m.tmp_reg(4, 0);
        assert_ne!(m.reg_name(a), m.reg_name(b));
    }

    #[test]
    fn test_shared_handle() {
        let m = Module::shared("top");
        let r = m.borrow_mut().reg("x", 32, 0);
        assert_eq!(m.borrow().reg_name(r), "x");
    }
}
