//! Loading synthesis configuration from a TOML file.

use std::io::Write as _;

use silica_rtl::{Expr, Module};
use silica_thread::ast::build::*;
use silica_thread::{Environment, SynthesisConfig, ThreadGenerator, Value};

#[test]
fn test_config_round_trip_through_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "datawidth = 16").unwrap();
    writeln!(file, "prefix = \"_proc\"").unwrap();

    let config = SynthesisConfig::from_path(file.path()).unwrap();
    assert_eq!(config.datawidth, 16);
    assert_eq!(config.prefix, "_proc");
}

#[test]
fn test_config_shapes_generated_registers() {
    let config = SynthesisConfig::new().with_datawidth(16).with_prefix("_proc");

    let module = Module::shared("top");
    let (clk, rst) = {
        let mut m = module.borrow_mut();
        (m.input("CLK"), m.input("RST"))
    };

    let f = func_def("f", &["a"], vec![assign(name_target("x"), name("a"))]);
    let mut generator = ThreadGenerator::with_config(&module, clk, rst, config);
    generator
        .create(
            "th",
            &f,
            &[Value::Expr(Expr::Int(3))],
            &[],
            Environment::new(),
        )
        .unwrap();

    let m = module.borrow();
    let x = m
        .regs()
        .iter()
        .find(|r| r.name.contains("_x_"))
        .expect("x register");
    assert!(x.name.starts_with("_proc_th_x"));
    assert_eq!(x.width, 16);
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "datawidth = \"wide\"").unwrap();
    let err = SynthesisConfig::from_path(file.path()).unwrap_err();
    assert!(err.contains("invalid synthesis config"));
}
