//! The execution core of an embeddable WebAssembly runtime.
//!
//! kasm-interp compiles WebAssembly function bodies into a flat IR and runs
//! them on an untyped operand stack with an explicit call-frame stack,
//! following WebAssembly's numeric and trapping semantics exactly.
//!
//! # Modules
//!
//! - [`parser`] -- The in-memory [`parser::module::Module`] and code-byte decoding.
//! - [`ir`] -- The flat IR and the compiler that produces it.
//! - [`runtime`] -- Engine, code cache, call engine, instances and the store.
//! - [`listener`] -- Before/after call hooks and the logging listener.
//!
//! # Example
//!
//! Build a module, compile it, instantiate it and call an exported function:
//!
//! ```
//! use kasm_interp::parser::module::{Module, ValueType};
//! use kasm_interp::parser::opcode::*;
//! use kasm_interp::runtime::{CallContext, Engine, EngineConfig, Store, Value};
//!
//! let module = Module::builder("math")
//!     .func_type(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32])
//!     .function(0, vec![], vec![LOCAL_GET, 0, LOCAL_GET, 1, I32_ADD, END])
//!     .export_function("add", 0)
//!     .build();
//!
//! let engine = Engine::new(EngineConfig::default());
//! engine.compile_module(&module, None, false).unwrap();
//!
//! let mut store = Store::new(engine);
//! let instance = store.instantiate(&module, "math").unwrap();
//! let results = instance
//!     .call(&CallContext::new(), "add", &[Value::I32(2), Value::I32(3)])
//!     .unwrap();
//! assert_eq!(results, vec![Value::I32(5)]);
//! ```

pub mod ir;
pub mod listener;
pub mod parser;
pub mod runtime;
