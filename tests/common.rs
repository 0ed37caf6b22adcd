//! Common test utilities shared between integration tests

#![allow(dead_code)]

use kasm_interp::parser::module::Module;
use kasm_interp::runtime::{Engine, EngineConfig, ModuleInstance, Store};
use std::io::Write;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// Captured writer that stores output for testing
#[derive(Clone, Default)]
pub struct CapturedWriter(pub Arc<Mutex<Vec<u8>>>);

impl CapturedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn new_store() -> Store {
    Store::new(Engine::new(EngineConfig::default()))
}

/// Compile and instantiate `module` under its own name
pub fn instantiate(store: &mut Store, module: &Module) -> Rc<ModuleInstance> {
    store.engine().compile_module(module, None, false).unwrap();
    store.instantiate(module, module.name()).unwrap()
}
