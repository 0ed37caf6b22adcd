//! WebAssembly module instance
//!
//! An instance owns the mutable state its functions run against: linear
//! memory, the function table and globals. State is single-threaded
//! (`RefCell`/`Cell`) and borrowed only for the duration of one IR operation,
//! never across a call.

use super::call_engine::CallEngine;
use super::context::CallContext;
use super::engine::ModuleEngine;
use super::function::Function;
use super::memory::Memory;
use super::table::Table;
use super::{RuntimeError, Value};
use crate::parser::module::{ExportKind, FunctionType, ValueType};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A global variable of an instance
#[derive(Debug)]
pub struct GlobalInstance {
    value_type: ValueType,
    mutable: bool,
    value: Cell<u64>,
}

impl GlobalInstance {
    pub fn new(init: Value, mutable: bool) -> Self {
        GlobalInstance {
            value_type: init.typ(),
            mutable,
            value: Cell::new(init.to_word()),
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Raw word
    pub fn get(&self) -> u64 {
        self.value.get()
    }

    pub fn set(&self, word: u64) {
        self.value.set(word);
    }

    pub fn value(&self) -> Value {
        Value::from_word(self.value_type, self.value.get())
    }
}

pub struct ModuleInstance {
    name: String,
    engine: ModuleEngine,
    types: Vec<FunctionType>,
    memory: RefCell<Memory>,
    table: RefCell<Table>,
    globals: Vec<GlobalInstance>,
    exports: HashMap<String, ExportKind>,
    closed: Cell<bool>,
}

impl ModuleInstance {
    pub(crate) fn new(
        name: String,
        engine: ModuleEngine,
        types: Vec<FunctionType>,
        memory: Memory,
        table: Table,
        globals: Vec<GlobalInstance>,
        exports: HashMap<String, ExportKind>,
    ) -> Rc<Self> {
        let instance = Rc::new(ModuleInstance {
            name,
            engine,
            types,
            memory: RefCell::new(memory),
            table: RefCell::new(table),
            globals,
            exports,
            closed: Cell::new(false),
        });
        instance.engine.bind(&instance);
        instance
    }

    /// Name the instance is registered under in its store
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &ModuleEngine {
        &self.engine
    }

    pub fn func_type(&self, type_index: u32) -> Option<&FunctionType> {
        self.types.get(type_index as usize)
    }

    pub fn memory(&self) -> &RefCell<Memory> {
        &self.memory
    }

    pub fn table(&self) -> &RefCell<Table> {
        &self.table
    }

    pub fn global(&self, index: u32) -> Option<&GlobalInstance> {
        self.globals.get(index as usize)
    }

    pub fn global_count(&self) -> u32 {
        self.globals.len() as u32
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.set(true);
    }

    fn ensure_open(&self) -> Result<(), RuntimeError> {
        if self.is_closed() {
            return Err(RuntimeError::ModuleClosed(self.name.clone()));
        }
        Ok(())
    }

    pub fn exported_function(&self, name: &str) -> Result<Rc<Function>, RuntimeError> {
        match self.exports.get(name) {
            Some(ExportKind::Function(index)) => self
                .engine
                .function(*index)
                .cloned()
                .ok_or_else(|| RuntimeError::UnknownExport(name.to_string())),
            _ => Err(RuntimeError::UnknownExport(name.to_string())),
        }
    }

    pub fn exported_global(&self, name: &str) -> Result<Value, RuntimeError> {
        match self.exports.get(name) {
            Some(ExportKind::Global(index)) => self
                .global(*index)
                .map(GlobalInstance::value)
                .ok_or_else(|| RuntimeError::UnknownExport(name.to_string())),
            _ => Err(RuntimeError::UnknownExport(name.to_string())),
        }
    }

    /// Invoke the exported function `name` with typed arguments
    pub fn call(&self, ctx: &CallContext, name: &str, args: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        self.ensure_open()?;
        let function = self.exported_function(name)?;
        let func_type = function.func_type();
        if args.len() != func_type.params.len() {
            return Err(RuntimeError::InvalidArguments {
                expected: func_type.params.len(),
                actual: args.len(),
            });
        }
        for (arg, expected) in args.iter().zip(&func_type.params) {
            if arg.typ() != *expected {
                return Err(RuntimeError::TypeMismatch {
                    expected: expected.to_string(),
                    actual: arg.typ().to_string(),
                });
            }
        }

        let params: Vec<u64> = args.iter().map(Value::to_word).collect();
        let results = self.engine.call(ctx, &function, &params)?;
        Ok(Value::from_words(&func_type.results, &results))
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("name", &self.name)
            .field("functions", &self.engine.function_count())
            .field("memory_pages", &self.memory.borrow().size())
            .field("globals", &self.globals.len())
            .field("closed", &self.closed.get())
            .finish()
    }
}

/// What a host function sees of its caller
///
/// Gives access to the call context, the calling instance's memory and its
/// exports. Calls made through [`Caller::call`] run in a fresh call engine
/// nested one level below the host function.
pub struct Caller<'a> {
    ctx: &'a CallContext,
    instance: Option<Rc<ModuleInstance>>,
    /// Frames still available to nested calls
    ceiling: usize,
    reentry_limit: usize,
}

impl<'a> Caller<'a> {
    pub(crate) fn new(
        ctx: &'a CallContext,
        instance: Option<Rc<ModuleInstance>>,
        ceiling: usize,
        reentry_limit: usize,
    ) -> Self {
        Caller {
            ctx,
            instance,
            ceiling,
            reentry_limit,
        }
    }

    pub fn context(&self) -> &CallContext {
        self.ctx
    }

    /// The calling module instance, absent when the host function was called directly
    pub fn instance(&self) -> Option<&Rc<ModuleInstance>> {
        self.instance.as_ref()
    }

    fn require_instance(&self) -> Result<&Rc<ModuleInstance>, RuntimeError> {
        self.instance
            .as_ref()
            .ok_or_else(|| RuntimeError::Host("host function has no calling instance".to_string()))
    }

    pub fn read_memory(&self, addr: u32, len: usize) -> Result<Vec<u8>, RuntimeError> {
        self.require_instance()?.memory().borrow().read_bytes(addr, len)
    }

    pub fn write_memory(&mut self, addr: u32, bytes: &[u8]) -> Result<(), RuntimeError> {
        self.require_instance()?.memory().borrow_mut().write_bytes(addr, bytes)
    }

    /// Call an export of the calling instance with raw words
    ///
    /// Each nested call runs on the native stack, so the number of host
    /// functions calling back in at once is bounded; going past the bound
    /// fails with `StackOverflow`.
    pub fn call(&mut self, name: &str, params: &[u64]) -> Result<Vec<u64>, RuntimeError> {
        if self.ctx.reentries() >= self.reentry_limit {
            return Err(RuntimeError::StackOverflow);
        }
        let instance = self.require_instance()?;
        instance.ensure_open()?;
        let function = instance.exported_function(name)?;
        CallEngine::new(self.ceiling)
            .with_reentry_limit(self.reentry_limit)
            .call(&self.ctx.reentered(), &function, params)
    }
}
