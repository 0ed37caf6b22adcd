//! Engine and per-module engines
//!
//! The [`Engine`] compiles modules into the shared [`CodeCache`] and builds a
//! [`ModuleEngine`] for each instance from the cached bodies. Compilation is
//! all-or-nothing per module; instantiation never compiles implicitly.

use super::call_engine::CallEngine;
use super::code_cache::{CodeCache, Codes, CompiledCode};
use super::context::CallContext;
use super::function::Function;
use super::instance::ModuleInstance;
use super::table::Table;
use super::RuntimeError;
use crate::ir::compiler::{compile_function, CompileError};
use crate::listener::{FunctionListenerFactory, LogScopes, LoggingListenerFactory};
use crate::parser::module::{Code, FunctionType, Module, ModuleId};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;

pub const DEFAULT_CALL_STACK_CEILING: usize = 2000;
/// Host calls back into WebAssembly each nest a call engine on the native stack
pub const DEFAULT_MAX_HOST_REENTRY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of WebAssembly frames in one invocation
    pub call_stack_ceiling: usize,
    /// Maximum nesting of host functions calling back into WebAssembly
    pub max_host_reentry: usize,
    /// Scopes used by [`Engine::logging_listener`]
    pub log_scopes: LogScopes,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            call_stack_ceiling: DEFAULT_CALL_STACK_CEILING,
            max_host_reentry: DEFAULT_MAX_HOST_REENTRY,
            log_scopes: LogScopes::ALL,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON config; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
    codes: CodeCache,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            config,
            codes: CodeCache::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A call trace listener filtered by the configured log scopes
    pub fn logging_listener<W: Write + Send + 'static>(&self, writer: W) -> LoggingListenerFactory {
        LoggingListenerFactory::with_scopes(writer, self.config.log_scopes)
    }

    /// Compile every function defined by `module` and cache the result
    ///
    /// Any failing function aborts the whole module, leaving the cache
    /// untouched. A module already in the cache is not compiled again, and
    /// keeps the listeners it was first compiled with.
    pub fn compile_module(
        &self,
        module: &Module,
        listeners: Option<&dyn FunctionListenerFactory>,
        compile_for_debug: bool,
    ) -> Result<(), CompileError> {
        let id = module.id();
        if self.codes.contains(&id) {
            log::trace!("module {} ({id:?}) already compiled", module.name());
            return Ok(());
        }

        log::debug!("compiling module {} ({id:?})", module.name());
        let imported = module.import_function_count();
        let mut codes = Vec::with_capacity(module.code().len());
        for (i, code) in module.code().iter().enumerate() {
            let index = imported + i as u32;
            let definition = module.function_definition(index).ok_or_else(|| CompileError::Function {
                function: index,
                cause: "unknown function type".to_string(),
            })?;
            let compiled = match code {
                Code::Wasm { locals, body } => {
                    let body = compile_function(module, index, locals, body, compile_for_debug)?;
                    CompiledCode::wasm(definition.clone(), body, locals.len())
                }
                Code::Host(host) => CompiledCode::host(definition.clone(), host.clone()),
            };
            let listener = listeners.and_then(|factory| factory.new_listener(&definition));
            codes.push(Arc::new(compiled.with_listener(listener)));
        }

        log::debug!("compiled {} functions of module {}", codes.len(), module.name());
        self.add_codes(id, codes);
        Ok(())
    }

    /// Install a complete set of compiled bodies; an existing entry is kept
    pub fn add_codes(&self, id: ModuleId, codes: Vec<Arc<CompiledCode>>) -> bool {
        let added = self.codes.add(id, codes);
        if added {
            log::trace!("code cache add {id:?}");
        }
        added
    }

    pub fn get_codes(&self, id: &ModuleId) -> Option<Codes> {
        self.codes.get(id)
    }

    pub fn delete_codes(&self, id: &ModuleId) -> bool {
        let deleted = self.codes.delete(id);
        if deleted {
            log::trace!("code cache evict {id:?}");
        }
        deleted
    }

    pub fn delete_compiled_module(&self, module: &Module) -> bool {
        self.delete_codes(&module.id())
    }

    pub fn compiled_module_count(&self) -> usize {
        self.codes.len()
    }

    /// Build the function index space of one instance of `module`
    ///
    /// `imported_functions` are the resolved imports, in import order.
    pub fn new_module_engine(
        &self,
        module: &Module,
        imported_functions: Vec<Rc<Function>>,
    ) -> Result<ModuleEngine, RuntimeError> {
        let codes = self.get_codes(&module.id()).ok_or(RuntimeError::UncompiledModule)?;
        let import_count = imported_functions.len();
        let mut functions = imported_functions;
        functions.extend(codes.iter().map(|code| Function::new(code.clone())));
        Ok(ModuleEngine {
            name: module.name().to_string(),
            functions,
            import_count,
            ceiling: self.config.call_stack_ceiling,
            reentry_limit: self.config.max_host_reentry,
        })
    }

    pub fn new_call_engine(&self) -> CallEngine {
        CallEngine::new(self.config.call_stack_ceiling).with_reentry_limit(self.config.max_host_reentry)
    }
}

/// The function index space of one module instance
pub struct ModuleEngine {
    name: String,
    functions: Vec<Rc<Function>>,
    import_count: usize,
    ceiling: usize,
    reentry_limit: usize,
}

impl ModuleEngine {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self, index: u32) -> Option<&Rc<Function>> {
        self.functions.get(index as usize)
    }

    pub fn function_count(&self) -> u32 {
        self.functions.len() as u32
    }

    pub fn import_count(&self) -> usize {
        self.import_count
    }

    /// Attach the module's own functions to their instance; imports stay with their exporter
    pub(crate) fn bind(&self, instance: &Rc<ModuleInstance>) {
        for function in &self.functions[self.import_count..] {
            function.bind(instance);
        }
    }

    /// Run `function` to completion in a fresh call engine
    pub fn call(&self, ctx: &CallContext, function: &Rc<Function>, args: &[u64]) -> Result<Vec<u64>, RuntimeError> {
        CallEngine::new(self.ceiling)
            .with_reentry_limit(self.reentry_limit)
            .call(ctx, function, args)
    }

    /// Resolve a `call_indirect` target
    pub fn lookup_function(
        &self,
        table: &Table,
        expected_type: &FunctionType,
        index: u32,
    ) -> Result<Rc<Function>, RuntimeError> {
        let function = table
            .get(index)
            .ok_or(RuntimeError::IndexOutOfRange {
                index,
                size: table.size(),
            })?
            .ok_or(RuntimeError::UninitializedElement(index))?;
        if function.func_type() != expected_type {
            return Err(RuntimeError::TypeMismatch {
                expected: expected_type.to_string(),
                actual: function.func_type().to_string(),
            });
        }
        Ok(function.clone())
    }
}

impl std::fmt::Debug for ModuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleEngine")
            .field("name", &self.name)
            .field("functions", &self.functions.len())
            .field("imports", &self.import_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::ValueType;
    use crate::parser::opcode::{CALL, END};

    fn module_with_bodies(bodies: Vec<Vec<u8>>) -> Module {
        let mut builder = Module::builder("test").func_type(vec![], vec![]);
        for body in bodies {
            builder = builder.function(0, vec![], body);
        }
        builder.build()
    }

    #[test]
    fn test_compile_module_fails_whole_module() {
        let engine = Engine::default();
        let module = module_with_bodies(vec![vec![END], vec![END], vec![CALL]]);

        let err = engine.compile_module(&module, None, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "function[2]: handling call at offset 0: reading immediates: EOF"
        );
        assert!(engine.get_codes(&module.id()).is_none());
        assert_eq!(engine.compiled_module_count(), 0);
    }

    #[test]
    fn test_compile_module_ok() {
        let engine = Engine::default();
        let module = module_with_bodies(vec![vec![END]; 4]);

        engine.compile_module(&module, None, false).unwrap();
        assert_eq!(engine.get_codes(&module.id()).unwrap().len(), 4);

        // second compile is a no-op
        engine.compile_module(&module, None, false).unwrap();
        assert_eq!(engine.compiled_module_count(), 1);

        let module_engine = engine.new_module_engine(&module, vec![]).unwrap();
        assert_eq!(module_engine.function_count(), 4);
        assert_eq!(module_engine.import_count(), 0);
    }

    #[test]
    fn test_new_module_engine_requires_compile() {
        let engine = Engine::default();
        let module = module_with_bodies(vec![vec![END]]);
        let err = engine.new_module_engine(&module, vec![]).unwrap_err();
        assert_eq!(err, RuntimeError::UncompiledModule);
        assert_eq!(err.to_string(), "source module must be compiled before instantiation");
    }

    #[test]
    fn test_delete_compiled_module() {
        let engine = Engine::default();
        let module = module_with_bodies(vec![vec![END]]);
        engine.compile_module(&module, None, false).unwrap();
        let module_engine = engine.new_module_engine(&module, vec![]).unwrap();

        assert!(engine.delete_compiled_module(&module));
        assert!(!engine.delete_compiled_module(&module));
        assert!(engine.new_module_engine(&module, vec![]).is_err());
        // existing engines keep their bodies
        assert!(module_engine.function(0).is_some());
    }

    #[test]
    fn test_engine_clones_share_cache() {
        let engine = Engine::default();
        let clone = engine.clone();
        let module = module_with_bodies(vec![vec![END]]);
        engine.compile_module(&module, None, false).unwrap();
        assert!(clone.get_codes(&module.id()).is_some());
    }

    #[test]
    fn test_lookup_function() {
        let engine = Engine::default();
        let module = Module::builder("lookup")
            .func_type(vec![], vec![])
            .func_type(vec![ValueType::I32], vec![])
            .function(0, vec![], vec![END])
            .build();
        engine.compile_module(&module, None, false).unwrap();
        let module_engine = engine.new_module_engine(&module, vec![]).unwrap();
        let f = module_engine.function(0).unwrap().clone();

        let mut table = Table::new(2, None);
        table.set(0, Some(f.clone())).unwrap();
        let void = FunctionType::new(vec![], vec![]);
        let takes_i32 = FunctionType::new(vec![ValueType::I32], vec![]);

        assert!(Rc::ptr_eq(&module_engine.lookup_function(&table, &void, 0).unwrap(), &f));
        assert_eq!(
            module_engine.lookup_function(&table, &void, 2).unwrap_err(),
            RuntimeError::IndexOutOfRange { index: 2, size: 2 }
        );
        assert_eq!(
            module_engine.lookup_function(&table, &void, 1).unwrap_err(),
            RuntimeError::UninitializedElement(1)
        );
        assert!(matches!(
            module_engine.lookup_function(&table, &takes_i32, 0),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config = EngineConfig::from_json(r#"{"call_stack_ceiling": 16}"#).unwrap();
        assert_eq!(config.call_stack_ceiling, 16);
        assert_eq!(config.max_host_reentry, DEFAULT_MAX_HOST_REENTRY);
        assert_eq!(config.log_scopes, LogScopes::ALL);

        let config = EngineConfig::from_json(r#"{"log_scopes": "FILESYSTEM"}"#).unwrap();
        assert_eq!(config.call_stack_ceiling, DEFAULT_CALL_STACK_CEILING);
        assert_eq!(config.log_scopes, LogScopes::FILESYSTEM);

        assert!(EngineConfig::from_json("[").is_err());
    }
}
