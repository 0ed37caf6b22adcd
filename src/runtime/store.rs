//! Instantiation and the registry of live module instances
//!
//! A `Store` resolves a module's function imports against the exports of
//! instances it already holds, allocates the new instance's memory, table
//! and globals, applies element and data segments and registers the
//! instance under a name other modules can import from.

use super::engine::Engine;
use super::function::Function;
use super::instance::{GlobalInstance, ModuleInstance};
use super::memory::Memory;
use super::table::Table;
use super::RuntimeError;
use crate::parser::module::Module;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct Store {
    engine: Engine,
    modules: HashMap<String, Rc<ModuleInstance>>,
}

impl Store {
    pub fn new(engine: Engine) -> Self {
        Store {
            engine,
            modules: HashMap::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn module(&self, name: &str) -> Option<Rc<ModuleInstance>> {
        self.modules.get(name).cloned()
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Instantiate a compiled module and register it as `name`
    pub fn instantiate(&mut self, module: &Module, name: &str) -> Result<Rc<ModuleInstance>, RuntimeError> {
        if self.modules.contains_key(name) {
            return Err(RuntimeError::DuplicateModule(name.to_string()));
        }

        let imported = self.resolve_imports(module)?;
        let engine = self.engine.new_module_engine(module, imported)?;

        let (min, max) = match module.memory() {
            Some(limits) => (limits.min, limits.max),
            None => (0, Some(0)),
        };
        let mut memory = Memory::new(min, max)?;
        let mut table = match module.table() {
            Some(limits) => Table::new(limits.min, limits.max),
            None => Table::new(0, Some(0)),
        };

        // segments are checked up front so a failed instantiation has no partial effects
        let mut elements = Vec::with_capacity(module.elements().len());
        for segment in module.elements() {
            let functions = segment
                .functions
                .iter()
                .map(|index| {
                    engine.function(*index).cloned().ok_or_else(|| {
                        RuntimeError::InvalidSegment(format!("element segment references unknown function {index}"))
                    })
                })
                .collect::<Result<Vec<Rc<Function>>, _>>()?;
            let end = segment.offset as u64 + functions.len() as u64;
            if end > table.size() as u64 {
                return Err(RuntimeError::InvalidSegment(format!(
                    "element segment [{}, {end}) exceeds table size {}",
                    segment.offset,
                    table.size()
                )));
            }
            elements.push((segment.offset, functions));
        }
        for segment in module.data() {
            let end = segment.offset as u64 + segment.bytes.len() as u64;
            if end > memory.len() as u64 {
                return Err(RuntimeError::InvalidSegment(format!(
                    "data segment [{}, {end}) exceeds memory size {}",
                    segment.offset,
                    memory.len()
                )));
            }
        }
        for (offset, functions) in &elements {
            table.init(*offset, functions)?;
        }
        for segment in module.data() {
            memory.write_bytes(segment.offset, &segment.bytes)?;
        }

        let globals = module
            .globals()
            .iter()
            .map(|global| GlobalInstance::new(global.init, global.mutable))
            .collect();
        let exports = module
            .exports()
            .iter()
            .map(|export| (export.name.clone(), export.kind))
            .collect();

        let instance = ModuleInstance::new(
            name.to_string(),
            engine,
            module.types().to_vec(),
            memory,
            table,
            globals,
            exports,
        );
        log::debug!(
            "instantiated module {} as {name} with {} functions",
            module.name(),
            instance.engine().function_count()
        );
        self.modules.insert(name.to_string(), instance.clone());
        Ok(instance)
    }

    fn resolve_imports(&self, module: &Module) -> Result<Vec<Rc<Function>>, RuntimeError> {
        module
            .imports()
            .iter()
            .map(|import| {
                let unknown = || RuntimeError::UnknownImport {
                    module: import.module.clone(),
                    name: import.name.clone(),
                };
                let exporter = self.modules.get(&import.module).ok_or_else(unknown)?;
                let function = exporter.exported_function(&import.name).map_err(|_| unknown())?;
                let expected = module.types().get(import.type_index as usize).ok_or_else(unknown)?;
                if function.func_type() != expected {
                    return Err(RuntimeError::ImportTypeMismatch {
                        module: import.module.clone(),
                        name: import.name.clone(),
                        expected: expected.to_string(),
                        actual: function.func_type().to_string(),
                    });
                }
                Ok(function)
            })
            .collect()
    }

    /// Remove the instance registered as `name`
    ///
    /// Importers that still hold its functions fail with `ModuleClosed` when
    /// calling into it.
    pub fn close(&mut self, name: &str) -> Result<(), RuntimeError> {
        let instance = self
            .modules
            .remove(name)
            .ok_or_else(|| RuntimeError::ModuleClosed(name.to_string()))?;
        instance.mark_closed();
        log::debug!("closed module {name}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::ValueType;
    use crate::parser::opcode::*;
    use crate::runtime::{CallContext, HostFunction, Value};

    fn store() -> Store {
        Store::new(Engine::default())
    }

    fn compile(store: &Store, module: &Module) {
        store.engine().compile_module(module, None, false).unwrap();
    }

    #[test]
    fn test_instantiate_requires_compile() {
        let mut store = store();
        let module = Module::builder("m").func_type(vec![], vec![]).function(0, vec![], vec![END]).build();
        let err = store.instantiate(&module, "m").unwrap_err();
        assert_eq!(err.to_string(), "source module must be compiled before instantiation");
    }

    #[test]
    fn test_duplicate_and_close() {
        let mut store = store();
        let module = Module::builder("m").build();
        compile(&store, &module);
        let instance = store.instantiate(&module, "m").unwrap();
        assert_eq!(
            store.instantiate(&module, "m").unwrap_err(),
            RuntimeError::DuplicateModule("m".to_string())
        );

        store.close("m").unwrap();
        assert!(instance.is_closed());
        assert!(store.module("m").is_none());
        assert!(store.close("m").is_err());
        // the name is free again
        store.instantiate(&module, "m").unwrap();
    }

    #[test]
    fn test_import_resolution() {
        let mut store = store();
        let host = Module::builder("env")
            .func_type(vec![ValueType::I32], vec![ValueType::I32])
            .host_function(0, HostFunction::new(|_, params| Ok(vec![params[0] * 2])))
            .export_function("double", 0)
            .build();
        compile(&store, &host);
        store.instantiate(&host, "env").unwrap();

        let missing = Module::builder("m")
            .func_type(vec![ValueType::I32], vec![ValueType::I32])
            .import_function("env", "triple", 0)
            .build();
        compile(&store, &missing);
        assert!(matches!(
            store.instantiate(&missing, "missing"),
            Err(RuntimeError::UnknownImport { .. })
        ));

        let wrong = Module::builder("m")
            .func_type(vec![ValueType::I64], vec![ValueType::I64])
            .import_function("env", "double", 0)
            .build();
        compile(&store, &wrong);
        let err = store.instantiate(&wrong, "wrong").unwrap_err();
        assert_eq!(
            err.to_string(),
            "import env.double type mismatch: expected (i64)->(i64), got (i32)->(i32)"
        );

        let ok = Module::builder("m")
            .func_type(vec![ValueType::I32], vec![ValueType::I32])
            .import_function("env", "double", 0)
            .function(0, vec![], vec![LOCAL_GET, 0, CALL, 0, END])
            .export_function("quadruple", 1)
            .build();
        compile(&store, &ok);
        let instance = store.instantiate(&ok, "ok").unwrap();
        let results = instance.call(&CallContext::new(), "quadruple", &[Value::I32(5)]).unwrap();
        assert_eq!(results, vec![Value::I32(10)]);
    }

    #[test]
    fn test_segments() {
        let mut store = store();
        let module = Module::builder("seg")
            .func_type(vec![], vec![ValueType::I32])
            .function(0, vec![], vec![I32_CONST, 0, I32_LOAD8_U, 0, 1, END])
            .memory(1, None)
            .table(2, None)
            .element(1, vec![0])
            .data(0, vec![0xaa, 0xbb])
            .export_function("second_byte", 0)
            .build();
        compile(&store, &module);
        let instance = store.instantiate(&module, "seg").unwrap();

        assert_eq!(instance.memory().borrow().read_bytes(0, 2).unwrap(), vec![0xaa, 0xbb]);
        assert!(instance.table().borrow().get(1).flatten().is_some());
        let results = instance.call(&CallContext::new(), "second_byte", &[]).unwrap();
        assert_eq!(results, vec![Value::I32(0xbb)]);
    }

    #[test]
    fn test_segment_out_of_range() {
        let mut store = store();
        let module = Module::builder("seg").memory(1, None).data(65535, vec![1, 2]).build();
        compile(&store, &module);
        assert!(matches!(
            store.instantiate(&module, "seg"),
            Err(RuntimeError::InvalidSegment(_))
        ));
        assert!(store.module("seg").is_none());

        let module = Module::builder("tab")
            .func_type(vec![], vec![])
            .function(0, vec![], vec![END])
            .table(1, None)
            .element(1, vec![0])
            .build();
        compile(&store, &module);
        assert!(matches!(
            store.instantiate(&module, "tab"),
            Err(RuntimeError::InvalidSegment(_))
        ));
    }

    #[test]
    fn test_globals() {
        let mut store = store();
        let module = Module::builder("g")
            .func_type(vec![], vec![ValueType::I64])
            .global(true, Value::I64(41))
            .function(0, vec![], vec![GLOBAL_GET, 0, I64_CONST, 1, I64_ADD, GLOBAL_SET, 0, GLOBAL_GET, 0, END])
            .export_function("bump", 0)
            .export_global("counter", 0)
            .build();
        compile(&store, &module);
        let instance = store.instantiate(&module, "g").unwrap();

        let results = instance.call(&CallContext::new(), "bump", &[]).unwrap();
        assert_eq!(results, vec![Value::I64(42)]);
        assert_eq!(instance.exported_global("counter").unwrap(), Value::I64(42));
        assert!(instance.exported_global("bump").is_err());
    }

    #[test]
    fn test_call_checks_arguments() {
        let mut store = store();
        let module = Module::builder("args")
            .func_type(vec![ValueType::I32], vec![])
            .function(0, vec![], vec![END])
            .export_function("f", 0)
            .build();
        compile(&store, &module);
        let instance = store.instantiate(&module, "args").unwrap();
        let ctx = CallContext::new();

        assert_eq!(
            instance.call(&ctx, "f", &[]).unwrap_err(),
            RuntimeError::InvalidArguments { expected: 1, actual: 0 }
        );
        assert!(matches!(
            instance.call(&ctx, "f", &[Value::F32(1.0)]),
            Err(RuntimeError::TypeMismatch { .. })
        ));
        assert_eq!(
            instance.call(&ctx, "g", &[]).unwrap_err(),
            RuntimeError::UnknownExport("g".to_string())
        );
        assert!(instance.call(&ctx, "f", &[Value::I32(1)]).unwrap().is_empty());
    }

    #[test]
    fn test_closed_import_fails() {
        let mut store = store();
        let exporter = Module::builder("a")
            .func_type(vec![], vec![])
            .function(0, vec![], vec![END])
            .export_function("f", 0)
            .build();
        compile(&store, &exporter);
        store.instantiate(&exporter, "a").unwrap();

        let importer = Module::builder("b")
            .func_type(vec![], vec![])
            .import_function("a", "f", 0)
            .function(0, vec![], vec![CALL, 0, END])
            .export_function("g", 1)
            .build();
        compile(&store, &importer);
        let instance = store.instantiate(&importer, "b").unwrap();
        store.close("a").unwrap();

        assert_eq!(
            instance.call(&CallContext::new(), "g", &[]).unwrap_err(),
            RuntimeError::ModuleClosed("a".to_string())
        );
    }
}
