//! Function instances and host functions

use super::code_cache::CompiledCode;
use super::instance::{Caller, ModuleInstance};
use super::RuntimeError;
use crate::parser::module::{FunctionDefinition, FunctionType};
use once_cell::unsync::OnceCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type HostFn = dyn Fn(&mut Caller<'_>, &[u64]) -> Result<Vec<u64>, RuntimeError> + Send + Sync;

static NEXT_HOST_SERIAL: AtomicU64 = AtomicU64::new(1);

/// A native function callable from WebAssembly
///
/// Parameters and results are raw operand-stack words, typed by the
/// function's declared signature. Each host function gets a process-unique
/// serial at construction which stands in for its code when hashing a
/// module's identity; clones share the serial.
#[derive(Clone)]
pub struct HostFunction {
    func: Arc<HostFn>,
    serial: u64,
}

impl HostFunction {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&mut Caller<'_>, &[u64]) -> Result<Vec<u64>, RuntimeError> + Send + Sync + 'static,
    {
        HostFunction {
            func: Arc::new(func),
            serial: NEXT_HOST_SERIAL.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn call(&self, caller: &mut Caller<'_>, params: &[u64]) -> Result<Vec<u64>, RuntimeError> {
        (self.func)(caller, params)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction(#{})", self.serial)
    }
}

/// A compiled body bound to the module instance that owns it
///
/// The owning instance is held weakly and attached once the instance
/// exists. Imported functions are the exporter's `Function`, so a call
/// through an import runs against the exporter's memory and globals.
pub struct Function {
    code: Arc<CompiledCode>,
    instance: OnceCell<Weak<ModuleInstance>>,
}

impl Function {
    pub fn new(code: Arc<CompiledCode>) -> Rc<Function> {
        Rc::new(Function {
            code,
            instance: OnceCell::new(),
        })
    }

    pub fn code(&self) -> &Arc<CompiledCode> {
        &self.code
    }

    pub fn definition(&self) -> &FunctionDefinition {
        self.code.definition()
    }

    pub fn func_type(&self) -> &FunctionType {
        &self.code.definition().func_type
    }

    /// Index in the owning module's function index space
    pub fn index(&self) -> u32 {
        self.code.definition().index
    }

    /// The owning instance, if bound and still alive
    pub fn instance(&self) -> Option<Rc<ModuleInstance>> {
        self.instance.get().and_then(Weak::upgrade)
    }

    /// Fail if the owning instance was closed or dropped. Unbound functions always pass.
    pub(crate) fn ensure_open(&self) -> Result<(), RuntimeError> {
        let Some(weak) = self.instance.get() else {
            return Ok(());
        };
        match weak.upgrade() {
            Some(instance) if !instance.is_closed() => Ok(()),
            Some(instance) => Err(RuntimeError::ModuleClosed(instance.name().to_string())),
            None => Err(RuntimeError::ModuleClosed(self.definition().module_name.clone())),
        }
    }

    /// Attach the owning instance. Binding is permanent; later calls are ignored.
    pub(crate) fn bind(&self, instance: &Rc<ModuleInstance>) {
        let _ = self.instance.set(Rc::downgrade(instance));
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.definition().debug_name())
            .field("type", &self.func_type().to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_serials_are_unique() {
        let a = HostFunction::new(|_, _| Ok(vec![]));
        let b = HostFunction::new(|_, _| Ok(vec![]));
        assert_ne!(a.serial(), b.serial());
        assert_eq!(a.clone().serial(), a.serial());
    }

    #[test]
    fn test_unbound_function_has_no_instance() {
        let function = Function::new(Arc::new(CompiledCode::wasm(
            Arc::new(FunctionDefinition::default()),
            Default::default(),
            0,
        )));
        assert!(function.instance().is_none());
        assert_eq!(function.index(), 0);
    }
}
