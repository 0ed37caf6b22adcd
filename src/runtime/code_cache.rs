//! Compiled function bodies and the cache that shares them
//!
//! Compilation output is keyed by [`ModuleId`]: every instance of the same
//! module content runs the same `Arc<CompiledCode>` bodies. An entry is
//! always the complete set of a module's locally defined functions, in
//! function-section order.

use super::function::HostFunction;
use crate::ir::compiler::CompiledBody;
use crate::ir::Operation;
use crate::listener::FunctionListener;
use crate::parser::module::{FunctionDefinition, ModuleId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What a compiled function executes
pub enum CodeBody {
    Wasm {
        operations: Vec<Operation>,
        /// Empty unless compiled for debug
        source_offsets: Vec<usize>,
        /// Declared locals, excluding parameters
        local_count: usize,
    },
    Host(HostFunction),
}

/// Immutable compiled form of one function
pub struct CompiledCode {
    definition: Arc<FunctionDefinition>,
    body: CodeBody,
    listener: Option<Arc<dyn FunctionListener>>,
}

impl CompiledCode {
    pub fn wasm(definition: Arc<FunctionDefinition>, body: CompiledBody, local_count: usize) -> Self {
        CompiledCode {
            definition,
            body: CodeBody::Wasm {
                operations: body.operations,
                source_offsets: body.source_offsets,
                local_count,
            },
            listener: None,
        }
    }

    pub fn host(definition: Arc<FunctionDefinition>, host: HostFunction) -> Self {
        CompiledCode {
            definition,
            body: CodeBody::Host(host),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: Option<Arc<dyn FunctionListener>>) -> Self {
        self.listener = listener;
        self
    }

    pub fn definition(&self) -> &FunctionDefinition {
        &self.definition
    }

    pub fn body(&self) -> &CodeBody {
        &self.body
    }

    pub fn listener(&self) -> Option<&Arc<dyn FunctionListener>> {
        self.listener.as_ref()
    }

    pub fn param_count(&self) -> usize {
        self.definition.func_type.params.len()
    }

    pub fn result_count(&self) -> usize {
        self.definition.func_type.results.len()
    }

    /// Byte offset in the source body of the instruction behind operation `pc`
    pub fn source_offset(&self, pc: usize) -> Option<usize> {
        match &self.body {
            CodeBody::Wasm { source_offsets, .. } => source_offsets.get(pc).copied(),
            CodeBody::Host(_) => None,
        }
    }
}

impl fmt::Debug for CompiledCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CompiledCode");
        s.field("function", &self.definition.debug_name());
        match &self.body {
            CodeBody::Wasm {
                operations,
                local_count,
                ..
            } => s.field("operations", &operations.len()).field("locals", local_count),
            CodeBody::Host(host) => s.field("host", host),
        };
        s.field("listener", &self.listener.is_some()).finish()
    }
}

pub type Codes = Arc<[Arc<CompiledCode>]>;

/// Process-wide map from module identity to compiled bodies
///
/// Clones share the same map. Only whole entries are ever added or removed,
/// so a reader sees either every body of a module or none.
#[derive(Clone, Default)]
pub struct CodeCache {
    codes: Arc<Mutex<HashMap<ModuleId, Codes>>>,
}

impl CodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ModuleId, Codes>> {
        // entries are replaced atomically, a poisoned map is still consistent
        self.codes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `codes` for `id` unless an entry already exists. Returns whether it was added.
    pub fn add(&self, id: ModuleId, codes: Vec<Arc<CompiledCode>>) -> bool {
        let mut map = self.lock();
        if map.contains_key(&id) {
            return false;
        }
        map.insert(id, codes.into());
        true
    }

    pub fn get(&self, id: &ModuleId) -> Option<Codes> {
        self.lock().get(id).cloned()
    }

    /// Evict `id`. Instances already holding its bodies keep them alive.
    pub fn delete(&self, id: &ModuleId) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl fmt::Debug for CodeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeCache").field("modules", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::Module;

    fn code(index: u32) -> Arc<CompiledCode> {
        let definition = FunctionDefinition {
            index,
            ..Default::default()
        };
        Arc::new(CompiledCode::wasm(Arc::new(definition), CompiledBody::default(), 0))
    }

    #[test]
    fn test_add_get_delete() {
        let cache = CodeCache::new();
        let id = Module::builder("m").build().id();
        let expected = vec![code(0), code(1)];

        assert!(cache.add(id, expected.clone()));
        let actual = cache.get(&id).unwrap();
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(&expected) {
            assert!(Arc::ptr_eq(a, e));
        }

        assert!(cache.delete(&id));
        assert!(cache.get(&id).is_none());
        assert!(!cache.delete(&id));
        // bodies handed out earlier are still usable
        assert_eq!(actual[1].definition().index, 1);
    }

    #[test]
    fn test_add_never_overwrites() {
        let cache = CodeCache::new();
        let id = Module::builder("m").build().id();
        let first = vec![code(0)];
        assert!(cache.add(id, first.clone()));
        assert!(!cache.add(id, vec![code(7), code(8)]));

        let actual = cache.get(&id).unwrap();
        assert_eq!(actual.len(), 1);
        assert!(Arc::ptr_eq(&actual[0], &first[0]));
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = CodeCache::new();
        let shared = cache.clone();
        let id = Module::builder("shared").build().id();
        cache.add(id, vec![code(0)]);
        assert!(shared.contains(&id));
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn test_concurrent_readers_see_whole_entries() {
        let cache = CodeCache::new();
        let id = Module::builder("threads").build().id();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.add(id, vec![code(i), code(i)]))
            })
            .collect();
        let added = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|added| *added)
            .count();
        assert_eq!(added, 1);
        assert_eq!(cache.get(&id).unwrap().len(), 2);
    }
}
