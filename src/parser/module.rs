//! In-memory representation of a decoded WebAssembly module
//!
//! A `Module` is what the upstream decoder hands to the engine: section
//! contents in index order, with function bodies kept as raw code bytes so
//! the compiler can translate (and reject) them. Modules are assembled with
//! [`ModuleBuilder`], which also derives the content-based [`ModuleId`] used
//! as the code cache key. A built module is immutable.

use crate::runtime::{HostFunction, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Number types that can live on the operand stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    /// Decode a value type byte as it appears in block types
    pub fn decode(byte: u8) -> Option<ValueType> {
        match byte {
            0x7f => Some(ValueType::I32),
            0x7e => Some(ValueType::I64),
            0x7d => Some(ValueType::F32),
            0x7c => Some(ValueType::F64),
            _ => None,
        }
    }

    pub fn encode(self) -> u8 {
        match self {
            ValueType::I32 => 0x7f,
            ValueType::I64 => 0x7e,
            ValueType::F32 => 0x7d,
            ValueType::F64 => 0x7c,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Function signature
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl FunctionType {
    pub fn new(params: Vec<ValueType>, results: Vec<ValueType>) -> Self {
        FunctionType { params, results }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[ValueType]| types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(",");
        write!(f, "({})->({})", join(&self.params), join(&self.results))
    }
}

/// An imported function: `(module, name)` plus its type index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub type_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Function(u32),
    Memory,
    Global(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
}

/// Body of a function defined by the module
#[derive(Clone)]
pub enum Code {
    /// WebAssembly code bytes, including the trailing `end`
    Wasm { locals: Vec<ValueType>, body: Vec<u8> },
    /// A native function provided by the embedder
    Host(HostFunction),
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Wasm { locals, body } => f
                .debug_struct("Wasm")
                .field("locals", locals)
                .field("body", &hex::encode(body))
                .finish(),
            Code::Host(host) => write!(f, "Host(#{})", host.serial()),
        }
    }
}

/// Memory limits in 64KiB pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Global {
    pub value_type: ValueType,
    pub mutable: bool,
    pub init: Value,
}

/// Active element segment: function indices written into table 0 at `offset`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSegment {
    pub offset: u32,
    pub functions: Vec<u32>,
}

/// Active data segment: bytes copied into memory 0 at `offset`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub offset: u32,
    pub bytes: Vec<u8>,
}

/// Content-derived identity of a module, used as the code cache key
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModuleId([u8; 32]);

impl ModuleId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", &hex::encode(self.0)[..16])
    }
}

/// Static description of one function in a module's function index space
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub module_name: String,
    pub index: u32,
    pub name: Option<String>,
    pub export_names: Vec<String>,
    /// `(module, name)` when the function is imported
    pub import: Option<(String, String)>,
    pub func_type: FunctionType,
    pub is_host: bool,
}

impl FunctionDefinition {
    /// Name used in traces: `module.name`, or `module.$index` when unnamed
    pub fn debug_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{}.{}", self.module_name, name),
            None => format!("{}.${}", self.module_name, self.index),
        }
    }

    /// The bare function name without the module prefix
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// A decoded WebAssembly module
#[derive(Debug, Clone)]
pub struct Module {
    pub(crate) id: ModuleId,
    pub(crate) name: String,
    pub(crate) types: Vec<FunctionType>,
    pub(crate) imports: Vec<Import>,
    /// Type index of each locally defined function
    pub(crate) functions: Vec<u32>,
    pub(crate) code: Vec<Code>,
    pub(crate) exports: Vec<Export>,
    pub(crate) memory: Option<Limits>,
    pub(crate) table: Option<Limits>,
    pub(crate) globals: Vec<Global>,
    pub(crate) elements: Vec<ElementSegment>,
    pub(crate) data: Vec<DataSegment>,
    pub(crate) names: HashMap<u32, String>,
}

impl Module {
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder::new(name)
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[FunctionType] {
        &self.types
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    pub fn code(&self) -> &[Code] {
        &self.code
    }

    pub fn globals(&self) -> &[Global] {
        &self.globals
    }

    pub fn memory(&self) -> Option<Limits> {
        self.memory
    }

    pub fn table(&self) -> Option<Limits> {
        self.table
    }

    pub fn elements(&self) -> &[ElementSegment] {
        &self.elements
    }

    pub fn data(&self) -> &[DataSegment] {
        &self.data
    }

    /// Number of imported functions, which precede local functions in the index space
    pub fn import_function_count(&self) -> u32 {
        self.imports.len() as u32
    }

    /// Total size of the function index space
    pub fn function_count(&self) -> u32 {
        (self.imports.len() + self.functions.len()) as u32
    }

    /// Type of the function at `index` in the function index space
    pub fn function_type(&self, index: u32) -> Option<&FunctionType> {
        let imported = self.import_function_count();
        let type_index = if index < imported {
            self.imports.get(index as usize)?.type_index
        } else {
            *self.functions.get((index - imported) as usize)?
        };
        self.types.get(type_index as usize)
    }

    /// Definitions for the whole function index space, imports first
    pub fn function_definitions(&self) -> Vec<Arc<FunctionDefinition>> {
        (0..self.function_count()).filter_map(|i| self.function_definition(i)).collect()
    }

    pub fn function_definition(&self, index: u32) -> Option<Arc<FunctionDefinition>> {
        let func_type = self.function_type(index)?.clone();
        let imported = self.import_function_count();
        let import = (index < imported)
            .then(|| &self.imports[index as usize])
            .map(|imp| (imp.module.clone(), imp.name.clone()));
        let is_host = index >= imported && matches!(self.code.get((index - imported) as usize), Some(Code::Host(_)));
        let export_names = self
            .exports
            .iter()
            .filter(|e| e.kind == ExportKind::Function(index))
            .map(|e| e.name.clone())
            .collect();
        Some(Arc::new(FunctionDefinition {
            module_name: self.name.clone(),
            index,
            name: self.names.get(&index).cloned(),
            export_names,
            import,
            func_type,
            is_host,
        }))
    }

    fn compute_id(&self) -> ModuleId {
        let mut hasher = Sha256::new();
        let put_u32 =|hasher: &mut Sha256, v: u32| hasher.update(v.to_le_bytes());
        let put_str = |hasher: &mut Sha256, s: &str| {
            hasher.update((s.len() as u32).to_le_bytes());
            hasher.update(s.as_bytes());
        };
        let put_types = |hasher: &mut Sha256, types: &[ValueType]| {
            hasher.update((types.len() as u32).to_le_bytes());
            hasher.update(types.iter().map(|t| t.encode()).collect::<Vec<_>>());
        };

        put_str(&mut hasher, &self.name);
        put_u32(&mut hasher, self.types.len() as u32);
        for ty in &self.types {
            put_types(&mut hasher, &ty.params);
            put_types(&mut hasher, &ty.results);
        }
        put_u32(&mut hasher, self.imports.len() as u32);
        for import in &self.imports {
            put_str(&mut hasher, &import.module);
            put_str(&mut hasher, &import.name);
            put_u32(&mut hasher, import.type_index);
        }
        put_u32(&mut hasher, self.functions.len() as u32);
        for (type_index, code) in self.functions.iter().zip(&self.code) {
            put_u32(&mut hasher, *type_index);
            match code {
                Code::Wasm { locals, body } => {
                    hasher.update([0u8]);
                    put_types(&mut hasher, locals);
                    put_u32(&mut hasher, body.len() as u32);
                    hasher.update(body);
                }
                Code::Host(host) => {
                    hasher.update([1u8]);
                    hasher.update(host.serial().to_le_bytes());
                }
            }
        }
        put_u32(&mut hasher, self.exports.len() as u32);
        for export in &self.exports {
            put_str(&mut hasher, &export.name);
            match export.kind {
                ExportKind::Function(i) => {
                    hasher.update([0u8]);
                    put_u32(&mut hasher, i);
                }
                ExportKind::Memory => hasher.update([2u8]),
                ExportKind::Global(i) => {
                    hasher.update([3u8]);
                    put_u32(&mut hasher, i);
                }
            }
        }
        for limits in [self.memory, self.table] {
            match limits {
                Some(Limits { min, max }) => {
                    hasher.update([1u8]);
                    put_u32(&mut hasher, min);
                    put_u32(&mut hasher, max.unwrap_or(u32::MAX));
                    hasher.update([max.is_some() as u8]);
                }
                None => hasher.update([0u8]),
            }
        }
        put_u32(&mut hasher, self.globals.len() as u32);
        for global in &self.globals {
            hasher.update([global.value_type.encode(), global.mutable as u8]);
            hasher.update(global.init.to_word().to_le_bytes());
        }
        put_u32(&mut hasher, self.elements.len() as u32);
        for segment in &self.elements {
            put_u32(&mut hasher, segment.offset);
            put_u32(&mut hasher, segment.functions.len() as u32);
            for f in &segment.functions {
                put_u32(&mut hasher, *f);
            }
        }
        put_u32(&mut hasher, self.data.len() as u32);
        for segment in &self.data {
            put_u32(&mut hasher, segment.offset);
            put_u32(&mut hasher, segment.bytes.len() as u32);
            hasher.update(&segment.bytes);
        }
        let mut names: Vec<_> = self.names.iter().collect();
        names.sort();
        put_u32(&mut hasher, names.len() as u32);
        for (index, name) in names {
            put_u32(&mut hasher, *index);
            put_str(&mut hasher, name);
        }

        ModuleId(hasher.finalize().into())
    }
}

/// Fluent assembler for [`Module`]
///
/// ```
/// use kasm_interp::parser::module::{Module, ValueType};
/// use kasm_interp::parser::opcode::*;
///
/// let module = Module::builder("math")
///     .func_type(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32])
///     .function(0, vec![], vec![LOCAL_GET, 0, LOCAL_GET, 1, I32_ADD, END])
///     .export_function("add", 0)
///     .build();
/// assert_eq!(module.function_count(), 1);
/// ```
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ModuleBuilder {
            module: Module {
                id: ModuleId::default(),
                name: name.into(),
                types: Vec::new(),
                imports: Vec::new(),
                functions: Vec::new(),
                code: Vec::new(),
                exports: Vec::new(),
                memory: None,
                table: None,
                globals: Vec::new(),
                elements: Vec::new(),
                data: Vec::new(),
                names: HashMap::new(),
            },
        }
    }

    pub fn func_type(mut self, params: Vec<ValueType>, results: Vec<ValueType>) -> Self {
        self.module.types.push(FunctionType::new(params, results));
        self
    }

    /// Import a function. Imports must be declared before local functions
    /// so that indices stay stable.
    pub fn import_function(mut self, module: impl Into<String>, name: impl Into<String>, type_index: u32) -> Self {
        self.module.imports.push(Import {
            module: module.into(),
            name: name.into(),
            type_index,
        });
        self
    }

    pub fn function(mut self, type_index: u32, locals: Vec<ValueType>, body: Vec<u8>) -> Self {
        self.module.functions.push(type_index);
        self.module.code.push(Code::Wasm { locals, body });
        self
    }

    pub fn host_function(mut self, type_index: u32, host: HostFunction) -> Self {
        self.module.functions.push(type_index);
        self.module.code.push(Code::Host(host));
        self
    }

    /// Attach a debug name to the function at `index` in the function index space
    pub fn name_function(mut self, index: u32, name: impl Into<String>) -> Self {
        self.module.names.insert(index, name.into());
        self
    }

    pub fn export_function(mut self, name: impl Into<String>, index: u32) -> Self {
        self.module.exports.push(Export {
            name: name.into(),
            kind: ExportKind::Function(index),
        });
        self
    }

    pub fn export_memory(mut self, name: impl Into<String>) -> Self {
        self.module.exports.push(Export {
            name: name.into(),
            kind: ExportKind::Memory,
        });
        self
    }

    pub fn export_global(mut self, name: impl Into<String>, index: u32) -> Self {
        self.module.exports.push(Export {
            name: name.into(),
            kind: ExportKind::Global(index),
        });
        self
    }

    pub fn memory(mut self, min: u32, max: Option<u32>) -> Self {
        self.module.memory = Some(Limits { min, max });
        self
    }

    pub fn table(mut self, min: u32, max: Option<u32>) -> Self {
        self.module.table = Some(Limits { min, max });
        self
    }

    pub fn global(mut self, mutable: bool, init: Value) -> Self {
        self.module.globals.push(Global {
            value_type: init.typ(),
            mutable,
            init,
        });
        self
    }

    pub fn element(mut self, offset: u32, functions: Vec<u32>) -> Self {
        self.module.elements.push(ElementSegment { offset, functions });
        self
    }

    pub fn data(mut self, offset: u32, bytes: Vec<u8>) -> Self {
        self.module.data.push(DataSegment { offset, bytes });
        self
    }

    pub fn build(mut self) -> Module {
        self.module.id = self.module.compute_id();
        self.module
    }
}
