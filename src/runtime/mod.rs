//! WebAssembly runtime implementation
//!
//! This module provides the execution side of the interpreter: the engine and
//! its code cache, the call engine that runs compiled IR against an untyped
//! operand stack, and the instance state (memory, table, globals) it reads
//! and writes.

pub mod call_engine;
pub mod code_cache;
pub mod context;
pub mod engine;
pub mod frame;
pub mod function;
pub mod instance;
pub mod memory;
pub mod ops;
pub mod stack;
pub mod store;
pub mod table;
pub mod value;

pub use call_engine::CallEngine;
pub use code_cache::{CodeCache, CompiledCode};
pub use context::CallContext;
pub use engine::{Engine, EngineConfig, ModuleEngine};
pub use frame::CallFrame;
pub use function::{Function, HostFunction};
pub use instance::{Caller, GlobalInstance, ModuleInstance};
pub use memory::Memory;
pub use stack::Stack;
pub use store::Store;
pub use table::Table;
pub use value::Value;

/// Conditions under which WebAssembly execution halts immediately
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TrapKind {
    #[error("unreachable")]
    Unreachable,
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,
    #[error("out of bounds memory access")]
    OutOfBoundsMemoryAccess,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("source module must be compiled before instantiation")]
    UncompiledModule,
    #[error("stack overflow")]
    StackOverflow,
    #[error("wasm error: {0}")]
    Trap(#[from] TrapKind),
    #[error("invalid table access: index {index} out of range for table of size {size}")]
    IndexOutOfRange { index: u32, size: u32 },
    #[error("uninitialized element {0}")]
    UninitializedElement(u32),
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("expected {expected} params, but passed {actual}")]
    InvalidArguments { expected: usize, actual: usize },
    #[error("unknown export: {0}")]
    UnknownExport(String),
    #[error("unknown import: {module}.{name}")]
    UnknownImport { module: String, name: String },
    #[error("import {module}.{name} type mismatch: expected {expected}, got {actual}")]
    ImportTypeMismatch {
        module: String,
        name: String,
        expected: String,
        actual: String,
    },
    #[error("module {0} has been closed")]
    ModuleClosed(String),
    #[error("module {0} has already been instantiated")]
    DuplicateModule(String),
    #[error("invalid memory limits: {0}")]
    MemoryLimits(String),
    #[error("{0}")]
    Host(String),
    #[error("call cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("segment does not fit: {0}")]
    InvalidSegment(String),
}

impl RuntimeError {
    /// Whether the error is a WebAssembly trap
    pub fn is_trap(&self) -> bool {
        matches!(self, RuntimeError::Trap(_))
    }
}
