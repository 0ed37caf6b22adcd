//! WebAssembly call frame
//!
//! One activation record on the call engine's explicit frame stack. The
//! frame's locals are the first words of its operand-stack region, starting
//! at `base`.

use super::function::Function;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct CallFrame {
    pub function: Rc<Function>,
    /// Index of the next operation to execute
    pub pc: usize,
    /// Operand-stack index of the first parameter
    pub base: usize,
}

impl CallFrame {
    pub fn new(function: Rc<Function>, base: usize) -> Self {
        CallFrame { function, pc: 0, base }
    }
}
