//! WebAssembly function table
//!
//! Tables hold the targets of `call_indirect`. Slots start out null and are
//! filled by element segments at instantiation. The signature check at call
//! time lives in [`ModuleEngine::lookup_function`](super::ModuleEngine::lookup_function).

use super::function::Function;
use super::RuntimeError;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Table {
    elements: Vec<Option<Rc<Function>>>,
    max: Option<u32>,
}

impl Table {
    /// Create a table of `min` null slots
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Table {
            elements: vec![None; min as usize],
            max,
        }
    }

    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    pub fn max(&self) -> Option<u32> {
        self.max
    }

    /// The slot at `index`: `None` when out of range, `Some(None)` when null
    pub fn get(&self, index: u32) -> Option<Option<&Rc<Function>>> {
        self.elements.get(index as usize).map(Option::as_ref)
    }

    pub fn set(&mut self, index: u32, function: Option<Rc<Function>>) -> Result<(), RuntimeError> {
        let size = self.size();
        let slot = self
            .elements
            .get_mut(index as usize)
            .ok_or(RuntimeError::IndexOutOfRange { index, size })?;
        *slot = function;
        Ok(())
    }

    /// Write `functions` into consecutive slots starting at `offset`, or nothing if they do not fit
    pub fn init(&mut self, offset: u32, functions: &[Rc<Function>]) -> Result<(), RuntimeError> {
        let end = offset as u64 + functions.len() as u64;
        if end > self.size() as u64 {
            return Err(RuntimeError::InvalidSegment(format!(
                "element segment [{offset}, {end}) exceeds table size {}",
                self.size()
            )));
        }
        for (slot, function) in self.elements[offset as usize..].iter_mut().zip(functions) {
            *slot = Some(function.clone());
        }
        Ok(())
    }
}
