//! The call stack as seen by a `before` hook

use crate::parser::module::FunctionDefinition;
use crate::runtime::CallFrame;
use std::iter::Rev;
use std::slice;

/// One open call, innermost first when walked through [`StackIterator`]
#[derive(Debug, Clone, Copy)]
pub struct StackFrame<'a> {
    definition: &'a FunctionDefinition,
    params: &'a [u64],
    source_offset: Option<usize>,
}

impl<'a> StackFrame<'a> {
    pub fn definition(&self) -> &'a FunctionDefinition {
        self.definition
    }

    /// Current values of the parameter slots, which the body may have reassigned
    pub fn params(&self) -> &'a [u64] {
        self.params
    }

    /// Byte offset of the instruction this frame is suspended at
    ///
    /// Only known for bodies compiled for debug, and never for the function
    /// being entered.
    pub fn source_offset(&self) -> Option<usize> {
        self.source_offset
    }
}

/// Walks the open calls from the function being entered outwards
#[derive(Debug, Clone)]
pub struct StackIterator<'a> {
    top: Option<StackFrame<'a>>,
    frames: Rev<slice::Iter<'a, CallFrame>>,
    words: &'a [u64],
}

impl<'a> StackIterator<'a> {
    /// `frames` are WebAssembly frames over the operand `words`; `top` is a
    /// host function entered from the innermost of them
    pub(crate) fn new(
        top: Option<(&'a FunctionDefinition, &'a [u64])>,
        frames: &'a [CallFrame],
        words: &'a [u64],
    ) -> Self {
        StackIterator {
            top: top.map(|(definition, params)| StackFrame {
                definition,
                params,
                source_offset: None,
            }),
            frames: frames.iter().rev(),
            words,
        }
    }
}

impl<'a> Iterator for StackIterator<'a> {
    type Item = StackFrame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(top) = self.top.take() {
            return Some(top);
        }
        let frame = self.frames.next()?;
        let code = frame.function.code();
        let start = frame.base.min(self.words.len());
        let end = (frame.base + code.param_count()).min(self.words.len());
        let source_offset = match frame.pc {
            0 => None,
            pc => code.source_offset(pc - 1),
        };
        Some(StackFrame {
            definition: code.definition(),
            params: &self.words[start..end],
            source_offset,
        })
    }
}
