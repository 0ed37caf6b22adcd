//! Linear memory instructions
//!
//! The base address is popped as an unsigned i32 and added to the static
//! offset without wrapping; accesses past the end of memory trap.

use super::*;
use crate::ir::{LoadKind, StoreKind};
use crate::runtime::memory::Memory;

pub fn load(stack: &mut Stack, memory: &Memory, kind: LoadKind, offset: u32) -> Result<(), RuntimeError> {
    let base = stack.pop_u32();
    let word = match kind {
        LoadKind::I32 | LoadKind::F32 => memory.read_u32(base, offset)? as u64,
        LoadKind::I64 | LoadKind::F64 => memory.read_u64(base, offset)?,
        LoadKind::I32Load8S => memory.read_u8(base, offset)? as i8 as i32 as u32 as u64,
        LoadKind::I32Load8U => memory.read_u8(base, offset)? as u64,
        LoadKind::I32Load16S => memory.read_u16(base, offset)? as i16 as i32 as u32 as u64,
        LoadKind::I32Load16U => memory.read_u16(base, offset)? as u64,
        LoadKind::I64Load8S => memory.read_u8(base, offset)? as i8 as i64 as u64,
        LoadKind::I64Load8U => memory.read_u8(base, offset)? as u64,
        LoadKind::I64Load16S => memory.read_u16(base, offset)? as i16 as i64 as u64,
        LoadKind::I64Load16U => memory.read_u16(base, offset)? as u64,
        LoadKind::I64Load32S => memory.read_u32(base, offset)? as i32 as i64 as u64,
        LoadKind::I64Load32U => memory.read_u32(base, offset)? as u64,
    };
    stack.push(word);
    Ok(())
}

pub fn store(stack: &mut Stack, memory: &mut Memory, kind: StoreKind, offset: u32) -> Result<(), RuntimeError> {
    let value = stack.pop();
    let base = stack.pop_u32();
    match kind {
        StoreKind::I32 | StoreKind::F32 | StoreKind::I64Store32 => memory.write_u32(base, offset, value as u32),
        StoreKind::I64 | StoreKind::F64 => memory.write_u64(base, offset, value),
        StoreKind::I32Store8 | StoreKind::I64Store8 => memory.write_u8(base, offset, value as u8),
        StoreKind::I32Store16 | StoreKind::I64Store16 => memory.write_u16(base, offset, value as u16),
    }
}

/// memory.size - current size in pages
pub fn size(stack: &mut Stack, memory: &Memory) {
    stack.push_u32(memory.size());
}

/// memory.grow - push the previous size in pages, or -1 on failure
pub fn grow(stack: &mut Stack, memory: &mut Memory) {
    let delta = stack.pop_u32();
    let previous = memory.grow(delta);
    stack.push_i32(previous);
}
