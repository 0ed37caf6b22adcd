//! Module representation and WebAssembly code-byte decoding
//!
//! - [`module`] -- The decoded module handed to the engine, and its builder.
//! - [`opcode`] -- Instruction opcodes and their text names.
//! - [`reader`] -- Cursor over code bytes with LEB128 and little-endian readers.

pub mod module;
pub mod opcode;
pub mod reader;
