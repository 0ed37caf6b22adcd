//! WebAssembly instruction opcodes
//!
//! Single-byte opcodes of the MVP instruction set plus the sign-extension
//! operators, and the `0xFC` sub-opcodes of the non-trapping float-to-int
//! conversions. Tests and embedders assemble function bodies from these.

pub type Opcode = u8;

// Control
pub const UNREACHABLE: Opcode = 0x00;
pub const NOP: Opcode = 0x01;
pub const BLOCK: Opcode = 0x02;
pub const LOOP: Opcode = 0x03;
pub const IF: Opcode = 0x04;
pub const ELSE: Opcode = 0x05;
pub const END: Opcode = 0x0b;
pub const BR: Opcode = 0x0c;
pub const BR_IF: Opcode = 0x0d;
pub const BR_TABLE: Opcode = 0x0e;
pub const RETURN: Opcode = 0x0f;
pub const CALL: Opcode = 0x10;
pub const CALL_INDIRECT: Opcode = 0x11;

// Parametric
pub const DROP: Opcode = 0x1a;
pub const SELECT: Opcode = 0x1b;

// Variable
pub const LOCAL_GET: Opcode = 0x20;
pub const LOCAL_SET: Opcode = 0x21;
pub const LOCAL_TEE: Opcode = 0x22;
pub const GLOBAL_GET: Opcode = 0x23;
pub const GLOBAL_SET: Opcode = 0x24;

// Memory
pub const I32_LOAD: Opcode = 0x28;
pub const I64_LOAD: Opcode = 0x29;
pub const F32_LOAD: Opcode = 0x2a;
pub const F64_LOAD: Opcode = 0x2b;
pub const I32_LOAD8_S: Opcode = 0x2c;
pub const I32_LOAD8_U: Opcode = 0x2d;
pub const I32_LOAD16_S: Opcode = 0x2e;
pub const I32_LOAD16_U: Opcode = 0x2f;
pub const I64_LOAD8_S: Opcode = 0x30;
pub const I64_LOAD8_U: Opcode = 0x31;
pub const I64_LOAD16_S: Opcode = 0x32;
pub const I64_LOAD16_U: Opcode = 0x33;
pub const I64_LOAD32_S: Opcode = 0x34;
pub const I64_LOAD32_U: Opcode = 0x35;
pub const I32_STORE: Opcode = 0x36;
pub const I64_STORE: Opcode = 0x37;
pub const F32_STORE: Opcode = 0x38;
pub const F64_STORE: Opcode = 0x39;
pub const I32_STORE8: Opcode = 0x3a;
pub const I32_STORE16: Opcode = 0x3b;
pub const I64_STORE8: Opcode = 0x3c;
pub const I64_STORE16: Opcode = 0x3d;
pub const I64_STORE32: Opcode = 0x3e;
pub const MEMORY_SIZE: Opcode = 0x3f;
pub const MEMORY_GROW: Opcode = 0x40;

// Constants
pub const I32_CONST: Opcode = 0x41;
pub const I64_CONST: Opcode = 0x42;
pub const F32_CONST: Opcode = 0x43;
pub const F64_CONST: Opcode = 0x44;

// i32 comparison
pub const I32_EQZ: Opcode = 0x45;
pub const I32_EQ: Opcode = 0x46;
pub const I32_NE: Opcode = 0x47;
pub const I32_LT_S: Opcode = 0x48;
pub const I32_LT_U: Opcode = 0x49;
pub const I32_GT_S: Opcode = 0x4a;
pub const I32_GT_U: Opcode = 0x4b;
pub const I32_LE_S: Opcode = 0x4c;
pub const I32_LE_U: Opcode = 0x4d;
pub const I32_GE_S: Opcode = 0x4e;
pub const I32_GE_U: Opcode = 0x4f;

// i64 comparison
pub const I64_EQZ: Opcode = 0x50;
pub const I64_EQ: Opcode = 0x51;
pub const I64_NE: Opcode = 0x52;
pub const I64_LT_S: Opcode = 0x53;
pub const I64_LT_U: Opcode = 0x54;
pub const I64_GT_S: Opcode = 0x55;
pub const I64_GT_U: Opcode = 0x56;
pub const I64_LE_S: Opcode = 0x57;
pub const I64_LE_U: Opcode = 0x58;
pub const I64_GE_S: Opcode = 0x59;
pub const I64_GE_U: Opcode = 0x5a;

// f32 comparison
pub const F32_EQ: Opcode = 0x5b;
pub const F32_NE: Opcode = 0x5c;
pub const F32_LT: Opcode = 0x5d;
pub const F32_GT: Opcode = 0x5e;
pub const F32_LE: Opcode = 0x5f;
pub const F32_GE: Opcode = 0x60;

// f64 comparison
pub const F64_EQ: Opcode = 0x61;
pub const F64_NE: Opcode = 0x62;
pub const F64_LT: Opcode = 0x63;
pub const F64_GT: Opcode = 0x64;
pub const F64_LE: Opcode = 0x65;
pub const F64_GE: Opcode = 0x66;

// i32 arithmetic
pub const I32_CLZ: Opcode = 0x67;
pub const I32_CTZ: Opcode = 0x68;
pub const I32_POPCNT: Opcode = 0x69;
pub const I32_ADD: Opcode = 0x6a;
pub const I32_SUB: Opcode = 0x6b;
pub const I32_MUL: Opcode = 0x6c;
pub const I32_DIV_S: Opcode = 0x6d;
pub const I32_DIV_U: Opcode = 0x6e;
pub const I32_REM_S: Opcode = 0x6f;
pub const I32_REM_U: Opcode = 0x70;
pub const I32_AND: Opcode = 0x71;
pub const I32_OR: Opcode = 0x72;
pub const I32_XOR: Opcode = 0x73;
pub const I32_SHL: Opcode = 0x74;
pub const I32_SHR_S: Opcode = 0x75;
pub const I32_SHR_U: Opcode = 0x76;
pub const I32_ROTL: Opcode = 0x77;
pub const I32_ROTR: Opcode = 0x78;

// i64 arithmetic
pub const I64_CLZ: Opcode = 0x79;
pub const I64_CTZ: Opcode = 0x7a;
pub const I64_POPCNT: Opcode = 0x7b;
pub const I64_ADD: Opcode = 0x7c;
pub const I64_SUB: Opcode = 0x7d;
pub const I64_MUL: Opcode = 0x7e;
pub const I64_DIV_S: Opcode = 0x7f;
pub const I64_DIV_U: Opcode = 0x80;
pub const I64_REM_S: Opcode = 0x81;
pub const I64_REM_U: Opcode = 0x82;
pub const I64_AND: Opcode = 0x83;
pub const I64_OR: Opcode = 0x84;
pub const I64_XOR: Opcode = 0x85;
pub const I64_SHL: Opcode = 0x86;
pub const I64_SHR_S: Opcode = 0x87;
pub const I64_SHR_U: Opcode = 0x88;
pub const I64_ROTL: Opcode = 0x89;
pub const I64_ROTR: Opcode = 0x8a;

// f32 arithmetic
pub const F32_ABS: Opcode = 0x8b;
pub const F32_NEG: Opcode = 0x8c;
pub const F32_CEIL: Opcode = 0x8d;
pub const F32_FLOOR: Opcode = 0x8e;
pub const F32_TRUNC: Opcode = 0x8f;
pub const F32_NEAREST: Opcode = 0x90;
pub const F32_SQRT: Opcode = 0x91;
pub const F32_ADD: Opcode = 0x92;
pub const F32_SUB: Opcode = 0x93;
pub const F32_MUL: Opcode = 0x94;
pub const F32_DIV: Opcode = 0x95;
pub const F32_MIN: Opcode = 0x96;
pub const F32_MAX: Opcode = 0x97;
pub const F32_COPYSIGN: Opcode = 0x98;

// f64 arithmetic
pub const F64_ABS: Opcode = 0x99;
pub const F64_NEG: Opcode = 0x9a;
pub const F64_CEIL: Opcode = 0x9b;
pub const F64_FLOOR: Opcode = 0x9c;
pub const F64_TRUNC: Opcode = 0x9d;
pub const F64_NEAREST: Opcode = 0x9e;
pub const F64_SQRT: Opcode = 0x9f;
pub const F64_ADD: Opcode = 0xa0;
pub const F64_SUB: Opcode = 0xa1;
pub const F64_MUL: Opcode = 0xa2;
pub const F64_DIV: Opcode = 0xa3;
pub const F64_MIN: Opcode = 0xa4;
pub const F64_MAX: Opcode = 0xa5;
pub const F64_COPYSIGN: Opcode = 0xa6;

// Conversions
pub const I32_WRAP_I64: Opcode = 0xa7;
pub const I32_TRUNC_F32_S: Opcode = 0xa8;
pub const I32_TRUNC_F32_U: Opcode = 0xa9;
pub const I32_TRUNC_F64_S: Opcode = 0xaa;
pub const I32_TRUNC_F64_U: Opcode = 0xab;
pub const I64_EXTEND_I32_S: Opcode = 0xac;
pub const I64_EXTEND_I32_U: Opcode = 0xad;
pub const I64_TRUNC_F32_S: Opcode = 0xae;
pub const I64_TRUNC_F32_U: Opcode = 0xaf;
pub const I64_TRUNC_F64_S: Opcode = 0xb0;
pub const I64_TRUNC_F64_U: Opcode = 0xb1;
pub const F32_CONVERT_I32_S: Opcode = 0xb2;
pub const F32_CONVERT_I32_U: Opcode = 0xb3;
pub const F32_CONVERT_I64_S: Opcode = 0xb4;
pub const F32_CONVERT_I64_U: Opcode = 0xb5;
pub const F32_DEMOTE_F64: Opcode = 0xb6;
pub const F64_CONVERT_I32_S: Opcode = 0xb7;
pub const F64_CONVERT_I32_U: Opcode = 0xb8;
pub const F64_CONVERT_I64_S: Opcode = 0xb9;
pub const F64_CONVERT_I64_U: Opcode = 0xba;
pub const F64_PROMOTE_F32: Opcode = 0xbb;
pub const I32_REINTERPRET_F32: Opcode = 0xbc;
pub const I64_REINTERPRET_F64: Opcode = 0xbd;
pub const F32_REINTERPRET_I32: Opcode = 0xbe;
pub const F64_REINTERPRET_I64: Opcode = 0xbf;

// Sign extension
pub const I32_EXTEND8_S: Opcode = 0xc0;
pub const I32_EXTEND16_S: Opcode = 0xc1;
pub const I64_EXTEND8_S: Opcode = 0xc2;
pub const I64_EXTEND16_S: Opcode = 0xc3;
pub const I64_EXTEND32_S: Opcode = 0xc4;

/// Prefix byte for the miscellaneous instruction space
pub const MISC_PREFIX: Opcode = 0xfc;

// 0xFC sub-opcodes (LEB128 u32 after the prefix)
pub const MISC_I32_TRUNC_SAT_F32_S: u32 = 0x00;
pub const MISC_I32_TRUNC_SAT_F32_U: u32 = 0x01;
pub const MISC_I32_TRUNC_SAT_F64_S: u32 = 0x02;
pub const MISC_I32_TRUNC_SAT_F64_U: u32 = 0x03;
pub const MISC_I64_TRUNC_SAT_F32_S: u32 = 0x04;
pub const MISC_I64_TRUNC_SAT_F32_U: u32 = 0x05;
pub const MISC_I64_TRUNC_SAT_F64_S: u32 = 0x06;
pub const MISC_I64_TRUNC_SAT_F64_U: u32 = 0x07;

/// Block type byte for a block with no parameters or results
pub const BLOCK_TYPE_EMPTY: u8 = 0x40;

/// Human readable name of a single-byte opcode, used in compile errors
pub fn name(opcode: Opcode) -> &'static str {
    match opcode {
        UNREACHABLE => "unreachable",
        NOP => "nop",
        BLOCK => "block",
        LOOP => "loop",
        IF => "if",
        ELSE => "else",
        END => "end",
        BR => "br",
        BR_IF => "br_if",
        BR_TABLE => "br_table",
        RETURN => "return",
        CALL => "call",
        CALL_INDIRECT => "call_indirect",
        DROP => "drop",
        SELECT => "select",
        LOCAL_GET => "local.get",
        LOCAL_SET => "local.set",
        LOCAL_TEE => "local.tee",
        GLOBAL_GET => "global.get",
        GLOBAL_SET => "global.set",
        I32_LOAD => "i32.load",
        I64_LOAD => "i64.load",
        F32_LOAD => "f32.load",
        F64_LOAD => "f64.load",
        I32_LOAD8_S => "i32.load8_s",
        I32_LOAD8_U => "i32.load8_u",
        I32_LOAD16_S => "i32.load16_s",
        I32_LOAD16_U => "i32.load16_u",
        I64_LOAD8_S => "i64.load8_s",
        I64_LOAD8_U => "i64.load8_u",
        I64_LOAD16_S => "i64.load16_s",
        I64_LOAD16_U => "i64.load16_u",
        I64_LOAD32_S => "i64.load32_s",
        I64_LOAD32_U => "i64.load32_u",
        I32_STORE => "i32.store",
        I64_STORE => "i64.store",
        F32_STORE => "f32.store",
        F64_STORE => "f64.store",
        I32_STORE8 => "i32.store8",
        I32_STORE16 => "i32.store16",
        I64_STORE8 => "i64.store8",
        I64_STORE16 => "i64.store16",
        I64_STORE32 => "i64.store32",
        MEMORY_SIZE => "memory.size",
        MEMORY_GROW => "memory.grow",
        I32_CONST => "i32.const",
        I64_CONST => "i64.const",
        F32_CONST => "f32.const",
        F64_CONST => "f64.const",
        I32_EXTEND8_S => "i32.extend8_s",
        I32_EXTEND16_S => "i32.extend16_s",
        I64_EXTEND8_S => "i64.extend8_s",
        I64_EXTEND16_S => "i64.extend16_s",
        I64_EXTEND32_S => "i64.extend32_s",
        MISC_PREFIX => "misc",
        I32_EQZ..=F64_REINTERPRET_I64 => "numeric",
        _ => "unknown",
    }
}
