//! Flat intermediate representation executed by the interpreter
//!
//! Structured WebAssembly control flow (`block`, `loop`, `if`) is lowered
//! away by the [`compiler`]: every branch carries a resolved destination, the
//! operand-stack height to unwind to and the number of values it carries.
//! Operations are typed only as far as the handler needs; the operand stack
//! itself is untyped.

pub mod compiler;

pub use compiler::{compile_function, CompileError};

/// Operand type of numeric operations that work on every number type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumType {
    I32,
    I64,
    F32,
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntType {
    I32,
    I64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatType {
    F32,
    F64,
}

/// Integer type with its signedness interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedInt {
    I32,
    U32,
    I64,
    U64,
}

/// Operand type for comparisons and division, where integer signedness matters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedType {
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    I32,
    I64,
    F32,
    F64,
    I32Load8S,
    I32Load8U,
    I32Load16S,
    I32Load16U,
    I64Load8S,
    I64Load8U,
    I64Load16S,
    I64Load16U,
    I64Load32S,
    I64Load32U,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    I32,
    I64,
    F32,
    F64,
    I32Store8,
    I32Store16,
    I64Store8,
    I64Store16,
    I64Store32,
}

/// Resolved destination of a branch
///
/// `height` is measured from the frame base (so it includes the frame's
/// locals). On a taken branch the top `arity` values are kept and moved down
/// to `height`, everything between is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchTarget {
    /// Destination index in the operation list, `None` returns from the function
    pub pc: Option<usize>,
    pub height: u32,
    pub arity: u32,
}

impl BranchTarget {
    /// Target that leaves the function with `arity` results
    pub fn function_return(arity: u32) -> Self {
        BranchTarget {
            pc: None,
            height: 0,
            arity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Unreachable,
    Br(BranchTarget),
    /// Pop an i32; branch when it is non-zero
    BrIf(BranchTarget),
    BrTable {
        targets: Box<[BranchTarget]>,
        default: BranchTarget,
    },
    /// Unconditional jump within the current stack height
    Jump(usize),
    /// Pop an i32; jump when it is zero
    JumpIfZero(usize),
    Call(u32),
    CallIndirect {
        type_index: u32,
    },

    Drop,
    Select,

    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),

    Load {
        kind: LoadKind,
        offset: u32,
    },
    Store {
        kind: StoreKind,
        offset: u32,
    },
    MemorySize,
    MemoryGrow,

    ConstI32(i32),
    ConstI64(i64),
    ConstF32(f32),
    ConstF64(f64),

    Eqz(IntType),
    Eq(NumType),
    Ne(NumType),
    Lt(SignedType),
    Gt(SignedType),
    Le(SignedType),
    Ge(SignedType),

    Clz(IntType),
    Ctz(IntType),
    Popcnt(IntType),
    Add(NumType),
    Sub(NumType),
    Mul(NumType),
    Div(SignedType),
    Rem(SignedInt),
    And(IntType),
    Or(IntType),
    Xor(IntType),
    Shl(IntType),
    Shr(SignedInt),
    Rotl(IntType),
    Rotr(IntType),

    Abs(FloatType),
    Neg(FloatType),
    Ceil(FloatType),
    Floor(FloatType),
    Trunc(FloatType),
    Nearest(FloatType),
    Sqrt(FloatType),
    Min(FloatType),
    Max(FloatType),
    Copysign(FloatType),

    I32WrapFromI64,
    ITruncFromF {
        input: FloatType,
        output: SignedInt,
        saturating: bool,
    },
    FConvertFromI {
        input: SignedInt,
        output: FloatType,
    },
    F32DemoteFromF64,
    F64PromoteFromF32,
    I64ExtendFromI32 {
        signed: bool,
    },
    SignExtend32From8,
    SignExtend32From16,
    SignExtend64From8,
    SignExtend64From16,
    SignExtend64From32,
}
