//! Lowering of WebAssembly code bytes to [`Operation`]s
//!
//! The compiler walks a function body once. It tracks the operand-stack
//! height (relative to the frame base, locals included) so every branch can
//! be given the height to unwind to, and it keeps a stack of open control
//! blocks whose forward branches are patched when the block's `end` is
//! reached. Code after an unconditional transfer of control is decoded but
//! not emitted.

use super::*;
use crate::parser::module::{FunctionType, Module, ValueType};
use crate::parser::opcode::{self, *};
use crate::parser::reader::Reader;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("function[{function}]: handling {instruction} at offset {offset}: {cause}")]
    Instruction {
        function: u32,
        instruction: &'static str,
        offset: usize,
        cause: String,
    },
    #[error("function[{function}]: {cause}")]
    Function { function: u32, cause: String },
}

/// Result of compiling one function body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledBody {
    pub operations: Vec<Operation>,
    /// Byte offset of the instruction behind each operation, empty unless compiled for debug
    pub source_offsets: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Function,
    Block,
    Loop { start: usize },
    If { else_jump: Option<usize> },
}

#[derive(Debug)]
struct ControlFrame {
    kind: BlockKind,
    /// Height below the block's parameters
    start_height: u32,
    params: u32,
    results: u32,
    fixups: Vec<Fixup>,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Single,
    Table(usize),
    Default,
}

#[derive(Debug, Clone, Copy)]
struct Fixup {
    op: usize,
    slot: Slot,
}

struct Compiler<'m> {
    module: &'m Module,
    func_type: &'m FunctionType,
    local_count: u32,
    for_debug: bool,
    operations: Vec<Operation>,
    source_offsets: Vec<usize>,
    controls: Vec<ControlFrame>,
    height: u32,
    unreachable: bool,
    /// Blocks opened while `unreachable`, which are skipped wholesale
    skipped_depth: u32,
    offset: usize,
}

/// Compile the body of the function at `index` in `module`'s function index space
pub fn compile_function(
    module: &Module,
    index: u32,
    locals: &[ValueType],
    body: &[u8],
    for_debug: bool,
) -> Result<CompiledBody, CompileError> {
    let func_type = module.function_type(index).ok_or_else(|| CompileError::Function {
        function: index,
        cause: "unknown function type".to_string(),
    })?;
    let local_count = (func_type.params.len() + locals.len()) as u32;
    let mut compiler = Compiler {
        module,
        func_type,
        local_count,
        for_debug,
        operations: Vec::new(),
        source_offsets: Vec::new(),
        controls: vec![ControlFrame {
            kind: BlockKind::Function,
            start_height: local_count,
            params: 0,
            results: func_type.results.len() as u32,
            fixups: Vec::new(),
        }],
        height: local_count,
        unreachable: false,
        skipped_depth: 0,
        offset: 0,
    };

    let mut reader = Reader::new(body);
    while !compiler.controls.is_empty() {
        compiler.offset = reader.pos();
        let op = reader.read_byte().map_err(|_| CompileError::Function {
            function: index,
            cause: "unexpected end of body, missing end instruction".to_string(),
        })?;
        compiler.handle(op, &mut reader).map_err(|cause| CompileError::Instruction {
            function: index,
            instruction: opcode::name(op),
            offset: compiler.offset,
            cause,
        })?;
    }
    if !reader.is_empty() {
        return Err(CompileError::Function {
            function: index,
            cause: format!("{} trailing bytes after final end", reader.remaining()),
        });
    }

    Ok(CompiledBody {
        operations: compiler.operations,
        source_offsets: compiler.source_offsets,
    })
}

fn immediate<T>(result: Result<T, io::Error>) -> Result<T, String> {
    result.map_err(|e| format!("reading immediates: {e}"))
}

impl Compiler<'_> {
    fn emit(&mut self, op: Operation) {
        self.operations.push(op);
        if self.for_debug {
            self.source_offsets.push(self.offset);
        }
    }

    fn pop(&mut self, n: u32) -> Result<(), String> {
        // block parameters sit above the floor and are popped like any other operand
        let floor = self.controls.last().map_or(0, |c| c.start_height);
        if self.height < floor + n {
            return Err(format!(
                "stack height underflow: need {n} values, have {}",
                self.height.saturating_sub(floor)
            ));
        }
        self.height -= n;
        Ok(())
    }

    fn push(&mut self, n: u32) {
        self.height += n;
    }

    fn handle(&mut self, op: Opcode, reader: &mut Reader) -> Result<(), String> {
        if self.unreachable {
            return self.skip(op, reader);
        }

        match op {
            UNREACHABLE => {
                self.emit(Operation::Unreachable);
                self.mark_unreachable();
            }
            NOP => {}
            BLOCK | LOOP | IF => {
                let (params, results) = self.block_type(reader)?;
                if op == IF {
                    self.pop(1)?;
                }
                self.pop(params)?;
                let start_height = self.height;
                self.push(params);
                let kind = match op {
                    BLOCK => BlockKind::Block,
                    LOOP => BlockKind::Loop {
                        start: self.operations.len(),
                    },
                    _ => {
                        let at = self.operations.len();
                        self.emit(Operation::JumpIfZero(0));
                        BlockKind::If { else_jump: Some(at) }
                    }
                };
                self.controls.push(ControlFrame {
                    kind,
                    start_height,
                    params,
                    results,
                    fixups: Vec::new(),
                });
            }
            ELSE => self.handle_else()?,
            END => self.handle_end()?,
            BR => {
                let depth = immediate(reader.read_vu32())?;
                let op_index = self.operations.len();
                let target = self.branch_target(depth, op_index, Slot::Single)?;
                self.emit(Operation::Br(target));
                self.mark_unreachable();
            }
            BR_IF => {
                let depth = immediate(reader.read_vu32())?;
                self.pop(1)?;
                let op_index = self.operations.len();
                let target = self.branch_target(depth, op_index, Slot::Single)?;
                self.emit(Operation::BrIf(target));
            }
            BR_TABLE => {
                let count = immediate(reader.read_vu32())?;
                let depths = (0..count)
                    .map(|_| immediate(reader.read_vu32()))
                    .collect::<Result<Vec<_>, _>>()?;
                let default_depth = immediate(reader.read_vu32())?;
                self.pop(1)?;
                let op_index = self.operations.len();
                let targets = depths
                    .iter()
                    .enumerate()
                    .map(|(i, depth)| self.branch_target(*depth, op_index, Slot::Table(i)))
                    .collect::<Result<Vec<_>, _>>()?;
                let default = self.branch_target(default_depth, op_index, Slot::Default)?;
                self.emit(Operation::BrTable {
                    targets: targets.into_boxed_slice(),
                    default,
                });
                self.mark_unreachable();
            }
            RETURN => {
                self.emit(Operation::Br(BranchTarget::function_return(
                    self.func_type.results.len() as u32,
                )));
                self.mark_unreachable();
            }
            CALL => {
                let index = immediate(reader.read_vu32())?;
                let callee = self
                    .module
                    .function_type(index)
                    .ok_or_else(|| format!("invalid function index {index}"))?;
                let (params, results) = (callee.params.len() as u32, callee.results.len() as u32);
                self.pop(params)?;
                self.push(results);
                self.emit(Operation::Call(index));
            }
            CALL_INDIRECT => {
                let type_index = immediate(reader.read_vu32())?;
                let table = immediate(reader.read_byte())?;
                if table != 0 || self.module.table().is_none() {
                    return Err(format!("unknown table {table}"));
                }
                let ty = self
                    .module
                    .types()
                    .get(type_index as usize)
                    .ok_or_else(|| format!("invalid type index {type_index}"))?;
                let (params, results) = (ty.params.len() as u32, ty.results.len() as u32);
                self.pop(1 + params)?;
                self.push(results);
                self.emit(Operation::CallIndirect { type_index });
            }
            DROP => {
                self.pop(1)?;
                self.emit(Operation::Drop);
            }
            SELECT => {
                self.pop(3)?;
                self.push(1);
                self.emit(Operation::Select);
            }
            LOCAL_GET | LOCAL_SET | LOCAL_TEE => {
                let index = immediate(reader.read_vu32())?;
                if index >= self.local_count {
                    return Err(format!("invalid local index {index}"));
                }
                match op {
                    LOCAL_GET => {
                        self.push(1);
                        self.emit(Operation::LocalGet(index));
                    }
                    LOCAL_SET => {
                        self.pop(1)?;
                        self.emit(Operation::LocalSet(index));
                    }
                    _ => {
                        self.pop(1)?;
                        self.push(1);
                        self.emit(Operation::LocalTee(index));
                    }
                }
            }
            GLOBAL_GET | GLOBAL_SET => {
                let index = immediate(reader.read_vu32())?;
                let global = self
                    .module
                    .globals()
                    .get(index as usize)
                    .ok_or_else(|| format!("invalid global index {index}"))?;
                if op == GLOBAL_GET {
                    self.push(1);
                    self.emit(Operation::GlobalGet(index));
                } else {
                    if !global.mutable {
                        return Err(format!("global {index} is immutable"));
                    }
                    self.pop(1)?;
                    self.emit(Operation::GlobalSet(index));
                }
            }
            I32_LOAD..=I64_LOAD32_U => {
                let offset = self.memarg(reader)?;
                self.pop(1)?;
                self.push(1);
                self.emit(Operation::Load {
                    kind: load_kind(op),
                    offset,
                });
            }
            I32_STORE..=I64_STORE32 => {
                let offset = self.memarg(reader)?;
                self.pop(2)?;
                self.emit(Operation::Store {
                    kind: store_kind(op),
                    offset,
                });
            }
            MEMORY_SIZE | MEMORY_GROW => {
                let reserved = immediate(reader.read_byte())?;
                if reserved != 0 {
                    return Err(format!("unknown memory {reserved}"));
                }
                self.require_memory()?;
                if op == MEMORY_SIZE {
                    self.push(1);
                    self.emit(Operation::MemorySize);
                } else {
                    self.pop(1)?;
                    self.push(1);
                    self.emit(Operation::MemoryGrow);
                }
            }
            I32_CONST => {
                let v = immediate(reader.read_vs32())?;
                self.push(1);
                self.emit(Operation::ConstI32(v));
            }
            I64_CONST => {
                let v = immediate(reader.read_vs64())?;
                self.push(1);
                self.emit(Operation::ConstI64(v));
            }
            F32_CONST => {
                let v = immediate(reader.read_f32())?;
                self.push(1);
                self.emit(Operation::ConstF32(v));
            }
            F64_CONST => {
                let v = immediate(reader.read_f64())?;
                self.push(1);
                self.emit(Operation::ConstF64(v));
            }
            // the operand stack is untyped, so reinterpretation is free
            I32_REINTERPRET_F32 | I64_REINTERPRET_F64 | F32_REINTERPRET_I32 | F64_REINTERPRET_I64 => {
                self.pop(1)?;
                self.push(1);
            }
            MISC_PREFIX => {
                let sub = immediate(reader.read_vu32())?;
                let (input, output) = match sub {
                    MISC_I32_TRUNC_SAT_F32_S => (FloatType::F32, SignedInt::I32),
                    MISC_I32_TRUNC_SAT_F32_U => (FloatType::F32, SignedInt::U32),
                    MISC_I32_TRUNC_SAT_F64_S => (FloatType::F64, SignedInt::I32),
                    MISC_I32_TRUNC_SAT_F64_U => (FloatType::F64, SignedInt::U32),
                    MISC_I64_TRUNC_SAT_F32_S => (FloatType::F32, SignedInt::I64),
                    MISC_I64_TRUNC_SAT_F32_U => (FloatType::F32, SignedInt::U64),
                    MISC_I64_TRUNC_SAT_F64_S => (FloatType::F64, SignedInt::I64),
                    MISC_I64_TRUNC_SAT_F64_U => (FloatType::F64, SignedInt::U64),
                    _ => return Err(format!("unsupported misc instruction 0x{sub:x}")),
                };
                self.pop(1)?;
                self.push(1);
                self.emit(Operation::ITruncFromF {
                    input,
                    output,
                    saturating: true,
                });
            }
            _ => {
                let (operation, pops) =
                    numeric(op).ok_or_else(|| format!("unsupported instruction 0x{op:02x}"))?;
                self.pop(pops)?;
                self.push(1);
                self.emit(operation);
            }
        }
        Ok(())
    }

    /// Decode an instruction in dead code, tracking only block nesting
    fn skip(&mut self, op: Opcode, reader: &mut Reader) -> Result<(), String> {
        match op {
            BLOCK | LOOP | IF => {
                self.block_type(reader)?;
                self.skipped_depth += 1;
            }
            ELSE if self.skipped_depth == 0 => self.handle_else()?,
            END if self.skipped_depth == 0 => self.handle_end()?,
            END => self.skipped_depth -= 1,
            ELSE => {}
            BR | BR_IF | CALL | LOCAL_GET | LOCAL_SET | LOCAL_TEE | GLOBAL_GET | GLOBAL_SET => {
                immediate(reader.read_vu32())?;
            }
            BR_TABLE => {
                let count = immediate(reader.read_vu32())?;
                for _ in 0..=count {
                    immediate(reader.read_vu32())?;
                }
            }
            CALL_INDIRECT => {
                immediate(reader.read_vu32())?;
                immediate(reader.read_byte())?;
            }
            I32_LOAD..=I64_STORE32 => {
                immediate(reader.read_vu32())?;
                immediate(reader.read_vu32())?;
            }
            MEMORY_SIZE | MEMORY_GROW => {
                immediate(reader.read_byte())?;
            }
            I32_CONST => {
                immediate(reader.read_vs32())?;
            }
            I64_CONST => {
                immediate(reader.read_vs64())?;
            }
            F32_CONST => {
                immediate(reader.read_bytes(4))?;
            }
            F64_CONST => {
                immediate(reader.read_bytes(8))?;
            }
            MISC_PREFIX => {
                immediate(reader.read_vu32())?;
            }
            UNREACHABLE | NOP | RETURN | DROP | SELECT => {}
            I32_REINTERPRET_F32 | I64_REINTERPRET_F64 | F32_REINTERPRET_I32 | F64_REINTERPRET_I64 => {}
            _ if numeric(op).is_some() => {}
            _ => return Err(format!("unsupported instruction 0x{op:02x}")),
        }
        Ok(())
    }

    fn mark_unreachable(&mut self) {
        self.unreachable = true;
        self.skipped_depth = 0;
    }

    fn handle_else(&mut self) -> Result<(), String> {
        let Some(frame) = self.controls.last() else {
            return Err("else outside of block".to_string());
        };
        let BlockKind::If { else_jump: Some(jump) } = frame.kind else {
            return Err("else without matching if".to_string());
        };
        let (start_height, params, results) = (frame.start_height, frame.params, frame.results);
        if !self.unreachable && self.height != start_height + results {
            return Err(format!(
                "if arm leaves {} values on the stack, expected {results}",
                self.height.saturating_sub(start_height)
            ));
        }

        // the then-arm falls through to the end of the whole if
        let op_index = self.operations.len();
        self.emit(Operation::Jump(0));
        let else_start = self.operations.len();
        if let Some(frame) = self.controls.last_mut() {
            frame.fixups.push(Fixup {
                op: op_index,
                slot: Slot::Single,
            });
            frame.kind = BlockKind::If { else_jump: None };
        }
        self.patch(
            Fixup {
                op: jump,
                slot: Slot::Single,
            },
            else_start,
        );
        self.height = start_height + params;
        self.unreachable = false;
        Ok(())
    }

    fn handle_end(&mut self) -> Result<(), String> {
        let Some(frame) = self.controls.pop() else {
            return Err("end outside of block".to_string());
        };
        if !self.unreachable {
            let expected = frame.start_height + frame.results;
            if self.height != expected {
                return Err(format!(
                    "block leaves {} values on the stack, expected {}",
                    self.height.saturating_sub(frame.start_height),
                    frame.results
                ));
            }
        }
        // a missing else arm passes the block parameters straight through
        if matches!(frame.kind, BlockKind::If { else_jump: Some(_) }) && frame.params != frame.results {
            return Err(format!(
                "if without else must have matching parameters and results, got {} and {}",
                frame.params, frame.results
            ));
        }
        self.unreachable = false;
        self.skipped_depth = 0;
        self.height = frame.start_height + frame.results;

        if frame.kind == BlockKind::Function {
            self.emit(Operation::Br(BranchTarget::function_return(frame.results)));
            return Ok(());
        }
        let end = self.operations.len();
        if let BlockKind::If { else_jump: Some(jump) } = frame.kind {
            self.patch(
                Fixup {
                    op: jump,
                    slot: Slot::Single,
                },
                end,
            );
        }
        for fixup in frame.fixups {
            self.patch(fixup, end);
        }
        Ok(())
    }

    fn branch_target(&mut self, depth: u32, op: usize, slot: Slot) -> Result<BranchTarget, String> {
        let len = self.controls.len();
        if depth as usize >= len {
            return Err(format!("invalid label {depth}"));
        }
        let frame = &mut self.controls[len - 1 - depth as usize];
        let target = match frame.kind {
            BlockKind::Function => BranchTarget::function_return(frame.results),
            BlockKind::Loop { start } => BranchTarget {
                pc: Some(start),
                height: frame.start_height,
                arity: frame.params,
            },
            BlockKind::Block | BlockKind::If { .. } => {
                frame.fixups.push(Fixup { op, slot });
                BranchTarget {
                    pc: Some(0),
                    height: frame.start_height,
                    arity: frame.results,
                }
            }
        };
        Ok(target)
    }

    fn patch(&mut self, fixup: Fixup, pc: usize) {
        match (&mut self.operations[fixup.op], fixup.slot) {
            (Operation::Br(target) | Operation::BrIf(target), Slot::Single) => target.pc = Some(pc),
            (Operation::Jump(to) | Operation::JumpIfZero(to), Slot::Single) => *to = pc,
            (Operation::BrTable { targets, .. }, Slot::Table(i)) => targets[i].pc = Some(pc),
            (Operation::BrTable { default, .. }, Slot::Default) => default.pc = Some(pc),
            _ => {}
        }
    }

    /// Decode a block type into (parameter count, result count)
    fn block_type(&self, reader: &mut Reader) -> Result<(u32, u32), String> {
        let encoded = immediate(reader.read_vs64())?;
        match encoded {
            -64 => Ok((0, 0)),
            -4..=-1 => Ok((0, 1)),
            index if index >= 0 => {
                let ty = self
                    .module
                    .types()
                    .get(index as usize)
                    .ok_or_else(|| format!("invalid block type index {index}"))?;
                Ok((ty.params.len() as u32, ty.results.len() as u32))
            }
            other => Err(format!("invalid block type {other}")),
        }
    }

    fn memarg(&self, reader: &mut Reader) -> Result<u32, String> {
        let _align = immediate(reader.read_vu32())?;
        let offset = immediate(reader.read_vu32())?;
        self.require_memory()?;
        Ok(offset)
    }

    fn require_memory(&self) -> Result<(), String> {
        match self.module.memory() {
            Some(_) => Ok(()),
            None => Err("memory instruction without memory".to_string()),
        }
    }
}

fn load_kind(op: Opcode) -> LoadKind {
    match op {
        I32_LOAD => LoadKind::I32,
        I64_LOAD => LoadKind::I64,
        F32_LOAD => LoadKind::F32,
        F64_LOAD => LoadKind::F64,
        I32_LOAD8_S => LoadKind::I32Load8S,
        I32_LOAD8_U => LoadKind::I32Load8U,
        I32_LOAD16_S => LoadKind::I32Load16S,
        I32_LOAD16_U => LoadKind::I32Load16U,
        I64_LOAD8_S => LoadKind::I64Load8S,
        I64_LOAD8_U => LoadKind::I64Load8U,
        I64_LOAD16_S => LoadKind::I64Load16S,
        I64_LOAD16_U => LoadKind::I64Load16U,
        I64_LOAD32_S => LoadKind::I64Load32S,
        _ => LoadKind::I64Load32U,
    }
}

fn store_kind(op: Opcode) -> StoreKind {
    match op {
        I32_STORE => StoreKind::I32,
        I64_STORE => StoreKind::I64,
        F32_STORE => StoreKind::F32,
        F64_STORE => StoreKind::F64,
        I32_STORE8 => StoreKind::I32Store8,
        I32_STORE16 => StoreKind::I32Store16,
        I64_STORE8 => StoreKind::I64Store8,
        I64_STORE16 => StoreKind::I64Store16,
        _ => StoreKind::I64Store32,
    }
}

/// Operation for an immediate-free numeric opcode, with the number of operands it pops.
/// Every numeric operation pushes exactly one value.
fn numeric(op: Opcode) -> Option<(Operation, u32)> {
    use Operation as O;
    let unary = |o: Operation| -> Option<(Operation, u32)> { Some((o, 1)) };
    let binary = |o: Operation| -> Option<(Operation, u32)> { Some((o, 2)) };
    match op {
        I32_EQZ => unary(O::Eqz(IntType::I32)),
        I32_EQ => binary(O::Eq(NumType::I32)),
        I32_NE => binary(O::Ne(NumType::I32)),
        I32_LT_S => binary(O::Lt(SignedType::I32)),
        I32_LT_U => binary(O::Lt(SignedType::U32)),
        I32_GT_S => binary(O::Gt(SignedType::I32)),
        I32_GT_U => binary(O::Gt(SignedType::U32)),
        I32_LE_S => binary(O::Le(SignedType::I32)),
        I32_LE_U => binary(O::Le(SignedType::U32)),
        I32_GE_S => binary(O::Ge(SignedType::I32)),
        I32_GE_U => binary(O::Ge(SignedType::U32)),

        I64_EQZ => unary(O::Eqz(IntType::I64)),
        I64_EQ => binary(O::Eq(NumType::I64)),
        I64_NE => binary(O::Ne(NumType::I64)),
        I64_LT_S => binary(O::Lt(SignedType::I64)),
        I64_LT_U => binary(O::Lt(SignedType::U64)),
        I64_GT_S => binary(O::Gt(SignedType::I64)),
        I64_GT_U => binary(O::Gt(SignedType::U64)),
        I64_LE_S => binary(O::Le(SignedType::I64)),
        I64_LE_U => binary(O::Le(SignedType::U64)),
        I64_GE_S => binary(O::Ge(SignedType::I64)),
        I64_GE_U => binary(O::Ge(SignedType::U64)),

        F32_EQ => binary(O::Eq(NumType::F32)),
        F32_NE => binary(O::Ne(NumType::F32)),
        F32_LT => binary(O::Lt(SignedType::F32)),
        F32_GT => binary(O::Gt(SignedType::F32)),
        F32_LE => binary(O::Le(SignedType::F32)),
        F32_GE => binary(O::Ge(SignedType::F32)),
        F64_EQ => binary(O::Eq(NumType::F64)),
        F64_NE => binary(O::Ne(NumType::F64)),
        F64_LT => binary(O::Lt(SignedType::F64)),
        F64_GT => binary(O::Gt(SignedType::F64)),
        F64_LE => binary(O::Le(SignedType::F64)),
        F64_GE => binary(O::Ge(SignedType::F64)),

        I32_CLZ => unary(O::Clz(IntType::I32)),
        I32_CTZ => unary(O::Ctz(IntType::I32)),
        I32_POPCNT => unary(O::Popcnt(IntType::I32)),
        I32_ADD => binary(O::Add(NumType::I32)),
        I32_SUB => binary(O::Sub(NumType::I32)),
        I32_MUL => binary(O::Mul(NumType::I32)),
        I32_DIV_S => binary(O::Div(SignedType::I32)),
        I32_DIV_U => binary(O::Div(SignedType::U32)),
        I32_REM_S => binary(O::Rem(SignedInt::I32)),
        I32_REM_U => binary(O::Rem(SignedInt::U32)),
        I32_AND => binary(O::And(IntType::I32)),
        I32_OR => binary(O::Or(IntType::I32)),
        I32_XOR => binary(O::Xor(IntType::I32)),
        I32_SHL => binary(O::Shl(IntType::I32)),
        I32_SHR_S => binary(O::Shr(SignedInt::I32)),
        I32_SHR_U => binary(O::Shr(SignedInt::U32)),
        I32_ROTL => binary(O::Rotl(IntType::I32)),
        I32_ROTR => binary(O::Rotr(IntType::I32)),

        I64_CLZ => unary(O::Clz(IntType::I64)),
        I64_CTZ => unary(O::Ctz(IntType::I64)),
        I64_POPCNT => unary(O::Popcnt(IntType::I64)),
        I64_ADD => binary(O::Add(NumType::I64)),
        I64_SUB => binary(O::Sub(NumType::I64)),
        I64_MUL => binary(O::Mul(NumType::I64)),
        I64_DIV_S => binary(O::Div(SignedType::I64)),
        I64_DIV_U => binary(O::Div(SignedType::U64)),
        I64_REM_S => binary(O::Rem(SignedInt::I64)),
        I64_REM_U => binary(O::Rem(SignedInt::U64)),
        I64_AND => binary(O::And(IntType::I64)),
        I64_OR => binary(O::Or(IntType::I64)),
        I64_XOR => binary(O::Xor(IntType::I64)),
        I64_SHL => binary(O::Shl(IntType::I64)),
        I64_SHR_S => binary(O::Shr(SignedInt::I64)),
        I64_SHR_U => binary(O::Shr(SignedInt::U64)),
        I64_ROTL => binary(O::Rotl(IntType::I64)),
        I64_ROTR => binary(O::Rotr(IntType::I64)),

        F32_ABS => unary(O::Abs(FloatType::F32)),
        F32_NEG => unary(O::Neg(FloatType::F32)),
        F32_CEIL => unary(O::Ceil(FloatType::F32)),
        F32_FLOOR => unary(O::Floor(FloatType::F32)),
        F32_TRUNC => unary(O::Trunc(FloatType::F32)),
        F32_NEAREST => unary(O::Nearest(FloatType::F32)),
        F32_SQRT => unary(O::Sqrt(FloatType::F32)),
        F32_ADD => binary(O::Add(NumType::F32)),
        F32_SUB => binary(O::Sub(NumType::F32)),
        F32_MUL => binary(O::Mul(NumType::F32)),
        F32_DIV => binary(O::Div(SignedType::F32)),
        F32_MIN => binary(O::Min(FloatType::F32)),
        F32_MAX => binary(O::Max(FloatType::F32)),
        F32_COPYSIGN => binary(O::Copysign(FloatType::F32)),

        F64_ABS => unary(O::Abs(FloatType::F64)),
        F64_NEG => unary(O::Neg(FloatType::F64)),
        F64_CEIL => unary(O::Ceil(FloatType::F64)),
        F64_FLOOR => unary(O::Floor(FloatType::F64)),
        F64_TRUNC => unary(O::Trunc(FloatType::F64)),
        F64_NEAREST => unary(O::Nearest(FloatType::F64)),
        F64_SQRT => unary(O::Sqrt(FloatType::F64)),
        F64_ADD => binary(O::Add(NumType::F64)),
        F64_SUB => binary(O::Sub(NumType::F64)),
        F64_MUL => binary(O::Mul(NumType::F64)),
        F64_DIV => binary(O::Div(SignedType::F64)),
        F64_MIN => binary(O::Min(FloatType::F64)),
        F64_MAX => binary(O::Max(FloatType::F64)),
        F64_COPYSIGN => binary(O::Copysign(FloatType::F64)),

        I32_WRAP_I64 => unary(O::I32WrapFromI64),
        I32_TRUNC_F32_S => unary(trunc(FloatType::F32, SignedInt::I32)),
        I32_TRUNC_F32_U => unary(trunc(FloatType::F32, SignedInt::U32)),
        I32_TRUNC_F64_S => unary(trunc(FloatType::F64, SignedInt::I32)),
        I32_TRUNC_F64_U => unary(trunc(FloatType::F64, SignedInt::U32)),
        I64_EXTEND_I32_S => unary(O::I64ExtendFromI32 { signed: true }),
        I64_EXTEND_I32_U => unary(O::I64ExtendFromI32 { signed: false }),
        I64_TRUNC_F32_S => unary(trunc(FloatType::F32, SignedInt::I64)),
        I64_TRUNC_F32_U => unary(trunc(FloatType::F32, SignedInt::U64)),
        I64_TRUNC_F64_S => unary(trunc(FloatType::F64, SignedInt::I64)),
        I64_TRUNC_F64_U => unary(trunc(FloatType::F64, SignedInt::U64)),
        F32_CONVERT_I32_S => unary(convert(SignedInt::I32, FloatType::F32)),
        F32_CONVERT_I32_U => unary(convert(SignedInt::U32, FloatType::F32)),
        F32_CONVERT_I64_S => unary(convert(SignedInt::I64, FloatType::F32)),
        F32_CONVERT_I64_U => unary(convert(SignedInt::U64, FloatType::F32)),
        F32_DEMOTE_F64 => unary(O::F32DemoteFromF64),
        F64_CONVERT_I32_S => unary(convert(SignedInt::I32, FloatType::F64)),
        F64_CONVERT_I32_U => unary(convert(SignedInt::U32, FloatType::F64)),
        F64_CONVERT_I64_S => unary(convert(SignedInt::I64, FloatType::F64)),
        F64_CONVERT_I64_U => unary(convert(SignedInt::U64, FloatType::F64)),
        F64_PROMOTE_F32 => unary(O::F64PromoteFromF32),

        I32_EXTEND8_S => unary(O::SignExtend32From8),
        I32_EXTEND16_S => unary(O::SignExtend32From16),
        I64_EXTEND8_S => unary(O::SignExtend64From8),
        I64_EXTEND16_S => unary(O::SignExtend64From16),
        I64_EXTEND32_S => unary(O::SignExtend64From32),
        _ => None,
    }
}

fn trunc(input: FloatType, output: SignedInt) -> Operation {
    Operation::ITruncFromF {
        input,
        output,
        saturating: false,
    }
}

fn convert(input: SignedInt, output: FloatType) -> Operation {
    Operation::FConvertFromI { input, output }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::Module;
    use crate::parser::reader::{emit_vs32, emit_vu32};

    fn module_with(types: Vec<(Vec<ValueType>, Vec<ValueType>)>, bodies: Vec<Vec<u8>>) -> Module {
        let mut builder = Module::builder("test").memory(1, None).table(2, None);
        for (params, results) in types {
            builder = builder.func_type(params, results);
        }
        for body in bodies {
            builder = builder.function(0, vec![ValueType::I32], body);
        }
        builder.global(true, crate::runtime::Value::I32(0)).build()
    }

    fn compile(module: &Module, index: u32) -> Result<CompiledBody, CompileError> {
        let crate::parser::module::Code::Wasm { locals, body } = &module.code()[index as usize] else {
            panic!("expected wasm code");
        };
        compile_function(module, index, locals, body, true)
    }

    fn i32_i32() -> (Vec<ValueType>, Vec<ValueType>) {
        (vec![ValueType::I32], vec![ValueType::I32])
    }

    #[test]
    fn test_empty_body() {
        let module = module_with(vec![(vec![], vec![])], vec![vec![END]]);
        let compiled = compile(&module, 0).unwrap();
        assert_eq!(
            compiled.operations,
            vec![Operation::Br(BranchTarget::function_return(0))]
        );
        assert_eq!(compiled.source_offsets, vec![0]);
    }

    #[test]
    fn test_call_without_immediate() {
        let module = module_with(vec![(vec![], vec![])], vec![vec![END], vec![CALL]]);
        let err = compile(&module, 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "function[1]: handling call at offset 0: reading immediates: EOF"
        );
    }

    #[test]
    fn test_missing_end() {
        let module = module_with(vec![(vec![], vec![])], vec![vec![NOP]]);
        let err = compile(&module, 0).unwrap_err();
        assert!(err.to_string().contains("missing end"), "{err}");
    }

    #[test]
    fn test_rejects_bad_indices() {
        let bad = [
            vec![LOCAL_GET, 9, DROP, END],
            vec![GLOBAL_GET, 3, DROP, END],
            vec![CALL, 7, END],
            vec![BR, 4, END],
            vec![0xff, END],
        ];
        for body in bad {
            let module = module_with(vec![(vec![], vec![])], vec![body.clone()]);
            assert!(compile(&module, 0).is_err(), "expected failure for {body:?}");
        }
    }

    #[test]
    fn test_stack_underflow() {
        let module = module_with(vec![(vec![], vec![])], vec![vec![I32_ADD, END]]);
        let err = compile(&module, 0).unwrap_err();
        assert!(err.to_string().contains("underflow"), "{err}");
    }

    #[test]
    fn test_params_and_locals_count_towards_height() {
        // (param i32) (local i32) local.get 0 return
        let module = module_with(vec![i32_i32()], vec![vec![LOCAL_GET, 0, RETURN, END]]);
        let compiled = compile(&module, 0).unwrap();
        assert_eq!(
            compiled.operations,
            vec![
                Operation::LocalGet(0),
                Operation::Br(BranchTarget::function_return(1)),
                Operation::Br(BranchTarget::function_return(1)),
            ]
        );
    }

    #[test]
    fn test_block_branch_resolves_to_end() {
        // block (result i32) i32.const 1 br 0 i32.const 2 end
        let mut body = vec![BLOCK, 0x7f, I32_CONST];
        body.extend(emit_vs32(1));
        body.extend([BR, 0, I32_CONST, 2, END, END]);
        let module = module_with(vec![(vec![], vec![ValueType::I32])], vec![body]);
        let compiled = compile(&module, 0).unwrap();
        assert_eq!(
            compiled.operations,
            vec![
                Operation::ConstI32(1),
                Operation::Br(BranchTarget {
                    pc: Some(2),
                    height: 1,
                    arity: 1
                }),
                Operation::Br(BranchTarget::function_return(1)),
            ]
        );
    }

    #[test]
    fn test_loop_branch_resolves_to_start() {
        // loop br_if 0 (local.get 0) end
        let body = vec![LOOP, BLOCK_TYPE_EMPTY, LOCAL_GET, 0, BR_IF, 0, END, END];
        let module = module_with(vec![(vec![ValueType::I32], vec![])], vec![body]);
        let compiled = compile(&module, 0).unwrap();
        assert_eq!(
            compiled.operations[1],
            Operation::BrIf(BranchTarget {
                pc: Some(0),
                height: 2,
                arity: 0
            })
        );
    }

    #[test]
    fn test_if_else() {
        // local.get 0 if (result i32) i32.const 1 else i32.const 2 end
        let body = vec![
            LOCAL_GET, 0, IF, 0x7f, I32_CONST, 1, ELSE, I32_CONST, 2, END, END,
        ];
        let module = module_with(vec![i32_i32()], vec![body]);
        let compiled = compile(&module, 0).unwrap();
        assert_eq!(
            compiled.operations,
            vec![
                Operation::LocalGet(0),
                Operation::JumpIfZero(4),
                Operation::ConstI32(1),
                Operation::Jump(5),
                Operation::ConstI32(2),
                Operation::Br(BranchTarget::function_return(1)),
            ]
        );
    }

    #[test]
    fn test_if_arms_must_balance() {
        // i32.const 1 if (result i32) nop else i32.const 2 end
        let body = vec![I32_CONST, 1, IF, 0x7f, NOP, ELSE, I32_CONST, 2, END, END];
        let module = module_with(vec![(vec![], vec![ValueType::I32])], vec![body]);
        let err = compile(&module, 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "function[0]: handling else at offset 5: if arm leaves 0 values on the stack, expected 1"
        );

        // an arm ending in a branch may leave anything behind
        let body = vec![
            I32_CONST, 1, IF, 0x7f, I32_CONST, 3, RETURN, ELSE, I32_CONST, 2, END, END,
        ];
        let module = module_with(vec![(vec![], vec![ValueType::I32])], vec![body]);
        assert!(compile(&module, 0).is_ok());
    }

    #[test]
    fn test_if_without_else_must_not_produce_values() {
        // i32.const 1 if (result i32) i32.const 2 end
        let body = vec![I32_CONST, 1, IF, 0x7f, I32_CONST, 2, END, END];
        let module = module_with(vec![(vec![], vec![ValueType::I32])], vec![body]);
        let err = compile(&module, 0).unwrap_err();
        assert!(err.to_string().contains("if without else"), "{err}");

        // (param i32) (result i32) passes its parameter through
        let body = vec![
            I32_CONST, 7, I32_CONST, 1, IF, 1, I32_CONST, 1, I32_ADD, END, END,
        ];
        let module = module_with(vec![(vec![], vec![ValueType::I32]), i32_i32()], vec![body]);
        assert!(compile(&module, 0).is_ok());
    }

    #[test]
    fn test_br_table_targets() {
        // block block local.get 0 br_table 0 1 1 end end
        let mut body = vec![BLOCK, BLOCK_TYPE_EMPTY, BLOCK, BLOCK_TYPE_EMPTY, LOCAL_GET, 0, BR_TABLE];
        body.extend(emit_vu32(2));
        body.extend([0, 1, 1, END, END, END]);
        let module = module_with(vec![(vec![ValueType::I32], vec![])], vec![body]);
        let compiled = compile(&module, 0).unwrap();
        let Operation::BrTable { targets, default } = &compiled.operations[1] else {
            panic!("expected br_table, got {:?}", compiled.operations);
        };
        assert_eq!(targets[0].pc, Some(2));
        assert_eq!(targets[1].pc, Some(2));
        assert_eq!(default.pc, Some(2));
    }

    #[test]
    fn test_dead_code_is_skipped() {
        // return, then undecodable-looking but well-formed dead code
        let body = vec![
            RETURN, BLOCK, BLOCK_TYPE_EMPTY, I64_CONST, 0x7f, CALL, 0, END, I32_ADD, END,
        ];
        let module = module_with(vec![(vec![], vec![])], vec![body]);
        let compiled = compile(&module, 0).unwrap();
        assert_eq!(compiled.operations.len(), 2);
    }

    #[test]
    fn test_reinterpret_is_free() {
        let body = vec![LOCAL_GET, 0, F32_REINTERPRET_I32, I32_REINTERPRET_F32, END];
        let module = module_with(vec![i32_i32()], vec![body]);
        let compiled = compile(&module, 0).unwrap();
        assert_eq!(compiled.operations.len(), 2);
    }

    #[test]
    fn test_saturating_truncation() {
        let body = vec![LOCAL_GET, 0, MISC_PREFIX, 0x05, DROP, I32_CONST, 0, END];
        let module = module_with(vec![i32_i32()], vec![body]);
        let compiled = compile(&module, 0).unwrap();
        assert_eq!(
            compiled.operations[1],
            Operation::ITruncFromF {
                input: FloatType::F32,
                output: SignedInt::U64,
                saturating: true
            }
        );
    }

    #[test]
    fn test_memory_requires_memory() {
        let module = Module::builder("m")
            .func_type(vec![], vec![ValueType::I32])
            .function(0, vec![], vec![MEMORY_SIZE, 0, END])
            .build();
        let crate::parser::module::Code::Wasm { locals, body } = &module.code()[0] else {
            unreachable!()
        };
        let err = compile_function(&module, 0, locals, body, false).unwrap_err();
        assert!(err.to_string().contains("without memory"), "{err}");
    }
}
