//! The interpreter
//!
//! A `CallEngine` runs one invocation: it owns the operand stack and an
//! explicit frame stack, so WebAssembly-to-WebAssembly calls (local or
//! through an import) never recurse on the native stack. Host functions run
//! in-line: their parameters are popped from the caller's stack and their
//! results pushed back onto it.
//!
//! Listener `before` hooks fire on function entry and `after` hooks on normal
//! return. A fault unwinds the whole invocation without further `after`
//! notifications.

use super::code_cache::CodeBody;
use super::context::CallContext;
use super::frame::CallFrame;
use super::function::{Function, HostFunction};
use super::instance::{Caller, ModuleInstance};
use super::ops::{bitwise, comparison, conversion, memory, numeric};
use super::stack::Stack;
use super::{RuntimeError, TrapKind};
use super::engine::DEFAULT_MAX_HOST_REENTRY;
use crate::ir::{BranchTarget, Operation};
use crate::listener::StackIterator;
use std::rc::Rc;

/// Why the operation loop stopped executing the current frame
enum Exit {
    Return,
    Call(Rc<Function>),
}

#[derive(Debug)]
pub struct CallEngine {
    stack: Stack,
    frames: Vec<CallFrame>,
    ceiling: usize,
    /// How deeply host functions may nest calls back into WebAssembly
    reentry_limit: usize,
}

impl CallEngine {
    /// Create an engine allowing at most `ceiling` frames
    pub fn new(ceiling: usize) -> Self {
        CallEngine {
            stack: Stack::new(),
            frames: Vec::new(),
            ceiling,
            reentry_limit: DEFAULT_MAX_HOST_REENTRY,
        }
    }

    pub fn with_reentry_limit(mut self, limit: usize) -> Self {
        self.reentry_limit = limit;
        self
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    pub fn push_frame(&mut self, frame: CallFrame) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.ceiling {
            return Err(RuntimeError::StackOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    /// The top `n` operand words in stack order, left on the stack
    pub fn peek_values(&self, n: usize) -> &[u64] {
        if n == 0 {
            return &[];
        }
        self.stack.peek_n(n)
    }

    /// Invoke `function` with `params` and return its results
    ///
    /// On any fault the frames and operands of this invocation are discarded
    /// and the error returned.
    pub fn call(&mut self, ctx: &CallContext, function: &Rc<Function>, params: &[u64]) -> Result<Vec<u64>, RuntimeError> {
        let expected = function.func_type().params.len();
        if params.len() != expected {
            return Err(RuntimeError::InvalidArguments {
                expected,
                actual: params.len(),
            });
        }

        let height = self.stack.len();
        self.stack.push_all(params);
        match self.call_native_func(ctx, function) {
            Ok(()) => Ok(self.stack.pop_n(function.code().result_count())),
            Err(e) => {
                self.log_stack_trace(function, &e);
                self.frames.clear();
                self.stack.truncate(height);
                Err(e)
            }
        }
    }

    /// Run `function` with its parameters already on the stack, leaving its results there
    pub fn call_native_func(&mut self, ctx: &CallContext, function: &Rc<Function>) -> Result<(), RuntimeError> {
        let entry = self.frames.len();
        self.invoke(ctx, function)?;
        self.execute(ctx, entry)
    }

    fn invoke(&mut self, ctx: &CallContext, function: &Rc<Function>) -> Result<(), RuntimeError> {
        match function.code().body() {
            CodeBody::Host(host) => self.call_host(ctx, function, host),
            CodeBody::Wasm { local_count, .. } => self.enter(ctx, function, *local_count),
        }
    }

    /// Push a frame for a WebAssembly function whose parameters are on the stack
    fn enter(&mut self, ctx: &CallContext, function: &Rc<Function>, local_count: usize) -> Result<(), RuntimeError> {
        let code = function.code();
        let param_count = code.param_count();
        debug_assert!(self.stack.len() >= param_count, "operand stack underflow");
        let base = self.stack.len().saturating_sub(param_count);
        let depth = ctx.depth() + self.frames.len();

        self.push_frame(CallFrame::new(function.clone(), base))?;
        ctx.check()?;
        function.ensure_open()?;
        if let Some(listener) = code.listener() {
            let stack = StackIterator::new(None, &self.frames, self.stack.as_slice());
            listener.before(&ctx.at_depth(depth), code.definition(), self.stack.peek_n(param_count), stack);
        }
        self.stack.extend_zeroed(local_count);
        Ok(())
    }

    fn call_host(&mut self, ctx: &CallContext, function: &Rc<Function>, host: &HostFunction) -> Result<(), RuntimeError> {
        ctx.check()?;
        function.ensure_open()?;
        let code = function.code();
        let host_ctx = ctx.at_depth(ctx.depth() + self.frames.len());
        let params = self.stack.pop_n(code.param_count());
        if let Some(listener) = code.listener() {
            let top = Some((code.definition(), params.as_slice()));
            let stack = StackIterator::new(top, &self.frames, self.stack.as_slice());
            listener.before(&host_ctx, code.definition(), &params, stack);
        }

        // host functions act on the memory of the instance calling them
        let instance = match self.frames.last() {
            Some(frame) => frame.function.instance(),
            None => function.instance(),
        };
        let remaining = self.ceiling.saturating_sub(self.frames.len());
        let mut caller = Caller::new(&host_ctx, instance, remaining, self.reentry_limit);
        let results = host.call(&mut caller, &params)?;
        if results.len() != code.result_count() {
            return Err(RuntimeError::Host(format!(
                "{} returned {} results, expected {}",
                code.definition().debug_name(),
                results.len(),
                code.result_count()
            )));
        }

        if let Some(listener) = code.listener() {
            listener.after(&host_ctx, code.definition(), &results);
        }
        self.stack.push_all(&results);
        Ok(())
    }

    /// Pop the current frame, leaving its results where its parameters began
    fn return_from_frame(&mut self, ctx: &CallContext) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let code = frame.function.code();
        let result_count = code.result_count();
        self.stack.unwind(frame.base, result_count);
        if let Some(listener) = code.listener() {
            let depth = ctx.depth() + self.frames.len();
            listener.after(&ctx.at_depth(depth), code.definition(), self.stack.peek_n(result_count));
        }
    }

    /// Run frames until the stack drops back to `entry` frames
    fn execute(&mut self, ctx: &CallContext, entry: usize) -> Result<(), RuntimeError> {
        while self.frames.len() > entry {
            let Some(frame) = self.frames.last() else {
                break;
            };
            let function = frame.function.clone();
            let base = frame.base;
            let mut pc = frame.pc;

            let code = function.code().clone();
            let CodeBody::Wasm { operations, .. } = code.body() else {
                return Err(RuntimeError::Host(format!(
                    "{} has no WebAssembly body",
                    code.definition().debug_name()
                )));
            };
            let instance = function.instance();

            let exit = self.run(&function, instance.as_ref(), operations, base, &mut pc);
            if let Some(frame) = self.frames.last_mut() {
                frame.pc = pc;
            }
            match exit? {
                Exit::Return => self.return_from_frame(ctx),
                Exit::Call(callee) => self.invoke(ctx, &callee)?,
            }
        }
        Ok(())
    }

    /// Execute operations of one frame from `pc` until it returns or calls
    fn run(
        &mut self,
        function: &Function,
        instance: Option<&Rc<ModuleInstance>>,
        operations: &[Operation],
        base: usize,
        pc: &mut usize,
    ) -> Result<Exit, RuntimeError> {
        let stack = &mut self.stack;
        let instance = || {
            instance.ok_or_else(|| RuntimeError::ModuleClosed(function.definition().module_name.clone()))
        };

        while let Some(op) = operations.get(*pc) {
            *pc += 1;
            match op {
                Operation::Unreachable => return Err(TrapKind::Unreachable.into()),
                Operation::Br(target) => match branch(stack, base, target) {
                    Some(next) => *pc = next,
                    None => return Ok(Exit::Return),
                },
                Operation::BrIf(target) => {
                    if stack.pop_i32() != 0 {
                        match branch(stack, base, target) {
                            Some(next) => *pc = next,
                            None => return Ok(Exit::Return),
                        }
                    }
                }
                Operation::BrTable { targets, default } => {
                    let index = stack.pop_u32() as usize;
                    let target = targets.get(index).unwrap_or(default);
                    match branch(stack, base, target) {
                        Some(next) => *pc = next,
                        None => return Ok(Exit::Return),
                    }
                }
                Operation::Jump(next) => *pc = *next,
                Operation::JumpIfZero(next) => {
                    if stack.pop_i32() == 0 {
                        *pc = *next;
                    }
                }
                Operation::Call(index) => {
                    let engine = instance()?.engine();
                    let callee = engine.function(*index).ok_or(RuntimeError::IndexOutOfRange {
                        index: *index,
                        size: engine.function_count(),
                    })?;
                    return Ok(Exit::Call(callee.clone()));
                }
                Operation::CallIndirect { type_index } => {
                    let instance = instance()?;
                    let expected = instance.func_type(*type_index).ok_or_else(|| RuntimeError::TypeMismatch {
                        expected: format!("type[{type_index}]"),
                        actual: "undefined type".to_string(),
                    })?;
                    let index = stack.pop_u32();
                    let table = instance.table().borrow();
                    let callee = instance.engine().lookup_function(&table, expected, index)?;
                    return Ok(Exit::Call(callee));
                }

                Operation::Drop => {
                    stack.pop();
                }
                Operation::Select => {
                    let condition = stack.pop_i32();
                    let b = stack.pop();
                    let a = stack.pop();
                    stack.push(if condition != 0 { a } else { b });
                }

                Operation::LocalGet(index) => stack.push(stack.get(base + *index as usize)),
                Operation::LocalSet(index) => {
                    let value = stack.pop();
                    stack.set(base + *index as usize, value);
                }
                Operation::LocalTee(index) => {
                    let value = stack.pop();
                    stack.push(value);
                    stack.set(base + *index as usize, value);
                }
                Operation::GlobalGet(index) => {
                    let instance = instance()?;
                    let global = instance.global(*index).ok_or(RuntimeError::IndexOutOfRange {
                        index: *index,
                        size: instance.global_count(),
                    })?;
                    stack.push(global.get());
                }
                Operation::GlobalSet(index) => {
                    let instance = instance()?;
                    let global = instance.global(*index).ok_or(RuntimeError::IndexOutOfRange {
                        index: *index,
                        size: instance.global_count(),
                    })?;
                    global.set(stack.pop());
                }

                Operation::Load { kind, offset } => {
                    memory::load(stack, &instance()?.memory().borrow(), *kind, *offset)?;
                }
                Operation::Store { kind, offset } => {
                    memory::store(stack, &mut instance()?.memory().borrow_mut(), *kind, *offset)?;
                }
                Operation::MemorySize => memory::size(stack, &instance()?.memory().borrow()),
                Operation::MemoryGrow => memory::grow(stack, &mut instance()?.memory().borrow_mut()),

                Operation::ConstI32(v) => stack.push_i32(*v),
                Operation::ConstI64(v) => stack.push_i64(*v),
                Operation::ConstF32(v) => stack.push_f32(*v),
                Operation::ConstF64(v) => stack.push_f64(*v),

                Operation::Eqz(t) => comparison::eqz(stack, *t),
                Operation::Eq(t) => comparison::eq(stack, *t),
                Operation::Ne(t) => comparison::ne(stack, *t),
                Operation::Lt(t) => comparison::lt(stack, *t),
                Operation::Gt(t) => comparison::gt(stack, *t),
                Operation::Le(t) => comparison::le(stack, *t),
                Operation::Ge(t) => comparison::ge(stack, *t),

                Operation::Clz(t) => numeric::clz(stack, *t),
                Operation::Ctz(t) => numeric::ctz(stack, *t),
                Operation::Popcnt(t) => numeric::popcnt(stack, *t),
                Operation::Add(t) => numeric::add(stack, *t),
                Operation::Sub(t) => numeric::sub(stack, *t),
                Operation::Mul(t) => numeric::mul(stack, *t),
                Operation::Div(t) => numeric::div(stack, *t)?,
                Operation::Rem(t) => numeric::rem(stack, *t)?,
                Operation::And(t) => bitwise::and(stack, *t),
                Operation::Or(t) => bitwise::or(stack, *t),
                Operation::Xor(t) => bitwise::xor(stack, *t),
                Operation::Shl(t) => bitwise::shl(stack, *t),
                Operation::Shr(t) => bitwise::shr(stack, *t),
                Operation::Rotl(t) => bitwise::rotl(stack, *t),
                Operation::Rotr(t) => bitwise::rotr(stack, *t),

                Operation::Abs(t) => numeric::abs(stack, *t),
                Operation::Neg(t) => numeric::neg(stack, *t),
                Operation::Ceil(t) => numeric::ceil(stack, *t),
                Operation::Floor(t) => numeric::floor(stack, *t),
                Operation::Trunc(t) => numeric::trunc(stack, *t),
                Operation::Nearest(t) => numeric::nearest(stack, *t),
                Operation::Sqrt(t) => numeric::sqrt(stack, *t),
                Operation::Min(t) => numeric::min(stack, *t),
                Operation::Max(t) => numeric::max(stack, *t),
                Operation::Copysign(t) => numeric::copysign(stack, *t),

                Operation::I32WrapFromI64 => conversion::i32_wrap_i64(stack),
                Operation::ITruncFromF {
                    input,
                    output,
                    saturating,
                } => conversion::trunc_float_to_int(stack, *input, *output, *saturating)?,
                Operation::FConvertFromI { input, output } => conversion::convert_int_to_float(stack, *input, *output),
                Operation::F32DemoteFromF64 => conversion::f32_demote_f64(stack),
                Operation::F64PromoteFromF32 => conversion::f64_promote_f32(stack),
                Operation::I64ExtendFromI32 { signed } => conversion::i64_extend_i32(stack, *signed),
                Operation::SignExtend32From8 => conversion::sign_extend_32_from_8(stack),
                Operation::SignExtend32From16 => conversion::sign_extend_32_from_16(stack),
                Operation::SignExtend64From8 => conversion::sign_extend_64_from_8(stack),
                Operation::SignExtend64From16 => conversion::sign_extend_64_from_16(stack),
                Operation::SignExtend64From32 => conversion::sign_extend_64_from_32(stack),
            }
        }

        // bodies always end in a return branch; running off the end is the same thing
        Ok(Exit::Return)
    }

    fn log_stack_trace(&self, function: &Function, err: &RuntimeError) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        log::debug!("{} failed: {err}", function.definition().debug_name());
        for frame in self.frames.iter().rev() {
            let code = frame.function.code();
            let name = code.definition().debug_name();
            match code.source_offset(frame.pc.saturating_sub(1)) {
                Some(offset) => log::debug!("\t{name} (offset {offset:#x})"),
                None => log::debug!("\t{name}"),
            }
        }
    }
}

/// Take a branch within the frame at `base`; `None` when it leaves the function
fn branch(stack: &mut Stack, base: usize, target: &BranchTarget) -> Option<usize> {
    let pc = target.pc?;
    stack.unwind(base + target.height as usize, target.arity as usize);
    Some(pc)
}
