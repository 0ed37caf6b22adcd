//! Untyped operand stack
//!
//! Every slot is a `u64` word. The IR is produced from code whose operand
//! heights were checked by the compiler, so popping an empty stack is an
//! interpreter defect rather than a runtime error: it is caught by a debug
//! assertion and otherwise yields zero.

/// The WebAssembly operand stack
#[derive(Debug, Default)]
pub struct Stack {
    values: Vec<u64>,
}

impl Stack {
    pub fn new() -> Self {
        Stack { values: Vec::new() }
    }

    pub fn push(&mut self, value: u64) {
        self.values.push(value);
    }

    pub fn push_all(&mut self, values: &[u64]) {
        self.values.extend_from_slice(values);
    }

    pub fn pop(&mut self) -> u64 {
        debug_assert!(!self.values.is_empty(), "operand stack underflow");
        self.values.pop().unwrap_or_default()
    }

    /// Remove and return the top `n` words in stack order
    pub fn pop_n(&mut self, n: usize) -> Vec<u64> {
        debug_assert!(n <= self.values.len(), "operand stack underflow");
        let at = self.values.len().saturating_sub(n);
        self.values.split_off(at)
    }

    /// Every word, bottom first
    pub fn as_slice(&self) -> &[u64] {
        &self.values
    }

    /// The top `n` words in stack order, without removing them
    pub fn peek_n(&self, n: usize) -> &[u64] {
        let at = self.values.len().saturating_sub(n);
        &self.values[at..]
    }

    pub fn push_bool(&mut self, v: bool) {
        self.push(v as u64);
    }

    pub fn push_i32(&mut self, v: i32) {
        self.push(v as u32 as u64);
    }

    pub fn pop_i32(&mut self) -> i32 {
        self.pop() as u32 as i32
    }

    pub fn push_u32(&mut self, v: u32) {
        self.push(v as u64);
    }

    pub fn pop_u32(&mut self) -> u32 {
        self.pop() as u32
    }

    pub fn push_i64(&mut self, v: i64) {
        self.push(v as u64);
    }

    pub fn pop_i64(&mut self) -> i64 {
        self.pop() as i64
    }

    pub fn push_f32(&mut self, v: f32) {
        self.push(v.to_bits() as u64);
    }

    pub fn pop_f32(&mut self) -> f32 {
        f32::from_bits(self.pop() as u32)
    }

    pub fn push_f64(&mut self, v: f64) {
        self.push(v.to_bits());
    }

    pub fn pop_f64(&mut self) -> f64 {
        f64::from_bits(self.pop())
    }

    /// Word at an absolute position, used for locals
    pub fn get(&self, index: usize) -> u64 {
        self.values.get(index).copied().unwrap_or_default()
    }

    pub fn set(&mut self, index: usize, value: u64) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    /// Keep the top `keep` words, moving them down so they start at `height`
    pub fn unwind(&mut self, height: usize, keep: usize) {
        let len = self.values.len();
        debug_assert!(height + keep <= len, "operand stack underflow");
        if height + keep < len {
            self.values.copy_within(len - keep.., height);
        }
        self.values.truncate(height + keep);
    }

    pub fn truncate(&mut self, height: usize) {
        self.values.truncate(height);
    }

    /// Push `n` zero words
    pub fn extend_zeroed(&mut self, n: usize) {
        self.values.resize(self.values.len() + n, 0);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl From<Vec<u64>> for Stack {
    fn from(values: Vec<u64>) -> Self {
        Stack { values }
    }
}
