//! Per-call context: cancellation, deadline and nesting depth
//!
//! A `CallContext` is threaded through every call. The interpreter checks
//! cancellation and the deadline once on entry to each function, and host
//! functions can inspect it through [`Caller::context`](super::Caller::context).

use super::RuntimeError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
    depth: usize,
    reentries: usize,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the call once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Call depth of the function this context was handed to, 0 for the entry call
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of host functions on the native stack that called back into WebAssembly
    pub fn reentries(&self) -> usize {
        self.reentries
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Fail with `Cancelled` or `DeadlineExceeded` if the call should stop
    pub fn check(&self) -> Result<(), RuntimeError> {
        if self.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(RuntimeError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Same cancellation and deadline, at a different depth
    pub(crate) fn at_depth(&self, depth: usize) -> CallContext {
        CallContext {
            cancel: self.cancel.clone(),
            deadline: self.deadline,
            depth,
            reentries: self.reentries,
        }
    }

    /// Context for a host function calling back into WebAssembly
    pub(crate) fn reentered(&self) -> CallContext {
        CallContext {
            reentries: self.reentries + 1,
            ..self.at_depth(self.depth + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_never_stops() {
        let ctx = CallContext::new();
        assert!(ctx.check().is_ok());
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = CallContext::new().with_cancel_flag(flag.clone());
        assert!(ctx.check().is_ok());
        flag.store(true, Ordering::Relaxed);
        assert_eq!(ctx.check(), Err(RuntimeError::Cancelled));
        // nested contexts observe the same flag
        assert_eq!(ctx.at_depth(3).check(), Err(RuntimeError::Cancelled));
    }

    #[test]
    fn test_deadline() {
        let ctx = CallContext::new().with_deadline(Instant::now() - Duration::from_millis(1));
        assert_eq!(ctx.check(), Err(RuntimeError::DeadlineExceeded));

        let ctx = CallContext::new().with_timeout(Duration::from_secs(3600));
        assert!(ctx.check().is_ok());
        assert_eq!(ctx.at_depth(2).depth(), 2);
    }

    #[test]
    fn test_reentered() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = CallContext::new().with_cancel_flag(flag.clone()).at_depth(4);
        let nested = ctx.reentered().reentered();
        assert_eq!(nested.depth(), 6);
        assert_eq!(nested.reentries(), 2);
        assert_eq!(nested.at_depth(1).reentries(), 2);
        flag.store(true, Ordering::Relaxed);
        assert_eq!(nested.check(), Err(RuntimeError::Cancelled));
    }
}
