//! Function call observation
//!
//! A [`FunctionListenerFactory`] is consulted once per function definition
//! when a module is compiled. The listener it returns, if any, is stored with
//! that function's compiled body and notified around every call:
//!
//! - `before` on entry, with a snapshot of the parameters and a walk over
//!   the calls still open beneath it
//! - `after` on normal return, with a snapshot of the results
//!
//! When a call faults no `after` notification fires, neither for the faulting
//! function nor for any caller still open on the call stack.

pub mod logging;
pub mod scope;
pub mod stack;

pub use logging::LoggingListenerFactory;
pub use scope::{is_in_log_scope, LogScopes};
pub use stack::{StackFrame, StackIterator};

use crate::parser::module::FunctionDefinition;
use crate::runtime::CallContext;
use std::sync::Arc;

pub trait FunctionListener: Send + Sync {
    /// `params` are raw operand-stack words typed by `definition.func_type`
    ///
    /// `stack` starts with the function being entered and ends with the
    /// entry function of the invocation.
    fn before(&self, ctx: &CallContext, definition: &FunctionDefinition, params: &[u64], stack: StackIterator<'_>);

    fn after(&self, ctx: &CallContext, definition: &FunctionDefinition, results: &[u64]);
}

pub trait FunctionListenerFactory {
    /// Return a listener for `definition`, or `None` to leave it unobserved
    fn new_listener(&self, definition: &FunctionDefinition) -> Option<Arc<dyn FunctionListener>>;
}
